use crate::models::runtime::{ExecutionBackend, InferenceSession, Runtime, RuntimeBootstrap};
use crate::models::ModelDescriptor;
use crate::utils::error::StyleError;
use crate::Result;
use async_trait::async_trait;
use ndarray::ArrayD;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Transform = dyn Fn(&ArrayD<f32>) -> Result<ArrayD<f32>> + Send + Sync;

pub struct FakeSession {
    inputs: Vec<String>,
    outputs: Vec<String>,
    dims: Vec<Option<usize>>,
    transform: Arc<Transform>,
}

impl FakeSession {
    pub fn new(dims: Vec<Option<usize>>, transform: Arc<Transform>) -> Self {
        Self {
            inputs: vec!["input1".to_string()],
            outputs: vec!["output1".to_string()],
            dims,
            transform,
        }
    }
}

impl InferenceSession for FakeSession {
    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.outputs
    }

    fn input_dims(&self, name: &str) -> Option<Vec<Option<usize>>> {
        (name == self.inputs[0]).then(|| self.dims.clone())
    }

    fn run(&self, inputs: Vec<(String, ArrayD<f32>)>) -> Result<HashMap<String, ArrayD<f32>>> {
        let (name, input) = inputs
            .into_iter()
            .next()
            .ok_or_else(|| StyleError::InferenceFailed("no inputs bound".to_string()))?;
        if name != self.inputs[0] {
            return Err(StyleError::InferenceFailed(format!("unknown input '{}'", name)));
        }

        let output = (self.transform)(&input)?;
        Ok(HashMap::from([(self.outputs[0].clone(), output)]))
    }
}

/// 内存中的假运行时，记录会话构造次数
pub struct FakeRuntime {
    pub constructions: AtomicUsize,
    dims: Vec<Option<usize>>,
    transform: Arc<Transform>,
    missing: Vec<String>,
}

impl FakeRuntime {
    /// 输出等于输入的模型
    pub fn identity() -> Self {
        Self::with_transform(Arc::new(|input: &ArrayD<f32>| -> Result<ArrayD<f32>> {
            Ok(input.clone())
        }))
    }

    pub fn with_transform(transform: Arc<Transform>) -> Self {
        Self {
            constructions: AtomicUsize::new(0),
            dims: vec![Some(1), Some(3), None, None],
            transform,
            missing: Vec::new(),
        }
    }

    pub fn with_dims(mut self, dims: Vec<Option<usize>>) -> Self {
        self.dims = dims;
        self
    }

    pub fn with_missing(mut self, model_id: &str) -> Self {
        self.missing.push(model_id.to_string());
        self
    }
}

impl Runtime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    fn create_session(
        &self,
        descriptor: &ModelDescriptor,
        _backend: ExecutionBackend,
    ) -> Result<Arc<dyn InferenceSession>> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        if self.missing.contains(&descriptor.id) {
            return Err(StyleError::model_load(
                &descriptor.id,
                &descriptor.location,
                "model file not found",
            ));
        }

        Ok(Arc::new(FakeSession::new(
            self.dims.clone(),
            Arc::clone(&self.transform),
        )))
    }
}

pub struct FakeBootstrap {
    pub calls: AtomicUsize,
    runtime: Arc<FakeRuntime>,
}

impl FakeBootstrap {
    pub fn new(runtime: FakeRuntime) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            runtime: Arc::new(runtime),
        }
    }
}

#[async_trait]
impl RuntimeBootstrap for FakeBootstrap {
    async fn bootstrap(&self) -> Result<Arc<dyn Runtime>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(Arc::clone(&self.runtime) as Arc<dyn Runtime>)
    }
}

pub struct FailingBootstrap;

#[async_trait]
impl RuntimeBootstrap for FailingBootstrap {
    async fn bootstrap(&self) -> Result<Arc<dyn Runtime>> {
        Err(StyleError::Internal("bootstrap script failed to load".to_string()))
    }
}
