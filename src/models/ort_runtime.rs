use crate::config::OnnxConfig;
use crate::models::runtime::{ExecutionBackend, InferenceSession, Runtime, RuntimeBootstrap};
use crate::models::ModelDescriptor;
use crate::utils::error::StyleError;
use crate::Result;
use async_trait::async_trait;
use ndarray::ArrayD;
use once_cell::sync::OnceCell;
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session, SessionInputValue},
    value::{Tensor, ValueType},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// 进程级ONNX Runtime环境，只提交一次
static ORT_ENVIRONMENT: OnceCell<()> = OnceCell::new();

/// 生产环境使用的bootstrap：初始化ONNX Runtime环境
pub struct OrtBootstrap {
    config: OnnxConfig,
}

impl OrtBootstrap {
    pub fn new(config: OnnxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RuntimeBootstrap for OrtBootstrap {
    async fn bootstrap(&self) -> Result<Arc<dyn Runtime>> {
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            ORT_ENVIRONMENT.get_or_init(|| {
                log_environment_commit(ort::init().with_name("onnx-style").commit());
            });

            // 探测运行时是否可用（共享库缺失时在这里失败）
            Session::builder().map_err(|e| {
                StyleError::RuntimeUnavailable(format!("ONNX Runtime failed to initialize: {}", e))
            })?;

            tracing::info!(
                "ONNX Runtime initialized: intra_threads={}, optimization_level={}",
                config.intra_threads,
                config.optimization_level
            );

            Ok(Arc::new(OrtRuntime::new(config)) as Arc<dyn Runtime>)
        })
        .await
        .map_err(|e| StyleError::RuntimeUnavailable(format!("Runtime bootstrap aborted: {}", e)))?
    }
}

/// 记录环境提交结果，返回是否由本进程提交
fn log_environment_commit(result: ort::Result<bool>) -> bool {
    match result {
        Ok(true) => {
            tracing::debug!("ONNX Runtime environment committed");
            true
        }
        Ok(false) => {
            tracing::warn!("ONNX Runtime environment was already committed, keeping existing settings");
            false
        }
        Err(e) => {
            tracing::warn!("ONNX Runtime environment commit failed, using defaults: {}", e);
            false
        }
    }
}

pub struct OrtRuntime {
    config: OnnxConfig,
}

impl OrtRuntime {
    pub fn new(config: OnnxConfig) -> Self {
        Self { config }
    }

    fn optimization_level(&self) -> GraphOptimizationLevel {
        if !self.config.enable_optimization {
            return GraphOptimizationLevel::Disable;
        }

        match self.config.optimization_level {
            i32::MIN..=0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        }
    }

    fn build_session(&self, descriptor: &ModelDescriptor) -> std::result::Result<Session, ort::Error> {
        Session::builder()?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .with_optimization_level(self.optimization_level())?
            .with_intra_threads(self.config.intra_threads)?
            .commit_from_file(&descriptor.location)
    }
}

impl Runtime for OrtRuntime {
    fn name(&self) -> &str {
        "onnxruntime"
    }

    fn create_session(
        &self,
        descriptor: &ModelDescriptor,
        backend: ExecutionBackend,
    ) -> Result<Arc<dyn InferenceSession>> {
        if !descriptor.location.exists() {
            return Err(StyleError::model_load(
                &descriptor.id,
                &descriptor.location,
                "model file not found",
            ));
        }

        tracing::info!(
            "Loading ONNX model '{}' from: {} (backend={})",
            descriptor.id,
            descriptor.location.display(),
            backend
        );

        let session = self
            .build_session(descriptor)
            .map_err(|e| StyleError::model_load(&descriptor.id, &descriptor.location, e))?;

        let session = OrtSession::new(session);
        if session.input_names.is_empty() || session.output_names.is_empty() {
            return Err(StyleError::model_load(
                &descriptor.id,
                &descriptor.location,
                "model declares no inputs or no outputs",
            ));
        }

        for (i, name) in session.input_names.iter().enumerate() {
            tracing::debug!("Model '{}' input[{}]: '{}'", descriptor.id, i, name);
        }
        for (i, name) in session.output_names.iter().enumerate() {
            tracing::debug!("Model '{}' output[{}]: '{}'", descriptor.id, i, name);
        }

        Ok(Arc::new(session))
    }
}

pub struct OrtSession {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    input_dims: HashMap<String, Vec<Option<usize>>>,
}

impl OrtSession {
    fn new(session: Session) -> Self {
        let input_names = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();
        let input_dims = session
            .inputs
            .iter()
            .filter_map(|input| match &input.input_type {
                ValueType::Tensor { shape, .. } => {
                    let dims = shape
                        .iter()
                        .map(|d| if *d <= 0 { None } else { Some(*d as usize) })
                        .collect();
                    Some((input.name.clone(), dims))
                }
                _ => None,
            })
            .collect();

        Self {
            session: Mutex::new(session),
            input_names,
            output_names,
            input_dims,
        }
    }
}

impl InferenceSession for OrtSession {
    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn input_dims(&self, name: &str) -> Option<Vec<Option<usize>>> {
        self.input_dims.get(name).cloned()
    }

    fn run(&self, inputs: Vec<(String, ArrayD<f32>)>) -> Result<HashMap<String, ArrayD<f32>>> {
        let mut feeds = Vec::with_capacity(inputs.len());
        for (name, array) in inputs {
            let tensor = Tensor::from_array(array)
                .map_err(|e| StyleError::InferenceFailed(format!("input '{}': {}", name, e)))?;
            feeds.push((name, SessionInputValue::from(tensor)));
        }

        let mut session = self.session.lock();
        let outputs = session
            .run(feeds)
            .map_err(|e| StyleError::InferenceFailed(e.to_string()))?;

        let mut extracted = HashMap::with_capacity(self.output_names.len());
        for name in &self.output_names {
            if let Some(value) = outputs.get(name.as_str()) {
                let array = value
                    .try_extract_array::<f32>()
                    .map_err(|e| StyleError::InferenceFailed(format!("output '{}': {}", name, e)))?
                    .into_owned();
                extracted.insert(name.clone(), array);
            }
        }

        Ok(extracted)
    }
}
