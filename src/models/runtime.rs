use crate::models::ModelDescriptor;
use crate::utils::error::StyleError;
use crate::Result;
use async_trait::async_trait;
use ndarray::ArrayD;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// 推理执行后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionBackend {
    /// 可移植的CPU后端
    Cpu,
}

impl fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionBackend::Cpu => write!(f, "cpu"),
        }
    }
}

/// 已加载、可直接推理的模型实例
pub trait InferenceSession: Send + Sync {
    fn input_names(&self) -> &[String];

    fn output_names(&self) -> &[String];

    /// 输入张量的维度信息，动态维度为`None`
    fn input_dims(&self, name: &str) -> Option<Vec<Option<usize>>>;

    /// 执行一次推理，按名称绑定输入并返回全部输出
    fn run(&self, inputs: Vec<(String, ArrayD<f32>)>) -> Result<HashMap<String, ArrayD<f32>>>;
}

/// 推理运行时，负责从模型文件构造会话
pub trait Runtime: Send + Sync {
    fn name(&self) -> &str;

    fn create_session(
        &self,
        descriptor: &ModelDescriptor,
        backend: ExecutionBackend,
    ) -> Result<Arc<dyn InferenceSession>>;
}

/// 运行时的一次性获取步骤（启动时注入）
#[async_trait]
pub trait RuntimeBootstrap: Send + Sync {
    async fn bootstrap(&self) -> Result<Arc<dyn Runtime>>;
}

/// 运行时加载器：幂等，首次调用时执行bootstrap，之后直接返回
pub struct RuntimeLoader {
    bootstrap: Option<Arc<dyn RuntimeBootstrap>>,
    runtime: OnceCell<Arc<dyn Runtime>>,
}

impl RuntimeLoader {
    pub fn new(bootstrap: Arc<dyn RuntimeBootstrap>) -> Self {
        Self {
            bootstrap: Some(bootstrap),
            runtime: OnceCell::new(),
        }
    }

    /// 直接注入已构造好的运行时
    pub fn with_runtime(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            bootstrap: None,
            runtime: OnceCell::new_with(Some(runtime)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.runtime.initialized()
    }

    pub async fn ensure_runtime(&self) -> Result<Arc<dyn Runtime>> {
        let runtime = self
            .runtime
            .get_or_try_init(|| async {
                let bootstrap = self.bootstrap.as_ref().ok_or_else(|| {
                    StyleError::RuntimeUnavailable("no runtime bootstrap configured".to_string())
                })?;

                tracing::info!("Acquiring inference runtime...");
                let runtime = bootstrap.bootstrap().await.map_err(|e| match e {
                    StyleError::RuntimeUnavailable(_) => e,
                    other => StyleError::RuntimeUnavailable(other.to_string()),
                })?;
                tracing::info!("Inference runtime '{}' ready", runtime.name());

                Ok::<_, StyleError>(runtime)
            })
            .await?;

        Ok(Arc::clone(runtime))
    }
}
