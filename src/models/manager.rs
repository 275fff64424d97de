use crate::models::runtime::{ExecutionBackend, InferenceSession, RuntimeLoader};
use crate::models::{ModelCatalog, ModelDescriptor};
use crate::utils::error::StyleError;
use crate::{Config, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// 已加载的模型：描述信息 + 会话
pub struct LoadedModel {
    pub descriptor: ModelDescriptor,
    pub session: Arc<dyn InferenceSession>,
    /// 实际输入尺寸 (height, width)
    pub input_size: (usize, usize),
}

type SessionSlot = Arc<OnceCell<Arc<LoadedModel>>>;

/// 会话缓存：模型标识符 -> 会话
///
/// 每个标识符对应一个共享的构造槽，同一模型的并发首次请求等待同一次构造。
/// 构造失败不会写入缓存，下次请求会重新尝试。缓存只增不减。
pub struct SessionCache {
    loader: Arc<RuntimeLoader>,
    catalog: ModelCatalog,
    backend: ExecutionBackend,
    slots: Mutex<HashMap<String, SessionSlot>>,
    constructions: AtomicUsize,
    config: Config,
}

impl SessionCache {
    pub fn new(config: Config, loader: Arc<RuntimeLoader>) -> Self {
        Self {
            loader,
            catalog: ModelCatalog::new(config.clone()),
            backend: config.onnx_config.backend,
            slots: Mutex::new(HashMap::new()),
            constructions: AtomicUsize::new(0),
            config,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// 获取模型会话，未命中时加载
    pub async fn get_session(&self, model_id: &str) -> Result<Arc<LoadedModel>> {
        // 非法标识符不占用缓存槽
        let descriptor = self.catalog.resolve(model_id)?;

        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(model_id.to_string()).or_default())
        };

        if let Some(model) = slot.get() {
            tracing::debug!("Session cache hit: {}", model_id);
            return Ok(Arc::clone(model));
        }

        let model = slot.get_or_try_init(|| self.load(descriptor)).await?;
        Ok(Arc::clone(model))
    }

    async fn load(&self, descriptor: ModelDescriptor) -> Result<Arc<LoadedModel>> {
        let model_id = descriptor.id.as_str();
        let runtime = self.loader.ensure_runtime().await?;

        tracing::info!("Loading ONNX model: {}", model_id);
        self.constructions.fetch_add(1, Ordering::SeqCst);

        let backend = self.backend;
        let blocking_descriptor = descriptor.clone();
        let session = tokio::task::spawn_blocking(move || {
            runtime.create_session(&blocking_descriptor, backend)
        })
        .await
        .map_err(|e| StyleError::model_load(model_id, &descriptor.location, e))?
        .map_err(|e| match e {
            StyleError::ModelLoadFailed { .. } => e,
            other => StyleError::model_load(model_id, &descriptor.location, other),
        })?;

        let input_dims = session
            .input_names()
            .first()
            .and_then(|name| session.input_dims(name));
        let input_size = descriptor.resolve_input_size(input_dims.as_deref());

        tracing::info!(
            "Successfully loaded model: {} (input {}x{})",
            model_id,
            input_size.1,
            input_size.0
        );

        Ok(Arc::new(LoadedModel {
            descriptor,
            session,
            input_size,
        }))
    }

    /// 已缓存的模型标识符
    pub fn cached_models(&self) -> Vec<String> {
        let slots = self.slots.lock();
        let mut ids: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// 会话构造次数（包括失败的尝试）
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    /// 运行时健康检查
    pub fn health_check(&self) -> Result<()> {
        if !self.loader.is_ready() {
            return Err(StyleError::RuntimeUnavailable(
                "Inference runtime has not been initialized".to_string(),
            ));
        }

        tracing::debug!("Session cache health check passed");
        Ok(())
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> ModelStats {
        ModelStats {
            runtime_ready: self.loader.is_ready(),
            cached_models: self.cached_models(),
            constructions: self.constructions(),
            backend: self.backend,
            intra_threads: self.config.onnx_config.intra_threads,
            optimization_level: self.config.onnx_config.optimization_level,
        }
    }
}

/// 会话缓存统计信息
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub runtime_ready: bool,
    pub cached_models: Vec<String>,
    pub constructions: usize,
    pub backend: ExecutionBackend,
    pub intra_threads: usize,
    pub optimization_level: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::FakeRuntime;
    use std::path::PathBuf;

    fn cache_with(runtime: Arc<FakeRuntime>) -> SessionCache {
        let config = Config::new("models", None, Some(1), false).unwrap();
        SessionCache::new(config, Arc::new(RuntimeLoader::with_runtime(runtime)))
    }

    #[tokio::test]
    async fn second_lookup_hits_cache() {
        let runtime = Arc::new(FakeRuntime::identity());
        let cache = cache_with(runtime.clone());

        let first = cache.get_session("udnie").await.unwrap();
        let second = cache.get_session("udnie").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.session, &second.session));
        assert_eq!(runtime.constructions.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_models(), vec!["udnie".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_first_requests_construct_once() {
        let runtime = Arc::new(FakeRuntime::identity());
        let cache = cache_with(runtime.clone());

        let (a, b, c) = tokio::join!(
            cache.get_session("candy"),
            cache.get_session("candy"),
            cache.get_session("candy")
        );

        let a = a.unwrap();
        assert!(Arc::ptr_eq(&a, &b.unwrap()));
        assert!(Arc::ptr_eq(&a, &c.unwrap()));
        assert_eq!(runtime.constructions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_models_get_distinct_sessions() {
        let runtime = Arc::new(FakeRuntime::identity());
        let cache = cache_with(runtime.clone());

        let udnie = cache.get_session("udnie").await.unwrap();
        let classifier = cache.get_session("adv-inception-v3").await.unwrap();

        assert!(!Arc::ptr_eq(&udnie, &classifier));
        assert_eq!(udnie.input_size, (224, 224));
        assert_eq!(classifier.input_size, (299, 299));
        assert_eq!(cache.stats().cached_models.len(), 2);
    }

    #[tokio::test]
    async fn declared_dims_override_default() {
        let runtime =
            Arc::new(FakeRuntime::identity().with_dims(vec![Some(1), Some(3), Some(64), Some(96)]));
        let cache = cache_with(runtime);

        let model = cache.get_session("mosaic").await.unwrap();
        assert_eq!(model.input_size, (64, 96));
    }

    #[tokio::test]
    async fn failed_load_reports_location_and_is_not_cached() {
        let runtime = Arc::new(FakeRuntime::identity().with_missing("pointilism"));
        let cache = cache_with(runtime.clone());

        let err = cache.get_session("pointilism").await.err().unwrap();
        match err {
            StyleError::ModelLoadFailed {
                model_id, location, ..
            } => {
                assert_eq!(model_id, "pointilism");
                assert_eq!(location, PathBuf::from("models/fast-style/pointilism.onnx"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(cache.get_session("pointilism").await.is_err());
        assert_eq!(runtime.constructions.load(Ordering::SeqCst), 2);
        assert!(cache.cached_models().is_empty());
    }

    #[tokio::test]
    async fn invalid_ids_leave_no_slot_behind() {
        let runtime = Arc::new(FakeRuntime::identity());
        let cache = cache_with(runtime.clone());

        for id in ["", "  ", "../secrets", "a/b"] {
            let err = cache.get_session(id).await.err().unwrap();
            assert!(matches!(err, StyleError::InvalidInput(_)), "{id}: {err:?}");
        }

        assert!(cache.slots.lock().is_empty());
        assert_eq!(runtime.constructions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn health_check_requires_runtime() {
        let cache = cache_with(Arc::new(FakeRuntime::identity()));
        assert!(cache.health_check().is_ok());
    }
}
