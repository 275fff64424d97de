pub mod catalog;
pub mod manager;
pub mod ort_runtime;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{ModelCatalog, ModelDescriptor, ModelKind, FAST_STYLE_MODELS};
pub use manager::{LoadedModel, ModelStats, SessionCache};
pub use ort_runtime::{OrtBootstrap, OrtRuntime};
pub use runtime::{ExecutionBackend, InferenceSession, Runtime, RuntimeBootstrap, RuntimeLoader};
