use crate::utils::error::StyleError;
use crate::{Config, Result};
use serde::Serialize;
use std::path::PathBuf;

/// 内置的快速风格迁移模型
pub const FAST_STYLE_MODELS: &[&str] = &["udnie", "candy", "mosaic", "rain-princess", "pointilism"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// 风格迁移：输出为图像张量
    Style,
    /// 分类：输出为logits
    Classifier,
}

impl ModelKind {
    /// 模型文件所在子目录
    pub fn asset_dir(&self) -> &'static str {
        match self {
            ModelKind::Style => "fast-style",
            ModelKind::Classifier => "computer-vision",
        }
    }
}

/// 模型描述：标识符、文件位置、输入空间尺寸
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub kind: ModelKind,
    pub location: PathBuf,
    /// 默认输入尺寸 (height, width)，模型声明为动态维度时使用
    pub default_input_size: (usize, usize),
}

impl ModelDescriptor {
    /// 根据模型声明的输入维度（NCHW）确定实际输入尺寸
    pub fn resolve_input_size(&self, dims: Option<&[Option<usize>]>) -> (usize, usize) {
        let (default_h, default_w) = self.default_input_size;
        let dim = |index: usize, default: usize| {
            dims.and_then(|d| d.get(index).copied().flatten())
                .filter(|&v| v > 0)
                .unwrap_or(default)
        };

        (dim(2, default_h), dim(3, default_w))
    }
}

/// 按约定把模型标识符解析为文件位置
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    config: Config,
}

impl ModelCatalog {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn kind_of(&self, model_id: &str) -> ModelKind {
        if self.config.is_classifier(model_id) {
            ModelKind::Classifier
        } else {
            ModelKind::Style
        }
    }

    pub fn resolve(&self, model_id: &str) -> Result<ModelDescriptor> {
        validate_model_id(model_id)?;

        let pipeline = &self.config.pipeline_config;
        let kind = self.kind_of(model_id);
        let (location, default_input_size) = match kind {
            ModelKind::Style => (
                self.config.style_model_path(model_id),
                pipeline.style_input_size,
            ),
            ModelKind::Classifier => (
                self.config.classifier_model_path(model_id),
                pipeline.classifier_input_size,
            ),
        };

        Ok(ModelDescriptor {
            id: model_id.to_string(),
            kind,
            location,
            default_input_size,
        })
    }

    /// 所有已知模型
    pub fn known_models(&self) -> Vec<ModelDescriptor> {
        FAST_STYLE_MODELS
            .iter()
            .copied()
            .chain(self.config.pipeline_config.classifier_models.iter().map(String::as_str))
            .filter_map(|id| self.resolve(id).ok())
            .collect()
    }
}

fn validate_model_id(model_id: &str) -> Result<()> {
    if model_id.trim().is_empty() {
        return Err(StyleError::InvalidInput("Model identifier cannot be empty".to_string()));
    }

    if model_id.contains(['/', '\\']) || model_id.contains("..") {
        return Err(StyleError::InvalidInput(format!(
            "Invalid model identifier '{}'",
            model_id
        )));
    }

    Ok(())
}
