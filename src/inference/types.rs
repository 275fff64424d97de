use crate::image::OutputRange;
use crate::inference::classifier::Prediction;
use crate::utils::error::StyleError;
use serde::{Deserialize, Serialize};

/// 风格处理结果，与原生风格模块约定的返回形状一致
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleTransferResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_image_data: Option<String>,
    /// 分类模型的可读排序结果
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
}

impl StyleTransferResult {
    pub fn success(message: impl Into<String>, image_data: String) -> Self {
        Self {
            success: true,
            message: message.into(),
            processed_image_data: Some(image_data),
            classification: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            processed_image_data: None,
            classification: None,
        }
    }

    pub fn with_classification(mut self, classification: String) -> Self {
        self.classification = Some(classification);
        self
    }
}

impl From<&StyleError> for StyleTransferResult {
    fn from(error: &StyleError) -> Self {
        Self::failure(error.to_string())
    }
}

/// 风格迁移模型的输出
#[derive(Debug, Clone, Serialize)]
pub struct StylizedImage {
    pub model_id: String,
    /// PNG data URI
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    pub output_range: OutputRange,
    pub processing_time_ms: u64,
}

/// 分类模型的输出
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationOutcome {
    pub model_id: String,
    pub predictions: Vec<Prediction>,
    /// 前三名的可读报告
    pub report: String,
    /// letterbox后的输入预览（PNG data URI）
    pub preview_data_uri: String,
    pub processing_time_ms: u64,
}

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decoding,
    LoadingModel,
    Preprocessing,
    Inference,
    Postprocessing,
    Completed,
}

/// 处理状态
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatus {
    /// 当前处理阶段
    pub stage: Stage,
    /// 进度百分比 (0.0 - 1.0)
    pub progress: f32,
    /// 状态消息
    pub message: String,
}

impl ProcessStatus {
    pub fn new(stage: Stage, progress: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_result_omits_image_data() {
        let result = StyleTransferResult::from(&StyleError::InferenceFailed("boom".to_string()));
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "ONNX inference failed: boom");
        assert!(json.get("processed_image_data").is_none());
        assert!(json.get("classification").is_none());
    }

    #[test]
    fn collaborator_shape_deserializes() {
        let result: StyleTransferResult = serde_json::from_str(
            r#"{"success":true,"message":"ok","processed_image_data":"data:image/png;base64,AA=="}"#,
        )
        .unwrap();

        assert!(result.success);
        assert_eq!(result.classification, None);
    }
}
