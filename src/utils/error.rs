use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("Inference runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Failed to load model '{model_id}'. Make sure the model file exists at: {} ({reason})", location.display())]
    ModelLoadFailed {
        model_id: String,
        location: PathBuf,
        reason: String,
    },

    #[error("Image decode failed: {0}")]
    ImageDecodeFailed(#[from] image::ImageError),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("ONNX inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StyleError {
    /// 构造模型加载错误，携带尝试加载的文件位置
    pub fn model_load(
        model_id: impl Into<String>,
        location: impl Into<PathBuf>,
        reason: impl std::fmt::Display,
    ) -> Self {
        StyleError::ModelLoadFailed {
            model_id: model_id.into(),
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StyleError::RuntimeUnavailable(_) => "RUNTIME_UNAVAILABLE",
            StyleError::ModelLoadFailed { .. } => "MODEL_LOAD_ERROR",
            StyleError::ImageDecodeFailed(_) => "IMAGE_DECODE_ERROR",
            StyleError::ImageProcessing(_) => "IMAGE_PROCESSING_ERROR",
            StyleError::InferenceFailed(_) => "INFERENCE_ERROR",
            StyleError::InvalidInput(_) => "INVALID_INPUT",
            StyleError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            StyleError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            StyleError::Config(_) => "CONFIG_ERROR",
            StyleError::Io(_) => "IO_ERROR",
            StyleError::Json(_) => "JSON_ERROR",
            StyleError::Base64(_) => "BASE64_DECODE_ERROR",
            StyleError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 命令行退出码（sysexits风格）
    pub fn exit_code(&self) -> i32 {
        match self {
            StyleError::InvalidInput(_)
            | StyleError::FileTooLarge(_, _)
            | StyleError::UnsupportedFormat(_)
            | StyleError::Base64(_)
            | StyleError::ImageDecodeFailed(_) => 65,
            StyleError::RuntimeUnavailable(_) | StyleError::ModelLoadFailed { .. } => 69,
            StyleError::Io(_) => 74,
            StyleError::Config(_) => 78,
            _ => 70,
        }
    }
}
