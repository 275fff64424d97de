use crate::inference::types::StyleTransferResult;

/// 非ONNX风格的处理模块：原始图像字节 + 风格名 -> 处理结果
pub trait NativeStyler: Send + Sync {
    fn process(&self, image_data: &[u8], style: &str) -> StyleTransferResult;
}

/// 未接入原生风格模块时的默认实现，所有风格均未知
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableNativeStyler;

impl NativeStyler for UnavailableNativeStyler {
    fn process(&self, _image_data: &[u8], style: &str) -> StyleTransferResult {
        tracing::warn!("No native style module configured for '{}'", style);
        StyleTransferResult::failure(format!("Unknown style: {}", style))
    }
}
