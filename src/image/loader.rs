use crate::config::InputConfig;
use crate::utils::error::StyleError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;

/// 输入图像解码与校验
pub struct ImageLoader {
    limits: InputConfig,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new(InputConfig::default())
    }
}

impl ImageLoader {
    pub fn new(limits: InputConfig) -> Self {
        Self { limits }
    }

    /// 从base64字符串加载图像
    pub fn from_base64(&self, base64_data: &str) -> Result<DynamicImage> {
        // 移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest
                .split_once(',')
                .map(|(_, payload)| payload)
                .ok_or_else(|| StyleError::InvalidInput("Malformed data URL".to_string()))?,
            None => base64_data,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;
        self.from_bytes(&image_bytes)
    }

    /// 从字节加载图像
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<DynamicImage> {
        self.check_size(bytes.len())?;

        let format = Self::detect_format(bytes).ok_or_else(|| {
            StyleError::UnsupportedFormat("Unrecognized image data".to_string())
        })?;
        if !Self::is_supported_format(format) {
            return Err(StyleError::UnsupportedFormat(format!("{:?}", format)));
        }

        let image = image::load_from_memory_with_format(bytes, format)?;
        self.validate_dimensions(&image)?;

        Ok(image)
    }

    /// 从文件路径加载图像
    pub fn from_path(&self, path: impl AsRef<Path>) -> Result<DynamicImage> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        tracing::debug!("Read {} bytes from {}", bytes.len(), path.display());

        self.from_bytes(&bytes)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::WebP
                | ImageFormat::Gif
        )
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.limits.max_input_size {
            return Err(StyleError::FileTooLarge(len, self.limits.max_input_size));
        }
        if len == 0 {
            return Err(StyleError::InvalidInput("Empty image data".to_string()));
        }
        Ok(())
    }

    /// 验证图像尺寸
    pub fn validate_dimensions(&self, image: &DynamicImage) -> Result<()> {
        let (width, height) = image.dimensions();
        let (min, max) = (self.limits.min_dimension, self.limits.max_dimension);

        if width < min || height < min {
            return Err(StyleError::InvalidInput(format!(
                "Image too small: {}x{}, minimum {}x{}",
                width, height, min, min
            )));
        }

        if width > max || height > max {
            return Err(StyleError::InvalidInput(format!(
                "Image too large: {}x{}, maximum {}x{}",
                width, height, max, max
            )));
        }

        Ok(())
    }
}
