use crate::image::transforms::{ImageTransforms, LetterboxGeometry};
use crate::utils::error::StyleError;
use crate::Result;
use base64::Engine;
use image::{imageops::FilterType, DynamicImage, ImageFormat, Rgba, RgbaImage};
use ndarray::Array4;
use std::io::Cursor;

/// NCHW格式的图像张量 (1, 3, H, W)，平面布局，取值范围[0, 1]
pub type ImageTensor = Array4<f32>;

/// RGB通道数
pub const RGB_CHANNELS: usize = 3;

/// 绘制画布：letterbox结果，之后作为输出渲染目标复用
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbaImage,
    geometry: LetterboxGeometry,
}

impl Canvas {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn geometry(&self) -> &LetterboxGeometry {
        &self.geometry
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// 用解码后的像素覆盖画布内容
    pub fn put_pixels(&mut self, pixels: RgbaImage) -> Result<()> {
        if pixels.dimensions() != self.pixels.dimensions() {
            return Err(StyleError::ImageProcessing(format!(
                "Pixel buffer {}x{} does not match canvas {}x{}",
                pixels.width(),
                pixels.height(),
                self.width(),
                self.height()
            )));
        }

        self.pixels = pixels;
        Ok(())
    }

    /// 编码为PNG
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut output = Cursor::new(Vec::new());
        self.pixels
            .write_to(&mut output, ImageFormat::Png)
            .map_err(|e| StyleError::ImageProcessing(format!("PNG encoding failed: {}", e)))?;
        Ok(output.into_inner())
    }

    /// 导出为可嵌入的data URI
    pub fn to_data_uri(&self) -> Result<String> {
        let png = self.to_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }
}

pub struct ImagePreprocessor {
    background: Rgba<u8>,
    filter: FilterType,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new([128, 128, 128])
    }
}

impl ImagePreprocessor {
    pub fn new(background: [u8; 3]) -> Self {
        Self {
            background: Rgba([background[0], background[1], background[2], 255]),
            // 高质量重采样
            filter: FilterType::Lanczos3,
        }
    }

    /// letterbox + 平面化归一化
    pub fn preprocess(
        &self,
        image: &DynamicImage,
        target_width: usize,
        target_height: usize,
    ) -> Result<(ImageTensor, Canvas)> {
        let target_width = u32::try_from(target_width)
            .map_err(|_| StyleError::InvalidInput(format!("Target width too large: {}", target_width)))?;
        let target_height = u32::try_from(target_height)
            .map_err(|_| StyleError::InvalidInput(format!("Target height too large: {}", target_height)))?;

        let (pixels, geometry) = ImageTransforms::letterbox(
            image,
            target_width,
            target_height,
            self.background,
            self.filter,
        )?;

        tracing::debug!(
            "Letterboxed {}x{} -> {}x{} (draw {}x{} at {},{})",
            image.width(),
            image.height(),
            target_width,
            target_height,
            geometry.draw_width,
            geometry.draw_height,
            geometry.offset_x,
            geometry.offset_y
        );

        let tensor = Self::to_planar(&pixels);
        Ok((tensor, Canvas { pixels, geometry }))
    }

    /// RGBA交错像素 -> (1, 3, H, W) 平面张量，丢弃alpha
    pub fn to_planar(pixels: &RgbaImage) -> ImageTensor {
        let (width, height) = (pixels.width() as usize, pixels.height() as usize);
        let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, height, width));

        for (x, y, pixel) in pixels.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = f32::from(pixel[0]) / 255.0;
            tensor[[0, 1, y, x]] = f32::from(pixel[1]) / 255.0;
            tensor[[0, 2, y, x]] = f32::from(pixel[2]) / 255.0;
        }

        tensor
    }
}
