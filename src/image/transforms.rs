use crate::utils::error::StyleError;
use crate::Result;
use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, Rgba, RgbaImage};

/// letterbox缩放几何信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxGeometry {
    pub target_width: u32,
    pub target_height: u32,
    /// 统一缩放比例（保持宽高比，不裁剪）
    pub scale: f64,
    pub draw_width: u32,
    pub draw_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl LetterboxGeometry {
    /// 计算源图像在目标画布中的绘制区域
    pub fn fit(
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Self> {
        if source_width == 0 || source_height == 0 {
            return Err(StyleError::InvalidInput(format!(
                "Cannot letterbox an empty image: {}x{}",
                source_width, source_height
            )));
        }
        if target_width == 0 || target_height == 0 {
            return Err(StyleError::InvalidInput(format!(
                "Invalid target size: {}x{}",
                target_width, target_height
            )));
        }

        let scale = (target_width as f64 / source_width as f64)
            .min(target_height as f64 / source_height as f64);

        // 极端宽高比时至少保留1个像素
        let draw_width = ((source_width as f64 * scale).round() as u32).clamp(1, target_width);
        let draw_height = ((source_height as f64 * scale).round() as u32).clamp(1, target_height);

        Ok(Self {
            target_width,
            target_height,
            scale,
            draw_width,
            draw_height,
            offset_x: (target_width - draw_width) / 2,
            offset_y: (target_height - draw_height) / 2,
        })
    }

    /// 像素是否落在绘制区域内
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.offset_x
            && x < self.offset_x + self.draw_width
            && y >= self.offset_y
            && y < self.offset_y + self.draw_height
    }
}

/// 图像变换工具集
pub struct ImageTransforms;

impl ImageTransforms {
    /// 等比缩放并居中绘制到填充了背景色的画布上
    pub fn letterbox(
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
        background: Rgba<u8>,
        filter: FilterType,
    ) -> Result<(RgbaImage, LetterboxGeometry)> {
        let (width, height) = image.dimensions();
        let geometry = LetterboxGeometry::fit(width, height, target_width, target_height)?;

        let mut canvas = RgbaImage::from_pixel(target_width, target_height, background);

        let source = image.to_rgba8();
        let scaled = if (geometry.draw_width, geometry.draw_height) == (width, height) {
            source
        } else {
            imageops::resize(&source, geometry.draw_width, geometry.draw_height, filter)
        };

        // source-over合成，不透明像素直接复制
        imageops::overlay(
            &mut canvas,
            &scaled,
            i64::from(geometry.offset_x),
            i64::from(geometry.offset_y),
        );

        Ok((canvas, geometry))
    }
}
