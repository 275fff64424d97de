use crate::image::preprocessing::{Canvas, RGB_CHANNELS};
use crate::utils::error::StyleError;
use crate::Result;
use image::{Rgba, RgbaImage};
use serde::Serialize;

/// 推断出的模型输出取值范围
///
/// 模型元数据不声明输出约定，只能按整个张量的全局min/max猜测，属于近似判断。
/// 例如输出从未超出`[-0.2, 1.2]`的[-1, 1]模型会被当作[0, 1]处理。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputRange {
    /// [0, 1]：截断后乘255
    UnitInterval,
    /// [-1, 1]：v * 0.5 + 0.5
    Symmetric,
    /// 任意范围：按观测到的min/max线性拉伸到[0, 255]
    Observed { min: f32, max: f32 },
}

impl OutputRange {
    /// 扫描全部值的全局min/max并选择映射方式
    pub fn detect(values: &[f32]) -> Self {
        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });

        if max <= 1.2 && min >= -0.2 {
            OutputRange::UnitInterval
        } else if max <= 1.1 && min >= -1.1 {
            OutputRange::Symmetric
        } else {
            OutputRange::Observed { min, max }
        }
    }

    /// 将单个通道值映射到[0, 255]（未截断）
    pub fn to_intensity(&self, value: f32) -> f32 {
        match *self {
            OutputRange::UnitInterval => value.clamp(0.0, 1.0) * 255.0,
            OutputRange::Symmetric => (value * 0.5 + 0.5) * 255.0,
            OutputRange::Observed { min, max } => {
                let scale = if max == min { 1.0 } else { 1.0 / (max - min) };
                (value - min) * scale * 255.0
            }
        }
    }
}

/// 饱和转换到8位（NaN记为0）
#[inline]
fn saturate(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

pub struct OutputDecoder;

impl OutputDecoder {
    /// 平面张量 -> RGBA交错像素，alpha固定为255
    pub fn planar_to_rgba(data: &[f32], width: u32, height: u32) -> Result<(RgbaImage, OutputRange)> {
        let plane = width as usize * height as usize;
        if plane == 0 {
            return Err(StyleError::InvalidInput(format!(
                "Invalid output size: {}x{}",
                width, height
            )));
        }
        if data.len() != RGB_CHANNELS * plane {
            return Err(StyleError::InferenceFailed(format!(
                "Output tensor has {} values, expected {} for 3x{}x{}",
                data.len(),
                RGB_CHANNELS * plane,
                height,
                width
            )));
        }

        let range = OutputRange::detect(data);
        tracing::debug!("Detected output range: {:?}", range);

        let mut image = RgbaImage::new(width, height);
        for (p, pixel) in image.pixels_mut().enumerate() {
            let r = range.to_intensity(data[p]);
            let g = range.to_intensity(data[p + plane]);
            let b = range.to_intensity(data[p + 2 * plane]);
            *pixel = Rgba([saturate(r), saturate(g), saturate(b), 255]);
        }

        Ok((image, range))
    }

    /// 解码输出张量，写回画布并导出为PNG data URI
    pub fn decode(
        data: &[f32],
        width: u32,
        height: u32,
        canvas: &mut Canvas,
    ) -> Result<(String, OutputRange)> {
        let (pixels, range) = Self::planar_to_rgba(data, width, height)?;
        canvas.put_pixels(pixels)?;
        let data_uri = canvas.to_data_uri()?;

        Ok((data_uri, range))
    }
}
