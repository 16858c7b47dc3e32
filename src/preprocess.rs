// 该文件是 Wangshan （望山） 项目的一部分。
// src/preprocess.rs - 图像预处理（信箱缩放）
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::{Rgb, RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::tensor::Tensor;

/// 信箱变换记录
///
/// 每次推理调用生成一份，解码结束时用于把模型输入空间的坐标
/// 还原到原图像素空间，之后即丢弃。
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
  /// 等比缩放系数
  pub ratio: f32,
  /// 水平方向对称填充，可能为小数
  pub pad_x: f32,
  /// 垂直方向对称填充，可能为小数
  pub pad_y: f32,
}

impl Letterbox {
  pub fn invert_x(&self, x: f32) -> f32 {
    (x - self.pad_x) / self.ratio
  }

  pub fn invert_y(&self, y: f32) -> f32 {
    (y - self.pad_y) / self.ratio
  }
}

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("图像尺寸无效: {0}x{1}")]
  InvalidImage(u32, u32),
  #[error("模型输入形状无效: {0:?}")]
  InvalidInputShape(Box<[usize]>),
}

/// 将图像信箱缩放到模型输入尺寸
///
/// 黑色填充，等比缩放（保持宽高比），归一化到 [0,1]，输出
/// [1, 3, H, W] 通道平面张量与本次调用的变换记录。
pub fn preprocess(
  image: &RgbImage,
  input_shape: &[usize],
) -> Result<(Tensor, Letterbox), PreprocessError> {
  let (model_h, model_w) = match input_shape {
    [1, 3, h, w] if *h > 0 && *w > 0 => (*h, *w),
    _ => return Err(PreprocessError::InvalidInputShape(input_shape.into())),
  };
  if image.width() == 0 || image.height() == 0 {
    return Err(PreprocessError::InvalidImage(image.width(), image.height()));
  }

  let ratio = f32::min(
    model_w as f32 / image.width() as f32,
    model_h as f32 / image.height() as f32,
  );
  let new_w = (image.width() as f32 * ratio).round() as u32;
  let new_h = (image.height() as f32 * ratio).round() as u32;
  let pad_x = (model_w as f32 - new_w as f32) / 2.0;
  let pad_y = (model_h as f32 - new_h as f32) / 2.0;

  debug!(
    "信箱缩放: {}x{} -> {}x{}, ratio={:.4}, pad=({:.1}, {:.1})",
    image.width(),
    image.height(),
    new_w,
    new_h,
    ratio,
    pad_x,
    pad_y
  );

  let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);
  let mut canvas = RgbImage::from_pixel(model_w as u32, model_h as u32, Rgb([0, 0, 0]));
  imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

  // 按通道平面展开并归一化
  let plane = model_w * model_h;
  let mut data = vec![0f32; 3 * plane];
  for (x, y, pixel) in canvas.enumerate_pixels() {
    let idx = (y as usize) * model_w + x as usize;
    data[idx] = pixel[0] as f32 / 255.0;
    data[plane + idx] = pixel[1] as f32 / 255.0;
    data[2 * plane + idx] = pixel[2] as f32 / 255.0;
  }

  let tensor = Tensor::new(data, vec![1, 3, model_h, model_w]);
  let letterbox = Letterbox {
    ratio,
    pad_x,
    pad_y,
  };
  Ok((tensor, letterbox))
}
