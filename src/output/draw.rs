// 该文件是 Wangshan （望山） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::model::Detection;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BORDER_THICKNESS: i32 = 2;

// 分数分级颜色
const HIGH_SCORE_THRESHOLD: f32 = 0.85;
const MID_SCORE_THRESHOLD: f32 = 0.6;
const HIGH_SCORE_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const MID_SCORE_COLOR: [u8; 3] = [255, 255, 0]; // 黄色
const LOW_SCORE_COLOR: [u8; 3] = [255, 0, 0]; // 红色

/// 按分数分级取边框颜色
pub fn color_for_score(score: f32) -> [u8; 3] {
  if score > HIGH_SCORE_THRESHOLD {
    HIGH_SCORE_COLOR
  } else if score > MID_SCORE_THRESHOLD {
    MID_SCORE_COLOR
  } else {
    LOW_SCORE_COLOR
  }
}

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 检测框绘制器
///
/// 字体未加载时只画边框，跳过分数标签。
pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  scale: f32,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new(1.0)
  }
}

impl Draw {
  /// 创建绘制器，scale 为显示缩放系数
  pub fn new(scale: f32) -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      scale,
    }
  }

  /// 从 TTF 文件加载标签字体
  pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    self.font = Some(FontVec::try_from_vec(data)?);
    Ok(self)
  }

  /// 在图像上绘制全部检测框与分数标签
  pub fn draw_detections_on_image(&self, image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
      self.draw_bbox_with_label(image, detection);
    }
  }

  // bbox 为原图像素空间的 [x, y, w, h]，按显示缩放系数换算后绘制
  fn draw_bbox_with_label(&self, image: &mut RgbImage, detection: &Detection) {
    let (w, h) = (image.width() as i32, image.height() as i32);

    let x_min = ((detection.bbox[0] * self.scale).floor() as i32).clamp(0, w - 1);
    let y_min = ((detection.bbox[1] * self.scale).floor() as i32).clamp(0, h - 1);
    let x_max = (((detection.bbox[0] + detection.bbox[2]) * self.scale).ceil() as i32)
      .clamp(0, w - 1);
    let y_max = (((detection.bbox[1] + detection.bbox[3]) * self.scale).ceil() as i32)
      .clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = Rgb(color_for_score(detection.score));

    // 边框加粗为 2 像素
    for t in 0..BORDER_THICKNESS {
      let width = ((x_max - x_min) - 2 * t).max(1) as u32;
      let height = ((y_max - y_min) - 2 * t).max(1) as u32;
      let rect = Rect::at(x_min + t, y_min + t).of_size(width, height);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{:.2}", detection.score);
    let px_scale = PxScale::from(self.font_size);
    let text_color = Rgb([255u8, 255u8, 255u8]);

    // 估算文本大小（粗略估计）
    let text_width = (label.len() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    // 标签背景放在边框上方，不超出图像边界
    let label_x = x_min.max(0);
    let label_y = (y_min - text_height).max(0);
    let max_width = (w - label_x).max(0);
    let label_width = text_width.min(max_width) as u32;
    let label_height = text_height as u32;

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, color);

      draw_text_mut(
        image,
        text_color,
        label_x,
        label_y + self.label_text_vertical_padding,
        px_scale,
        font,
        &label,
      );
    }
  }
}
