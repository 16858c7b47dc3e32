// 该文件是 Wangshan （望山） 项目的一部分。
// src/postprocess.rs - 模型输出解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;
use tracing::debug;

use crate::model::Detection;
use crate::nms::non_max_suppression;
use crate::preprocess::Letterbox;
use crate::tensor::Tensor;

/// 解码置信度下限（硬编码，不可配置）
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// 模型输出布局
///
/// 从模型配置的输出形状解析一次，运行时不再逐次检查形状。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  /// [1, 4+C, N]：按列存放 cx/cy/w/h 与 C 个类别分数
  ChannelFirst {
    num_classes: usize,
    num_proposals: usize,
  },
  /// [1, N, 5]：按行存放 x1/y1/x2/y2/score，单一隐含类别
  ProposalFirst { num_proposals: usize },
}

#[derive(Error, Debug)]
pub enum PostprocessError {
  #[error("不支持的模型输出形状: {0:?}")]
  UnsupportedShape(Box<[usize]>),
  #[error("输出张量大小不匹配: 期望 {expected}, 实际 {actual}")]
  SizeMismatch { expected: usize, actual: usize },
}

impl OutputLayout {
  /// 从输出形状解析布局
  ///
  /// 末维为 5 的 [1, N, 5] 优先判定为行布局，其余 [1, 4+C, N]
  /// 在 C >= 1 时判定为列布局，无法识别的形状返回错误（非致命）。
  pub fn from_shape(shape: &[usize]) -> Result<Self, PostprocessError> {
    match shape {
      [1, n, 5] if *n > 0 => Ok(OutputLayout::ProposalFirst { num_proposals: *n }),
      [1, c, n] if *c > 4 && *n > 0 => Ok(OutputLayout::ChannelFirst {
        num_classes: c - 4,
        num_proposals: *n,
      }),
      _ => Err(PostprocessError::UnsupportedShape(shape.into())),
    }
  }

  /// 该布局对应的张量元素数
  pub fn numel(&self) -> usize {
    match self {
      OutputLayout::ChannelFirst {
        num_classes,
        num_proposals,
      } => (4 + num_classes) * num_proposals,
      OutputLayout::ProposalFirst { num_proposals } => num_proposals * 5,
    }
  }
}

/// 解码模型输出并做非极大值抑制
///
/// 候选框先按置信度下限过滤，再经信箱逆变换回原图像素空间。
/// 抑制阶段重复传入同一置信度下限，保持接口对称。
pub fn postprocess(
  output: &Tensor,
  letterbox: &Letterbox,
  layout: OutputLayout,
  iou_threshold: f32,
) -> Result<Vec<Detection>, PostprocessError> {
  let expected = layout.numel();
  if output.numel() != expected {
    return Err(PostprocessError::SizeMismatch {
      expected,
      actual: output.numel(),
    });
  }

  let candidates = match layout {
    OutputLayout::ChannelFirst {
      num_classes,
      num_proposals,
    } => decode_channel_first(output.data(), num_classes, num_proposals, letterbox),
    OutputLayout::ProposalFirst { num_proposals } => {
      decode_proposal_first(output.data(), num_proposals, letterbox)
    }
  };
  debug!("解码得到 {} 个候选框", candidates.len());

  Ok(non_max_suppression(
    candidates,
    CONFIDENCE_THRESHOLD,
    iou_threshold,
  ))
}

/// 解码 [1, 4+C, N] 列布局
fn decode_channel_first(
  data: &[f32],
  num_classes: usize,
  num_proposals: usize,
  letterbox: &Letterbox,
) -> Vec<Detection> {
  let mut detections = Vec::new();

  for i in 0..num_proposals {
    // 取最高类别分数，分数相同取最小类别索引
    let mut max_score = f32::MIN;
    let mut class_id = 0usize;
    for j in 0..num_classes {
      let score = data[(4 + j) * num_proposals + i];
      if score > max_score {
        max_score = score;
        class_id = j;
      }
    }

    if max_score <= CONFIDENCE_THRESHOLD {
      continue;
    }

    let xc = data[i];
    let yc = data[num_proposals + i];
    let w = data[2 * num_proposals + i];
    let h = data[3 * num_proposals + i];

    let x1 = letterbox.invert_x(xc - w / 2.0);
    let y1 = letterbox.invert_y(yc - h / 2.0);
    let x2 = letterbox.invert_x(xc + w / 2.0);
    let y2 = letterbox.invert_y(yc + h / 2.0);

    detections.push(Detection {
      class_id: class_id as u32,
      score: max_score,
      bbox: [x1, y1, x2 - x1, y2 - y1],
    });
  }

  detections
}

/// 解码 [1, N, 5] 行布局，坐标已是角点格式
fn decode_proposal_first(
  data: &[f32],
  num_proposals: usize,
  letterbox: &Letterbox,
) -> Vec<Detection> {
  let mut detections = Vec::new();

  for i in 0..num_proposals {
    let score = data[i * 5 + 4];
    if score <= CONFIDENCE_THRESHOLD {
      continue;
    }

    let x1 = letterbox.invert_x(data[i * 5]);
    let y1 = letterbox.invert_y(data[i * 5 + 1]);
    let x2 = letterbox.invert_x(data[i * 5 + 2]);
    let y2 = letterbox.invert_y(data[i * 5 + 3]);

    detections.push(Detection {
      class_id: 0,
      score,
      bbox: [x1, y1, x2 - x1, y2 - y1],
    });
  }

  detections
}
