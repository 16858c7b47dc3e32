// 该文件是 Wangshan （望山） 项目的一部分。
// src/nms.rs - 非极大值抑制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::model::Detection;

/// 计算两个检测框的交并比，框格式为 [x, y, width, height]
///
/// 两框均退化为零面积时交并比定义为 0，避免 NaN 扩散。
pub fn iou(a: &Detection, b: &Detection) -> f32 {
  let [ax, ay, aw, ah] = a.bbox;
  let [bx, by, bw, bh] = b.bbox;

  let x1 = ax.max(bx);
  let y1 = ay.max(by);
  let x2 = (ax + aw).min(bx + bw);
  let y2 = (ay + ah).min(by + bh);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = aw * ah + bw * bh - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

/// 贪心非极大值抑制
///
/// 类别无关：不同类别的高重叠框同样相互抑制。按分数稳定降序排序，
/// 依次保留当前最高分候选，剔除与其交并比达到阈值的其余候选。
/// 结果按分数降序排列，幸存框两两交并比均严格小于阈值。
pub fn non_max_suppression(
  detections: Vec<Detection>,
  score_threshold: f32,
  iou_threshold: f32,
) -> Vec<Detection> {
  let mut candidates: Vec<Detection> = detections
    .into_iter()
    .filter(|d| d.score > score_threshold)
    .collect();
  // 稳定排序，分数相同时保持输入顺序
  candidates.sort_by(|a, b| {
    b.score
      .partial_cmp(&a.score)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut suppressed = vec![false; candidates.len()];
  let mut result = Vec::with_capacity(candidates.len());

  for i in 0..candidates.len() {
    if suppressed[i] {
      continue;
    }
    for j in (i + 1)..candidates.len() {
      if suppressed[j] {
        continue;
      }
      if iou(&candidates[i], &candidates[j]) >= iou_threshold {
        suppressed[j] = true;
      }
    }
    result.push(candidates[i].clone());
  }

  result
}
