// 该文件是 Wangshan （望山） 项目的一部分。
// src/detector.rs - 检测流水线
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{Backend, Detection, ModelConfig};
use crate::postprocess::{self, OutputLayout};
use crate::preprocess::{self, PreprocessError};

/// 单次检测的运行统计
#[derive(Debug, Clone)]
pub struct DetectStats {
  /// 检测目标数
  pub detected_objects: usize,
  /// 推理耗时（毫秒）
  pub inference_time_ms: f64,
  /// 平均置信度（百分比）
  pub avg_confidence: f32,
  /// 执行器名称
  pub provider: String,
}

#[derive(Error, Debug)]
pub enum DetectorError<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  #[error("预处理错误: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("推理后端错误: {0}")]
  Backend(E),
}

/// 单图检测流水线：预处理 -> 推理 -> 解码 -> 抑制
///
/// 流水线本身无共享可变状态，同一实例每次调用独立生成变换记录；
/// 后端由调用方以就绪状态传入。
pub struct Detector<'a, B: Backend> {
  backend: &'a B,
  input_shape: Vec<usize>,
  layout: OutputLayout,
  iou_threshold: f32,
}

impl<'a, B: Backend> Detector<'a, B> {
  pub fn new(
    backend: &'a B,
    config: &ModelConfig,
    layout: OutputLayout,
    iou_threshold: f32,
  ) -> Self {
    Self {
      backend,
      input_shape: config.input_shape.clone(),
      layout,
      iou_threshold,
    }
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  /// 调整抑制阈值，下次 detect 生效
  pub fn set_iou_threshold(&mut self, iou_threshold: f32) {
    self.iou_threshold = iou_threshold;
  }

  /// 对单张图像执行完整检测
  ///
  /// 后端失败向上传播；解码阶段的配置性错误降级为空结果并记录诊断。
  pub fn detect(
    &self,
    image: &RgbImage,
  ) -> Result<(Vec<Detection>, DetectStats), DetectorError<B::Error>> {
    let (tensor, letterbox) = preprocess::preprocess(image, &self.input_shape)?;

    debug!("执行推理后端, 执行器: {}", self.backend.provider());
    let start = Instant::now();
    let output = self.backend.run(&tensor).map_err(DetectorError::Backend)?;
    let inference_time_ms = start.elapsed().as_secs_f64() * 1e3;

    let detections =
      match postprocess::postprocess(&output, &letterbox, self.layout, self.iou_threshold) {
        Ok(detections) => detections,
        Err(e) => {
          warn!("后处理失败, 降级为空检测结果: {}", e);
          Vec::new()
        }
      };

    let stats = self.stats(&detections, inference_time_ms);
    info!(
      "检测到 {} 个目标, 推理耗时 {:.2} ms, 平均置信度 {:.2}%",
      stats.detected_objects, stats.inference_time_ms, stats.avg_confidence
    );

    Ok((detections, stats))
  }

  fn stats(&self, detections: &[Detection], inference_time_ms: f64) -> DetectStats {
    let avg_confidence = if detections.is_empty() {
      0.0
    } else {
      detections.iter().map(|d| d.score).sum::<f32>() / detections.len() as f32 * 100.0
    };

    DetectStats {
      detected_objects: detections.len(),
      inference_time_ms,
      avg_confidence,
      provider: self.backend.provider().to_string(),
    }
  }
}
