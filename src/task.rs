// 该文件是 Wangshan （望山） 项目的一部分。
// src/task.rs - 任务定义
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

use image::RgbImage;
use tracing::info;

use crate::detector::{DetectStats, Detector};
use crate::model::{Backend, Detection};
use crate::output::Render;

pub trait Task<D, I, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: D, output: O) -> Result<DetectStats, Self::Error>;
}

/// 单次任务：取一帧，检测，渲染
///
/// 一次流水线运行到完成为止，期间不接受新的输入事件。
pub struct OneShotTask;

impl<'a, 'b, B, I, O, RE> Task<&'a Detector<'b, B>, I, O> for OneShotTask
where
  B: Backend,
  I: Iterator<Item = RgbImage>,
  RE: std::error::Error + Send + Sync + 'static,
  O: Render<RgbImage, Vec<Detection>, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    detector: &'a Detector<'b, B>,
    output: O,
  ) -> Result<DetectStats, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");

    let now = std::time::Instant::now();
    let (detections, stats) = detector.detect(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    output.render_result(&frame, &detections)?;
    info!("渲染完成");

    Ok(stats)
  }
}
