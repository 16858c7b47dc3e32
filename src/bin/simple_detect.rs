// 该文件是 Wangshan （望山） 项目的一部分。
// src/bin/simple_detect.rs - 简单的单图检测代码
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use wangshan::{
  FromUrl,
  detector::Detector,
  input::InputWrapper,
  model::{ModelRegistry, OrtBackend, Session},
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

/// Wangshan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型名称（注册表中的键）
  #[arg(long, default_value = "lin_0725", value_name = "NAME")]
  pub model: String,

  /// 模型注册表 JSON 文件，缺省使用内置注册表
  #[arg(long, value_name = "FILE")]
  pub registry: Option<String>,

  /// 输入来源，如 image:///path/to/input.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径，如 "file:///path/to/output.png?font=/usr/share/fonts/font.ttf"
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub iou_threshold: f32,

  /// 推理执行器（cpu 或 cuda）
  #[arg(long, default_value = "cpu", value_name = "PROVIDER")]
  pub provider: String,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型名称: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let registry = match &args.registry {
    Some(path) => ModelRegistry::from_json_file(path)?,
    None => ModelRegistry::builtin(),
  };
  let (config, layout) = registry.resolve(&args.model)?;
  info!("模型文件路径: {}", config.path);

  let mut session = Session::Unloaded;
  session.load(|| OrtBackend::from_file(&config.path, &args.provider));
  let backend = session
    .backend()
    .ok_or_else(|| anyhow::anyhow!("模型会话未就绪"))?;

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let detector = Detector::new(backend, &config, layout, args.iou_threshold);

  let stats = OneShotTask.run_task(input, &detector, output)?;
  info!(
    "检测目标数: {}, 推理耗时: {:.2} ms, 平均置信度: {:.2}%, 执行器: {}",
    stats.detected_objects, stats.inference_time_ms, stats.avg_confidence, stats.provider
  );

  Ok(())
}
