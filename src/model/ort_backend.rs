// 该文件是 Wangshan （望山） 项目的一部分。
// src/model/ort_backend.rs - ONNX Runtime 推理后端
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

use std::sync::Mutex;

use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::Session;
use ort::value::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{Backend, INPUT_NAME, OUTPUT_NAME};
use crate::tensor::Tensor;

#[derive(Error, Debug)]
pub enum OrtBackendError {
  #[error("ORT 错误: {0}")]
  Ort(#[from] ort::Error),
  #[error("未知执行器: {0}")]
  UnknownProvider(String),
  #[error("缺少输出槽: {0}")]
  MissingOutput(&'static str),
  #[error("会话锁中毒")]
  SessionPoisoned,
}

/// 基于 ONNX Runtime 的推理后端
///
/// 会话加锁保护，单次流水线调用独占一次推理。
pub struct OrtBackend {
  session: Mutex<Session>,
  provider: String,
}

impl OrtBackend {
  /// 从模型文件创建会话，执行器以名称选择（"cpu" 或 "cuda"）
  pub fn from_file(path: &str, provider: &str) -> Result<Self, OrtBackendError> {
    info!("加载模型文件: {}", path);

    let builder = Session::builder()?;
    let session = match provider {
      "cpu" => builder
        .with_execution_providers([CPUExecutionProvider::default().build()])?
        .commit_from_file(path)?,
      "cuda" => builder
        .with_execution_providers([CUDAExecutionProvider::default().build()])?
        .commit_from_file(path)?,
      other => return Err(OrtBackendError::UnknownProvider(other.to_string())),
    };
    info!("模型会话创建完成, 执行器: {}", provider);

    Ok(Self {
      session: Mutex::new(session),
      provider: provider.to_string(),
    })
  }
}

impl Backend for OrtBackend {
  type Error = OrtBackendError;

  fn run(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    let value = Value::from_array((
      input.shape(),
      input.data().to_vec().into_boxed_slice(),
    ))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OrtBackendError::SessionPoisoned)?;
    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![INPUT_NAME => value])?;

    let output = outputs
      .get(OUTPUT_NAME)
      .ok_or(OrtBackendError::MissingOutput(OUTPUT_NAME))?;
    let (shape, data) = output.try_extract_tensor::<f32>()?;
    let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    debug!("模型输出形状: {:?}", shape);

    Ok(Tensor::new(data.to_vec(), shape))
  }

  fn provider(&self) -> &str {
    &self.provider
  }
}
