// 该文件是 Wangshan （望山） 项目的一部分。
// src/model.rs - 模型与推理后端定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::{error, info};

use crate::tensor::Tensor;

/// 模型输入槽名称
pub const INPUT_NAME: &str = "images";
/// 模型输出槽名称
pub const OUTPUT_NAME: &str = "output0";

/// 单个检测结果
///
/// bbox 为原图像素空间的 [x, y, width, height]，创建后不再修改。
#[derive(Debug, Clone)]
pub struct Detection {
  /// 类别索引
  pub class_id: u32,
  /// 置信度
  pub score: f32,
  /// 边界框
  pub bbox: [f32; 4],
}

/// 推理后端
///
/// 输入取 "images" 槽，输出取 "output0" 槽。单个后端实例同一时刻
/// 只服务一次流水线调用，内部如需共享须自行同步。
pub trait Backend {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 执行一次前向推理
  fn run(&self, input: &Tensor) -> Result<Tensor, Self::Error>;

  /// 后端执行器名称（如 "cpu"、"cuda"）
  fn provider(&self) -> &str;
}

/// 模型会话状态机，由调用方持有
#[derive(Debug, Default)]
pub enum Session<B> {
  #[default]
  Unloaded,
  Loading,
  Ready(B),
  Failed(String),
}

impl<B> Session<B> {
  /// 执行加载过程并迁移状态
  pub fn load<E: std::fmt::Display>(&mut self, loader: impl FnOnce() -> Result<B, E>) {
    *self = Session::Loading;
    match loader() {
      Ok(backend) => {
        info!("模型会话就绪");
        *self = Session::Ready(backend);
      }
      Err(e) => {
        error!("模型会话创建失败: {}", e);
        *self = Session::Failed(e.to_string());
      }
    }
  }

  pub fn backend(&self) -> Option<&B> {
    match self {
      Session::Ready(backend) => Some(backend),
      _ => None,
    }
  }

  pub fn is_ready(&self) -> bool {
    matches!(self, Session::Ready(_))
  }
}

mod registry;
pub use self::registry::{ModelConfig, ModelRegistry, RegistryError};

#[cfg(feature = "ort_backend")]
mod ort_backend;
#[cfg(feature = "ort_backend")]
pub use self::ort_backend::{OrtBackend, OrtBackendError};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn session_moves_to_ready_on_success() {
    let mut session: Session<u32> = Session::Unloaded;
    assert!(!session.is_ready());
    session.load(|| Ok::<_, std::convert::Infallible>(7));
    assert!(session.is_ready());
    assert_eq!(session.backend(), Some(&7));
  }

  #[test]
  fn session_moves_to_failed_on_error() {
    let mut session: Session<u32> = Session::Unloaded;
    session.load(|| Err("加载失败"));
    assert!(!session.is_ready());
    assert!(matches!(session, Session::Failed(_)));
  }
}
