// 该文件是 Wangshan （望山） 项目的一部分。
// src/model/registry.rs - 模型注册表
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::postprocess::{OutputLayout, PostprocessError};

/// 单个模型的静态配置
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
  /// 模型文件路径
  pub path: String,
  /// 输入形状 [1, 3, H, W]
  pub input_shape: Vec<usize>,
  /// 输出形状，决定解码布局
  pub output_shape: Vec<usize>,
}

#[derive(Error, Debug)]
pub enum RegistryError {
  #[error("未知模型: {0}")]
  UnknownModel(String),
  #[error("模型 {0} 的输出形状不受支持: {1}")]
  UnsupportedModel(String, PostprocessError),
  #[error("注册表读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("注册表解析错误: {0}")]
  Parse(#[from] serde_json::Error),
}

/// 模型名称到配置的映射
#[derive(Debug, Clone)]
pub struct ModelRegistry {
  models: HashMap<String, ModelConfig>,
}

impl ModelRegistry {
  /// 内置模型表
  pub fn builtin() -> Self {
    let mut models = HashMap::new();
    models.insert(
      "lin_0725".to_string(),
      ModelConfig {
        path: "./model/lin_0725.onnx".to_string(),
        input_shape: vec![1, 3, 640, 640],
        output_shape: vec![1, 5, 8400],
      },
    );
    models.insert(
      "cheng".to_string(),
      ModelConfig {
        path: "./model/cheng.onnx".to_string(),
        input_shape: vec![1, 3, 640, 640],
        output_shape: vec![1, 5, 8400],
      },
    );
    Self { models }
  }

  /// 从 JSON 文本加载模型表
  ///
  /// 格式与内置表一致，键为模型名，值为
  /// `{ "path": ..., "inputShape": [1,3,H,W], "outputShape": [...] }`。
  pub fn from_json(text: &str) -> Result<Self, RegistryError> {
    let models: HashMap<String, ModelConfig> = serde_json::from_str(text)?;
    debug!("模型注册表加载完成, 共 {} 个模型", models.len());
    Ok(Self { models })
  }

  /// 从 JSON 文件加载模型表
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_json(&text)
  }

  /// 查找模型配置并解析输出布局
  ///
  /// 输出布局只在此处解析一次，不支持的形状在配置阶段即暴露为错误。
  pub fn resolve(&self, name: &str) -> Result<(ModelConfig, OutputLayout), RegistryError> {
    let config = self
      .models
      .get(name)
      .cloned()
      .ok_or_else(|| RegistryError::UnknownModel(name.to_string()))?;
    let layout = OutputLayout::from_shape(&config.output_shape)
      .map_err(|e| RegistryError::UnsupportedModel(name.to_string(), e))?;
    Ok((config, layout))
  }

  /// 已注册的模型名称
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.models.keys().map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_models_resolve() {
    let registry = ModelRegistry::builtin();
    let (config, layout) = registry.resolve("lin_0725").unwrap();
    assert_eq!(config.input_shape, vec![1, 3, 640, 640]);
    assert_eq!(
      layout,
      OutputLayout::ChannelFirst {
        num_classes: 1,
        num_proposals: 8400
      }
    );
  }

  #[test]
  fn unknown_model_is_an_error() {
    let registry = ModelRegistry::builtin();
    assert!(matches!(
      registry.resolve("lai"),
      Err(RegistryError::UnknownModel(_))
    ));
  }

  #[test]
  fn json_table_uses_camel_case_keys() {
    let registry = ModelRegistry::from_json(
      r#"{
        "lai": {
          "path": "./model/lai.onnx",
          "inputShape": [1, 3, 640, 640],
          "outputShape": [1, 300, 5]
        }
      }"#,
    )
    .unwrap();
    let (_, layout) = registry.resolve("lai").unwrap();
    assert_eq!(layout, OutputLayout::ProposalFirst { num_proposals: 300 });
  }

  #[test]
  fn unsupported_output_shape_is_a_config_error() {
    let registry = ModelRegistry::from_json(
      r#"{
        "bad": {
          "path": "./model/bad.onnx",
          "inputShape": [1, 3, 640, 640],
          "outputShape": [1, 2, 3, 4]
        }
      }"#,
    )
    .unwrap();
    assert!(matches!(
      registry.resolve("bad"),
      Err(RegistryError::UnsupportedModel(_, _))
    ));
  }
}
