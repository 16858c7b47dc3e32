// 该文件是 Wangshan （望山） 项目的一部分。
// src/tensor.rs - 浮点张量定义
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

/// 扁平的 f32 数据加形状描述
#[derive(Debug, Clone)]
pub struct Tensor {
  data: Box<[f32]>,
  shape: Box<[usize]>,
}

impl Tensor {
  pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
    let numel: usize = shape.iter().product();
    if data.len() != numel {
      panic!("数据长度不匹配: 期望长度 {}, 实际长度 {}", numel, data.len());
    }

    Self {
      data: data.into_boxed_slice(),
      shape: shape.into_boxed_slice(),
    }
  }

  pub fn zeros(shape: Vec<usize>) -> Self {
    let numel: usize = shape.iter().product();
    Self {
      data: vec![0f32; numel].into_boxed_slice(),
      shape: shape.into_boxed_slice(),
    }
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn numel(&self) -> usize {
    self.data.len()
  }
}

impl AsRef<[f32]> for Tensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}
