// 该文件是 Wangshan （望山） 项目的一部分。
// src/output/save_image_file.rs - 图像文件输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::model::Detection;
use crate::output::Render;
use crate::output::draw::{Draw, DrawError};
use crate::{FromUrl, FromUrlWithScheme};

const SAVE_IMAGE_FILE_SCHEME: &str = "file";

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无效的查询参数 {0}: {1}")]
  BadParam(String, String),
  #[error("字体加载错误: {0}")]
  Font(#[from] DrawError),
  #[error("图像保存错误: {0}")]
  ImageSave(#[from] image::ImageError),
}

/// 把带检测框的图像写入文件
///
/// URL 查询参数: `scale=<f32>` 显示缩放系数（缺省 1.0），
/// `font=<路径>` 标签字体文件，缺省不画标签。
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != SAVE_IMAGE_FILE_SCHEME {
      return Err(SaveImageFileError::SchemeMismatch);
    }

    let mut scale = 1.0f32;
    let mut font_path = None;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "scale" => {
          scale = value.parse().map_err(|_| {
            SaveImageFileError::BadParam("scale".to_string(), value.to_string())
          })?;
        }
        "font" => font_path = Some(value.to_string()),
        other => warn!("忽略未知查询参数: {}", other),
      }
    }

    let mut draw = Draw::new(scale);
    if let Some(font_path) = font_path {
      draw = draw.with_font_file(font_path)?;
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(url.path()),
      draw,
    })
  }
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = SAVE_IMAGE_FILE_SCHEME;
}

impl Render<RgbImage, Vec<Detection>> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbImage, result: &Vec<Detection>) -> Result<(), Self::Error> {
    let mut image = frame.clone();
    self.draw.draw_detections_on_image(&mut image, result);
    image.save(&self.path)?;
    info!("检测结果已保存到 {}", self.path.display());
    Ok(())
  }
}
