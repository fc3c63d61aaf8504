// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/input/image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::Instant;

use image::{ImageReader, RgbImage};
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{CaptureError, CaptureSource},
};

/// 静态图片采集源，每次读取都返回同一张图片的新副本
pub struct ImageFileInput {
  image: RgbImage,
  frame_index: u64,
  start_time: Instant,
}

impl ImageFileInput {
  pub fn new(image: RgbImage) -> Self {
    Self {
      image,
      frame_index: 0,
      start_time: Instant::now(),
    }
  }

  pub fn open(path: &str) -> Result<Self, CaptureError> {
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    info!(
      "已打开图片输入: {} ({}x{})",
      path,
      image.width(),
      image.height()
    );
    Ok(Self::new(image))
  }
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = CaptureError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CaptureError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| CaptureError::DeviceUnavailable(format!("无效的路径编码: {}", e)))?;
    Self::open(&path)
  }
}

impl CaptureSource for ImageFileInput {
  fn read(&mut self) -> Result<Frame, CaptureError> {
    let frame = Frame {
      image: self.image.clone(),
      index: self.frame_index,
      timestamp_ms: self.start_time.elapsed().as_millis() as u64,
    };
    self.frame_index += 1;
    Ok(frame)
  }

  fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }
}
