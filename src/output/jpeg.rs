// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/output/jpeg.rs - JPEG 编码输出
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

use std::path::Path;

use image::codecs::jpeg;
use thiserror::Error;
use tracing::warn;

use crate::frame::Frame;

pub const DEFAULT_JPEG_QUALITY: u8 = 75;

#[derive(Error, Debug)]
pub enum EncodeError {
  #[error("JPEG 编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("空图像: {width}x{height}")]
  EmptyImage { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
  quality: u8,
}

impl Default for JpegEncoder {
  fn default() -> Self {
    Self {
      quality: DEFAULT_JPEG_QUALITY,
    }
  }
}

impl JpegEncoder {
  /// 质量范围 1..=100，超出范围时截断
  pub fn with_quality(quality: u8) -> Self {
    Self {
      quality: quality.clamp(1, 100),
    }
  }

  pub fn quality(&self) -> u8 {
    self.quality
  }

  /// 编码整帧；失败时不返回任何部分数据
  pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = frame.image.dimensions();
    if width == 0 || height == 0 {
      return Err(EncodeError::EmptyImage { width, height });
    }

    let mut buffer = Vec::new();
    jpeg::JpegEncoder::new_with_quality(&mut buffer, self.quality).encode_image(&frame.image)?;
    Ok(buffer)
  }

  /// 编码并写入文件，父目录不存在时自动创建
  pub fn save(&self, frame: &Frame, path: &Path) -> Result<(), EncodeError> {
    let bytes = self.encode(frame)?;
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    warn!("保存图像到文件: {}", path.display());
    Ok(())
  }
}
