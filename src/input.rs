// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;
use tracing::error;

use crate::{FromUrl, frame::Frame};

#[derive(Error, Debug)]
pub enum CaptureError {
  #[error("采集设备不可用: {0}")]
  DeviceUnavailable(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("采集设备锁已损坏")]
  LockPoisoned,
}

/// 采集源：每次 `read` 返回一帧新的图像
pub trait CaptureSource: Send {
  fn read(&mut self) -> Result<Frame, CaptureError>;

  /// 帧尺寸
  fn dimensions(&self) -> (u32, u32);
}

/// 在并发请求之间共享同一个采集设备，同一时刻只允许一个读取者
pub struct SharedCapture {
  inner: Mutex<Box<dyn CaptureSource>>,
}

impl SharedCapture {
  pub fn new(source: impl CaptureSource + 'static) -> Self {
    Self {
      inner: Mutex::new(Box::new(source)),
    }
  }

  pub fn read(&self) -> Result<Frame, CaptureError> {
    let mut source = self.inner.lock().map_err(|_| {
      error!("采集设备锁已损坏");
      CaptureError::LockPoisoned
    })?;
    source.read()
  }
}

mod image_file;
pub use self::image_file::ImageFileInput;

#[cfg(feature = "v4l_input")]
mod v4l2_source;
#[cfg(feature = "v4l_input")]
pub use self::v4l2_source::V4l2Source;

pub enum InputWrapper {
  ImageFile(ImageFileInput),
  #[cfg(feature = "v4l_input")]
  V4l2(V4l2Source),
}

impl FromUrl for InputWrapper {
  type Error = CaptureError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    if url.scheme() == ImageFileInput::SCHEME {
      return Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?));
    }
    #[cfg(feature = "v4l_input")]
    {
      if url.scheme() == V4l2Source::SCHEME {
        return Ok(InputWrapper::V4l2(V4l2Source::from_url(url)?));
      }
    }
    Err(CaptureError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl CaptureSource for InputWrapper {
  fn read(&mut self) -> Result<Frame, CaptureError> {
    match self {
      InputWrapper::ImageFile(input) => input.read(),
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l2(input) => input.read(),
    }
  }

  fn dimensions(&self) -> (u32, u32) {
    match self {
      InputWrapper::ImageFile(input) => input.dimensions(),
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l2(input) => input.dimensions(),
    }
  }
}
