// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::pin::Pin;
use std::time::Instant;

use image::RgbImage;
use tracing::{error, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{CaptureError, CaptureSource},
};

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// V4L2 摄像头输入源
///
/// 由于 v4l 库的 Stream 需要引用 Device，我们使用 Pin<Box<Device>> 来保证
/// Device 的内存地址稳定，从而可以安全地创建引用它的 Stream。
pub struct V4l2Source {
  /// 设备描述，用于日志
  name: String,
  /// V4L2 设备（使用 Pin<Box> 固定内存位置）
  device: Pin<Box<Device>>,
  /// 捕获流（生命周期与 device 关联）
  stream: Option<Stream<'static>>,
  /// 帧索引
  frame_index: u64,
  /// 视频宽度
  width: u32,
  /// 视频高度
  height: u32,
  /// 开始时间
  start_time: Instant,
}

fn unavailable(name: &str, err: impl std::fmt::Display) -> CaptureError {
  CaptureError::DeviceUnavailable(format!("{}: {}", name, err))
}

impl V4l2Source {
  /// 按设备序号打开摄像头（`/dev/video{index}`）
  pub fn with_index(index: usize, width: u32, height: u32) -> Result<Self, CaptureError> {
    let name = format!("/dev/video{}", index);
    let device = Device::new(index).map_err(|e| unavailable(&name, e))?;
    Self::with_device(name, device, width, height)
  }

  /// 按设备路径打开摄像头
  pub fn with_path(path: &str, width: u32, height: u32) -> Result<Self, CaptureError> {
    let device = Device::with_path(path).map_err(|e| unavailable(path, e))?;
    Self::with_device(path.to_string(), device, width, height)
  }

  fn with_device(
    name: String,
    device: Device,
    width: u32,
    height: u32,
  ) -> Result<Self, CaptureError> {
    let device = Box::pin(device);

    // 设置视频格式
    let mut format = device.format().map_err(|e| unavailable(&name, e))?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device
      .set_format(&format)
      .map_err(|e| unavailable(&name, e))?;
    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(unavailable(&name, format!("不支持的像素格式 {}", format.fourcc)));
    }

    let mut source = Self {
      name,
      device,
      stream: None,
      frame_index: 0,
      width: format.width,
      height: format.height,
      start_time: Instant::now(),
    };

    // 创建捕获流
    // SAFETY: device 被 Pin<Box> 固定，不会移动，所以引用始终有效
    // Stream 的生命周期通过 source 的 Drop 来管理
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      // 将设备引用的生命周期延长到 'static
      // 这是安全的，因为:
      // 1. device 被 Pin<Box> 固定在堆上，不会移动
      // 2. stream 存储在同一个结构体中，会在 device 之前被 drop
      // 3. Drop 顺序：stream (Option::take) -> device
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, 4)
        .map_err(|e| unavailable(&source.name, e))?
    };
    source.stream = Some(stream);

    info!(
      "摄像头已打开: {} {}x{}",
      source.name, source.width, source.height
    );
    Ok(source)
  }

  /// 将 YUYV 格式转换为 RGB
  fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);

    for chunk in yuyv.chunks_exact(4) {
      let y0 = chunk[0] as f32;
      let u = chunk[1] as f32 - 128.0;
      let y1 = chunk[2] as f32;
      let v = chunk[3] as f32 - 128.0;

      for y in [y0, y1] {
        let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
        let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
        let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
        rgb.extend_from_slice(&[r, g, b]);
      }
    }

    rgb
  }
}

impl Drop for V4l2Source {
  fn drop(&mut self) {
    // 确保 stream 在 device 之前被 drop
    self.stream.take();
    info!("摄像头已关闭: {}", self.name);
  }
}

impl FromUrlWithScheme for V4l2Source {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4l2Source {
  type Error = CaptureError;

  /// 格式: v4l:///dev/video0?width=640&height=480
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CaptureError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = if url.path().is_empty() || url.path() == "/" {
      "/dev/video0".to_string()
    } else {
      url.path().to_string()
    };

    let mut width = DEFAULT_WIDTH;
    let mut height = DEFAULT_HEIGHT;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "width" => width = value.parse().unwrap_or(DEFAULT_WIDTH),
        "height" => height = value.parse().unwrap_or(DEFAULT_HEIGHT),
        _ => {}
      }
    }

    Self::with_path(&path, width, height)
  }
}

impl CaptureSource for V4l2Source {
  fn read(&mut self) -> Result<Frame, CaptureError> {
    let stream = self
      .stream
      .as_mut()
      .ok_or_else(|| CaptureError::DeviceUnavailable(format!("{}: 捕获流已关闭", self.name)))?;

    let (buffer, meta) = stream.next().map_err(|e| unavailable(&self.name, e))?;
    let used = (meta.bytesused as usize).min(buffer.len());
    let used = if used == 0 { buffer.len() } else { used };
    let rgb_data = Self::yuyv_to_rgb(&buffer[..used], self.width, self.height);

    let image = RgbImage::from_raw(self.width, self.height, rgb_data)
      .ok_or_else(|| unavailable(&self.name, "帧数据长度不足"))?;

    let frame = Frame {
      image,
      index: self.frame_index,
      timestamp_ms: self.start_time.elapsed().as_millis() as u64,
    };
    self.frame_index += 1;
    Ok(frame)
  }

  fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }
}
