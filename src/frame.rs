// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/frame.rs - 彩色帧与灰度帧定义
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

use image::{GenericImageView, GrayImage, RgbImage, SubImage, imageops};

use crate::model::BBox;

/// 灰度图（或其子区域）的只读视图，检测器的输入
pub type GrayView<'a> = SubImage<&'a GrayImage>;

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据，标注直接绘制在上面
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage) -> Self {
    Self {
      image,
      index: 0,
      timestamp_ms: 0,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 每次请求由 [`Frame`] 派生一次的单通道灰度帧
#[derive(Debug, Clone)]
pub struct GrayFrame {
  image: GrayImage,
}

impl GrayFrame {
  pub fn from_frame(frame: &Frame) -> Self {
    Self {
      image: imageops::grayscale(&frame.image),
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 整帧视图
  pub fn view(&self) -> GrayView<'_> {
    self.image.view(0, 0, self.image.width(), self.image.height())
  }

  /// 按矩形框截取子区域视图（与帧求交后），同时返回子区域原点的全局坐标
  pub fn region(&self, bbox: &BBox) -> Option<(GrayView<'_>, (i32, i32))> {
    let roi = bbox.clamp_to(self.width(), self.height())?;
    let view = self.image.view(
      roi.x_min as u32,
      roi.y_min as u32,
      roi.width() as u32,
      roi.height() as u32,
    );
    Some((view, (roi.x_min, roi.y_min)))
  }
}

impl From<GrayImage> for GrayFrame {
  fn from(image: GrayImage) -> Self {
    Self { image }
  }
}
