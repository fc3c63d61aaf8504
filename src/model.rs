// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/model.rs - 检测模型与检测结果定义
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

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::frame::GrayView;

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("模型加载失败 ({path}): {reason}")]
  ModelLoad { path: String, reason: String },
  #[error("检测失败: {0}")]
  Detect(String),
}

/// 轴对齐矩形框，坐标为像素，`max` 为开区间端点，宽高即 `max - min`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BBox {
  pub x_min: i32,
  pub y_min: i32,
  pub x_max: i32,
  pub y_max: i32,
}

impl BBox {
  /// 由左上角与宽高构造，负宽高按 0 处理
  pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x_min: x,
      y_min: y,
      x_max: x + width.max(0),
      y_max: y + height.max(0),
    }
  }

  pub fn width(&self) -> i32 {
    self.x_max - self.x_min
  }

  pub fn height(&self) -> i32 {
    self.y_max - self.y_min
  }

  /// 四个坐标整体平移，min 与 max 同时加上偏移
  pub fn translate(&self, dx: i32, dy: i32) -> Self {
    Self {
      x_min: self.x_min + dx,
      y_min: self.y_min + dy,
      x_max: self.x_max + dx,
      y_max: self.y_max + dy,
    }
  }

  /// 与 `[0, width) x [0, height)` 求交，无交集时返回 `None`
  pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
    let w = i32::try_from(width).unwrap_or(i32::MAX);
    let h = i32::try_from(height).unwrap_or(i32::MAX);
    let clamped = Self {
      x_min: self.x_min.clamp(0, w),
      y_min: self.y_min.clamp(0, h),
      x_max: self.x_max.clamp(0, w),
      y_max: self.y_max.clamp(0, h),
    };
    (clamped.width() > 0 && clamped.height() > 0).then_some(clamped)
  }

  pub fn size_label(&self) -> String {
    format!("Size: {}x{}", self.width(), self.height())
  }
}

/// 检测结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionSource {
  HaarFace,
  LbpFace,
  Eye,
}

impl fmt::Display for DetectionSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DetectionSource::HaarFace => write!(f, "haar_face"),
      DetectionSource::LbpFace => write!(f, "lbp_face"),
      DetectionSource::Eye => write!(f, "eye"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectItem {
  pub source: DetectionSource,
  pub bbox: BBox, // 全局坐标
  pub label: String,
}

impl DetectItem {
  pub fn new(source: DetectionSource, bbox: BBox) -> Self {
    Self {
      source,
      label: bbox.size_label(),
      bbox,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn count(&self, source: DetectionSource) -> usize {
    self.items.iter().filter(|item| item.source == source).count()
  }
}

/// 目标检测能力：输入单通道灰度图（或其子区域），输出该图局部坐标下的矩形框
pub trait Detector: Send + Sync {
  fn detect(&self, image: &GrayView<'_>) -> Result<Vec<BBox>, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for Arc<D> {
  fn detect(&self, image: &GrayView<'_>) -> Result<Vec<BBox>, DetectorError> {
    (**self).detect(image)
  }
}

/// 三个分类器：Haar 人脸、人眼、LBP 人脸。启动时加载一次，之后只读共享
pub struct ClassifierSet {
  pub haar_face: Box<dyn Detector>,
  pub eye: Box<dyn Detector>,
  pub lbp_face: Box<dyn Detector>,
}

impl ClassifierSet {
  pub fn new(
    haar_face: impl Detector + 'static,
    eye: impl Detector + 'static,
    lbp_face: impl Detector + 'static,
  ) -> Self {
    Self {
      haar_face: Box::new(haar_face),
      eye: Box::new(eye),
      lbp_face: Box::new(lbp_face),
    }
  }
}

#[cfg(feature = "opencv_cascade")]
mod cascade;
#[cfg(feature = "opencv_cascade")]
pub use self::cascade::CascadeDetector;
