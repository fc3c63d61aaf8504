// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/model/cascade.rs - OpenCV 级联分类器
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
use std::sync::Mutex;

use image::GenericImageView;
use opencv::core::{Mat, Rect, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use tracing::info;

use crate::frame::GrayView;
use crate::model::{BBox, ClassifierSet, Detector, DetectorError};

/// 基于 OpenCV `CascadeClassifier` 的检测器（Haar / LBP 模型文件均可）
///
/// OpenCV 的 `detectMultiScale` 需要可变句柄，这里用互斥锁包裹，
/// 使检测器可以在多个请求之间以 `&self` 共享；同一分类器上的检测因此串行执行。
pub struct CascadeDetector {
  name: String,
  classifier: Mutex<CascadeClassifier>,
}

impl CascadeDetector {
  /// 从模型文件加载级联分类器
  pub fn load(name: &str, path: impl AsRef<Path>) -> Result<Self, DetectorError> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().to_string();
    let model_load_error = |reason: String| DetectorError::ModelLoad {
      path: path_str.clone(),
      reason,
    };

    if !path.is_file() {
      return Err(model_load_error("文件不存在".to_string()));
    }

    let classifier = CascadeClassifier::new(&path_str).map_err(|e| model_load_error(e.to_string()))?;
    // OpenCV 加载失败时不会报错，只会得到一个空分类器
    if classifier.empty().map_err(|e| model_load_error(e.to_string()))? {
      return Err(model_load_error("分类器为空".to_string()));
    }

    info!("已加载分类器 {}: {}", name, path_str);
    Ok(Self {
      name: name.to_string(),
      classifier: Mutex::new(classifier),
    })
  }

  /// 把整幅灰度缓冲区包装成 `Mat`，再按视图偏移取 ROI，不复制像素
  fn detect_on_view(
    &self,
    image: &GrayView<'_>,
    objects: &mut Vector<Rect>,
  ) -> opencv::Result<()> {
    let parent = image.inner();
    let (x, y) = image.offsets();
    let (width, height) = image.dimensions();

    let full =
      Mat::new_rows_cols_with_data(parent.height() as i32, parent.width() as i32, parent.as_raw())?;
    let roi = Mat::roi(&*full, Rect::new(x as i32, y as i32, width as i32, height as i32))?;

    let mut classifier = self.classifier.lock().map_err(|_| {
      opencv::Error::new(opencv::core::StsError, format!("分类器 {} 锁已损坏", self.name))
    })?;
    classifier.detect_multi_scale_def(&*roi, objects)
  }
}

impl Detector for CascadeDetector {
  fn detect(&self, image: &GrayView<'_>) -> Result<Vec<BBox>, DetectorError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Ok(Vec::new());
    }

    let mut objects = Vector::<Rect>::new();
    self
      .detect_on_view(image, &mut objects)
      .map_err(|e| DetectorError::Detect(format!("{}: {}", self.name, e)))?;

    Ok(
      objects
        .iter()
        .map(|r| BBox::from_xywh(r.x, r.y, r.width, r.height))
        .collect(),
    )
  }
}

impl ClassifierSet {
  /// 依次加载 Haar 人脸、人眼、LBP 人脸三个级联模型，任一失败即返回错误，
  /// 已加载的分类器随之释放
  pub fn load_cascades(
    haar_face: impl AsRef<Path>,
    eye: impl AsRef<Path>,
    lbp_face: impl AsRef<Path>,
  ) -> Result<Self, DetectorError> {
    let haar_face = CascadeDetector::load("haar_face", haar_face)?;
    let eye = CascadeDetector::load("eye", eye)?;
    let lbp_face = CascadeDetector::load("lbp_face", lbp_face)?;
    Ok(Self::new(haar_face, eye, lbp_face))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::GrayImage;

  const FACE_MODEL: &str = "/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml";

  #[test]
  fn test_missing_model_file_is_rejected() {
    let err = CascadeDetector::load("haar_face", "/nonexistent/face.xml").err().unwrap();
    assert!(matches!(err, DetectorError::ModelLoad { .. }));
  }

  #[test]
  fn test_detects_on_region_of_larger_buffer() {
    // 需要系统安装的 OpenCV 级联模型
    if !Path::new(FACE_MODEL).is_file() {
      return;
    }
    let detector = CascadeDetector::load("haar_face", FACE_MODEL).unwrap();
    let gray = GrayImage::new(320, 240);

    let full = gray.view(0, 0, 320, 240);
    assert!(detector.detect(&full).unwrap().is_empty());
    let region = gray.view(37, 21, 150, 101);
    assert!(detector.detect(&region).unwrap().is_empty());
    let empty = gray.view(10, 10, 0, 0);
    assert!(detector.detect(&empty).unwrap().is_empty());
  }
}
