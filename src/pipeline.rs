// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/pipeline.rs - 人脸/人眼检测流水线
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

use thiserror::Error;
use tracing::debug;

use crate::{
  frame::{Frame, GrayFrame},
  model::{BBox, ClassifierSet, DetectItem, DetectResult, DetectionSource, DetectorError},
  output::draw::Draw,
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("检测器错误: {0}")]
  Detector(#[from] DetectorError),
  #[error("人脸尺寸范围无效: 最小 {min_side}, 最大 {max_side}")]
  InvalidSizeFilter { min_side: i32, max_side: i32 },
}

/// Haar 人脸的尺寸过滤，仅接受 `min_side < width < max_side`
///
/// LBP 人脸不经过该过滤。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeFilterPolicy {
  min_side: i32,
  max_side: i32,
}

impl Default for SizeFilterPolicy {
  fn default() -> Self {
    Self {
      min_side: 200,
      max_side: 600,
    }
  }
}

impl SizeFilterPolicy {
  pub fn new(min_side: i32, max_side: i32) -> Result<Self, PipelineError> {
    // 严格不等式下至少要留出一个整数宽度
    if max_side <= min_side.saturating_add(1) {
      return Err(PipelineError::InvalidSizeFilter { min_side, max_side });
    }
    Ok(Self { min_side, max_side })
  }

  pub fn accepts(&self, bbox: &BBox) -> bool {
    self.min_side < bbox.width() && bbox.width() < self.max_side
  }
}

/// 在帧上运行检测，返回全局坐标下的检测结果，不修改帧
///
/// 顺序为：每个通过过滤的 Haar 人脸紧跟其内部的人眼，最后是全部 LBP 人脸。
pub fn detect(
  frame: &Frame,
  classifiers: &ClassifierSet,
  policy: &SizeFilterPolicy,
) -> Result<DetectResult, PipelineError> {
  let gray = GrayFrame::from_frame(frame);
  let full = gray.view();
  let mut items = Vec::new();

  for face in classifiers.haar_face.detect(&full)? {
    if !policy.accepts(&face) {
      debug!("丢弃 Haar 人脸 {:?}: 宽度 {} 不在范围内", face, face.width());
      continue;
    }
    items.push(DetectItem::new(DetectionSource::HaarFace, face));

    let Some((roi, (dx, dy))) = gray.region(&face) else {
      continue;
    };
    for eye in classifiers.eye.detect(&roi)? {
      items.push(DetectItem::new(DetectionSource::Eye, eye.translate(dx, dy)));
    }
  }

  for face in classifiers.lbp_face.detect(&full)? {
    items.push(DetectItem::new(DetectionSource::LbpFace, face));
  }

  for item in &items {
    debug!("检测到 {}: {:?} {}", item.source, item.bbox, item.label);
  }

  Ok(DetectResult {
    items: items.into_boxed_slice(),
  })
}

/// 检测并把结果绘制到帧上，返回标注后的帧与检测结果
pub fn run_pipeline(
  mut frame: Frame,
  classifiers: &ClassifierSet,
  policy: &SizeFilterPolicy,
  draw: &Draw,
) -> Result<(Frame, DetectResult), PipelineError> {
  let result = detect(&frame, classifiers, policy)?;
  draw.draw_detections_on_image(&mut frame.image, &result);
  Ok((frame, result))
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::frame::GrayView;
  use crate::model::Detector;
  use image::{GenericImageView, Rgb, RgbImage};
  use rstest::rstest;
  use std::sync::Mutex;

  /// 固定返回给定矩形框的检测器
  pub(crate) struct FixedDetector(pub Vec<BBox>);

  impl Detector for FixedDetector {
    fn detect(&self, _image: &GrayView<'_>) -> Result<Vec<BBox>, DetectorError> {
      Ok(self.0.clone())
    }
  }

  /// 返回亮度不低于阈值的像素的外接矩形
  pub(crate) struct BrightRegionDetector(pub u8);

  impl Detector for BrightRegionDetector {
    fn detect(&self, image: &GrayView<'_>) -> Result<Vec<BBox>, DetectorError> {
      let (width, height) = image.dimensions();
      let mut bbox: Option<BBox> = None;
      for y in 0..height {
        for x in 0..width {
          if image.get_pixel(x, y).0[0] < self.0 {
            continue;
          }
          let (x, y) = (x as i32, y as i32);
          bbox = Some(match bbox {
            None => BBox::from_xywh(x, y, 1, 1),
            Some(b) => BBox {
              x_min: b.x_min.min(x),
              y_min: b.y_min.min(y),
              x_max: b.x_max.max(x + 1),
              y_max: b.y_max.max(y + 1),
            },
          });
        }
      }
      Ok(bbox.into_iter().collect())
    }
  }

  /// 记录每次调用的输入尺寸
  struct RecordingDetector {
    boxes: Vec<BBox>,
    calls: Mutex<Vec<(u32, u32)>>,
  }

  impl Detector for RecordingDetector {
    fn detect(&self, image: &GrayView<'_>) -> Result<Vec<BBox>, DetectorError> {
      self.calls.lock().unwrap().push(image.dimensions());
      Ok(self.boxes.clone())
    }
  }

  struct FailingDetector;

  impl Detector for FailingDetector {
    fn detect(&self, _image: &GrayView<'_>) -> Result<Vec<BBox>, DetectorError> {
      Err(DetectorError::Detect("boom".to_string()))
    }
  }

  pub(crate) fn blank_frame(width: u32, height: u32) -> Frame {
    Frame::new(RgbImage::new(width, height))
  }

  fn fill(image: &mut RgbImage, bbox: BBox, value: u8) {
    for y in bbox.y_min..bbox.y_max {
      for x in bbox.x_min..bbox.x_max {
        image.put_pixel(x as u32, y as u32, Rgb([value, value, value]));
      }
    }
  }

  fn fixed(haar: Vec<BBox>, eyes: Vec<BBox>, lbp: Vec<BBox>) -> ClassifierSet {
    ClassifierSet::new(FixedDetector(haar), FixedDetector(eyes), FixedDetector(lbp))
  }

  #[rstest]
  #[case(200, false)]
  #[case(201, true)]
  #[case(250, true)]
  #[case(599, true)]
  #[case(600, false)]
  #[case(50, false)]
  fn test_haar_size_filter_is_strict(#[case] width: i32, #[case] accepted: bool) {
    let classifiers = fixed(vec![BBox::from_xywh(0, 0, width, width)], vec![], vec![]);
    let result = detect(
      &blank_frame(800, 800),
      &classifiers,
      &SizeFilterPolicy::default(),
    )
    .unwrap();
    assert_eq!(result.count(DetectionSource::HaarFace), accepted as usize);
  }

  #[test]
  fn test_invalid_policy_is_rejected() {
    assert!(SizeFilterPolicy::new(600, 200).is_err());
    assert!(SizeFilterPolicy::new(300, 300).is_err());
    assert!(SizeFilterPolicy::new(300, 301).is_err());
    assert!(SizeFilterPolicy::new(i32::MAX, i32::MAX).is_err());
    assert!(SizeFilterPolicy::new(10, 20).is_ok());

    let narrowest = SizeFilterPolicy::new(300, 302).unwrap();
    assert!(narrowest.accepts(&BBox::from_xywh(0, 0, 301, 301)));
  }

  #[test]
  fn test_scenario_bright_face_with_eye() {
    let face = BBox::from_xywh(100, 80, 250, 250);
    let eye = BBox::from_xywh(160, 150, 40, 20);
    let mut frame = blank_frame(640, 480);
    fill(&mut frame.image, face, 128);
    fill(&mut frame.image, eye, 255);

    let classifiers = ClassifierSet::new(
      BrightRegionDetector(100),
      BrightRegionDetector(250),
      FixedDetector(vec![]),
    );
    let result = detect(&frame, &classifiers, &SizeFilterPolicy::default()).unwrap();

    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[0].source, DetectionSource::HaarFace);
    assert_eq!(result.items[0].bbox, face);
    assert_eq!(result.items[0].label, "Size: 250x250");
    assert_eq!(result.items[1].source, DetectionSource::Eye);
    assert_eq!(result.items[1].bbox, eye);
    assert_eq!(result.items[1].label, "Size: 40x20");
  }

  #[test]
  fn test_scenario_face_at_min_size_is_dropped() {
    let face = BBox::from_xywh(100, 80, 200, 200);
    let mut frame = blank_frame(640, 480);
    fill(&mut frame.image, face, 128);

    let eyes = RecordingDetector {
      boxes: vec![BBox::from_xywh(1, 1, 5, 5)],
      calls: Mutex::new(Vec::new()),
    };
    let classifiers = ClassifierSet::new(BrightRegionDetector(100), eyes, FixedDetector(vec![]));
    let result = detect(&frame, &classifiers, &SizeFilterPolicy::default()).unwrap();

    assert!(result.items.is_empty());
  }

  #[test]
  fn test_eye_search_runs_on_face_region_only() {
    let eyes = std::sync::Arc::new(RecordingDetector {
      boxes: vec![],
      calls: Mutex::new(Vec::new()),
    });
    let classifiers = ClassifierSet::new(
      FixedDetector(vec![
        BBox::from_xywh(10, 10, 300, 280),
        BBox::from_xywh(0, 0, 100, 100),
      ]),
      eyes.clone(),
      FixedDetector(vec![]),
    );
    detect(
      &blank_frame(640, 480),
      &classifiers,
      &SizeFilterPolicy::default(),
    )
    .unwrap();
    assert_eq!(*eyes.calls.lock().unwrap(), vec![(300, 280)]);
  }

  #[test]
  fn test_eye_boxes_are_remapped_on_both_corners() {
    let face = BBox::from_xywh(120, 60, 300, 300);
    let local = vec![BBox::from_xywh(50, 70, 60, 30), BBox::from_xywh(180, 72, 55, 28)];
    let classifiers = fixed(vec![face], local.clone(), vec![]);
    let result = detect(
      &blank_frame(640, 480),
      &classifiers,
      &SizeFilterPolicy::default(),
    )
    .unwrap();

    let eyes: Vec<_> = result
      .items
      .iter()
      .filter(|item| item.source == DetectionSource::Eye)
      .collect();
    assert_eq!(eyes.len(), 2);
    for (eye, local) in eyes.iter().zip(local.iter()) {
      assert_eq!(eye.bbox.x_min, local.x_min + 120);
      assert_eq!(eye.bbox.y_min, local.y_min + 60);
      assert_eq!(eye.bbox.x_max, local.x_max + 120);
      assert_eq!(eye.bbox.y_max, local.y_max + 60);
    }
  }

  #[test]
  fn test_overlapping_haar_and_lbp_are_both_kept() {
    let haar = BBox::from_xywh(100, 100, 250, 250);
    let lbp = BBox::from_xywh(110, 105, 240, 245);
    let tiny_lbp = BBox::from_xywh(0, 0, 10, 10);
    let classifiers = fixed(vec![haar], vec![], vec![lbp, tiny_lbp]);
    let result = detect(
      &blank_frame(640, 480),
      &classifiers,
      &SizeFilterPolicy::default(),
    )
    .unwrap();

    let sources: Vec<_> = result.items.iter().map(|item| item.source).collect();
    assert_eq!(
      sources,
      vec![
        DetectionSource::HaarFace,
        DetectionSource::LbpFace,
        DetectionSource::LbpFace
      ]
    );
    assert_eq!(result.items[1].bbox, lbp);
    assert_eq!(result.items[2].bbox, tiny_lbp);
  }

  #[test]
  fn test_lbp_runs_when_haar_finds_nothing() {
    let lbp = BBox::from_xywh(5, 5, 900, 900);
    let classifiers = fixed(vec![], vec![], vec![lbp]);
    let result = detect(
      &blank_frame(640, 480),
      &classifiers,
      &SizeFilterPolicy::default(),
    )
    .unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].source, DetectionSource::LbpFace);
  }

  #[test]
  fn test_order_interleaves_eyes_per_face() {
    let faces = vec![BBox::from_xywh(0, 0, 250, 250), BBox::from_xywh(300, 0, 250, 250)];
    let classifiers = fixed(
      faces,
      vec![BBox::from_xywh(10, 10, 20, 20)],
      vec![BBox::from_xywh(0, 0, 30, 30)],
    );
    let result = detect(
      &blank_frame(640, 480),
      &classifiers,
      &SizeFilterPolicy::default(),
    )
    .unwrap();
    let sources: Vec<_> = result.items.iter().map(|item| item.source).collect();
    assert_eq!(
      sources,
      vec![
        DetectionSource::HaarFace,
        DetectionSource::Eye,
        DetectionSource::HaarFace,
        DetectionSource::Eye,
        DetectionSource::LbpFace
      ]
    );
    assert_eq!(result.items[3].bbox, BBox::from_xywh(310, 10, 20, 20));
  }

  #[test]
  fn test_detector_error_aborts_pipeline() {
    let classifiers = ClassifierSet::new(
      FixedDetector(vec![]),
      FixedDetector(vec![]),
      FailingDetector,
    );
    let err = detect(
      &blank_frame(64, 64),
      &classifiers,
      &SizeFilterPolicy::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Detector(_)));
  }

  #[test]
  fn test_run_pipeline_draws_on_frame() {
    let face = BBox::from_xywh(100, 100, 250, 250);
    let classifiers = fixed(vec![face], vec![], vec![]);
    let (frame, result) = run_pipeline(
      blank_frame(640, 480),
      &classifiers,
      &SizeFilterPolicy::default(),
      &Draw::default(),
    )
    .unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(*frame.image.get_pixel(200, 100), Rgb([0, 255, 0]));
  }

  #[test]
  fn test_run_pipeline_draws_overlapping_haar_and_lbp() {
    let haar = BBox::from_xywh(100, 100, 250, 250);
    let lbp = BBox::from_xywh(120, 130, 200, 200);
    let classifiers = fixed(vec![haar], vec![], vec![lbp]);
    let (frame, result) = run_pipeline(
      blank_frame(640, 480),
      &classifiers,
      &SizeFilterPolicy::default(),
      &Draw::default(),
    )
    .unwrap();

    assert_eq!(result.count(DetectionSource::HaarFace), 1);
    assert_eq!(result.count(DetectionSource::LbpFace), 1);
    // Haar 上边与 LBP 下边
    assert_eq!(*frame.image.get_pixel(200, 100), Rgb([0, 255, 0]));
    assert_eq!(*frame.image.get_pixel(200, 329), Rgb([255, 0, 0]));
    assert_eq!(*frame.image.get_pixel(120, 250), Rgb([255, 0, 0]));
    assert_eq!(*frame.image.get_pixel(349, 250), Rgb([0, 255, 0]));
  }
}
