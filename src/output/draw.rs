// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/output/draw.rs - 检测结果标注
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::model::{BBox, DetectItem, DetectResult, DetectionSource};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_OFFSET: i32 = 10; // 标签底部与框顶部的距离
const STROKE_WIDTH: i32 = 2;

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// 每种来源固定的颜色：Haar 人脸绿色，人眼蓝色，LBP 人脸红色
pub fn source_color(source: DetectionSource) -> Rgb<u8> {
  match source {
    DetectionSource::HaarFace => GREEN,
    DetectionSource::Eye => BLUE,
    DetectionSource::LbpFace => RED,
  }
}

pub struct Draw {
  font: FontArc,
  font_size: f32,
  label_offset: i32,
  stroke_width: i32,
}

impl Default for Draw {
  fn default() -> Self {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      label_offset: LABEL_OFFSET,
      stroke_width: STROKE_WIDTH,
    }
  }
}

impl Draw {
  /// 标签左上角位置：文字底边位于框顶部上方 `label_offset` 像素，超出图像顶部时贴住 y = 0
  pub fn label_origin(&self, bbox: &BBox) -> (i32, i32) {
    let text_height = self.font_size.ceil() as i32;
    let y = bbox.y_min - self.label_offset - text_height;
    (bbox.x_min, y.max(0))
  }

  fn draw_bbox(&self, image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    // 逐层向内绘制以加粗边框
    for thickness in 0..self.stroke_width {
      let width = bbox.width() - 2 * thickness;
      let height = bbox.height() - 2 * thickness;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(bbox.x_min + thickness, bbox.y_min + thickness)
        .of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
  }

  fn draw_item(&self, image: &mut RgbImage, item: &DetectItem) {
    let color = source_color(item.source);
    self.draw_bbox(image, &item.bbox, color);

    let (x, y) = self.label_origin(&item.bbox);
    draw_text_mut(
      image,
      color,
      x,
      y,
      PxScale::from(self.font_size),
      &self.font,
      &item.label,
    );
  }

  /// 在图像上原地绘制全部检测结果
  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      self.draw_item(image, item);
    }
  }
}
