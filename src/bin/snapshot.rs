// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/bin/snapshot.rs - 单帧检测并保存标注图像
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use url::Url;

use yanjing::{
  FromUrl,
  input::{CaptureSource, InputWrapper},
  model::ClassifierSet,
  output::{Draw, JpegEncoder},
  pipeline::{SizeFilterPolicy, run_pipeline},
};

/// 采集一帧，检测人脸与人眼，保存标注后的 JPEG
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源（v4l:///dev/video0 或 image:///path/to/face.jpg）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出 JPEG 路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
  /// Haar 人脸级联模型
  #[arg(long, value_name = "FILE")]
  pub face_model: PathBuf,
  /// Haar 人眼级联模型
  #[arg(long, value_name = "FILE")]
  pub eye_model: PathBuf,
  /// LBP 人脸级联模型
  #[arg(long, value_name = "FILE")]
  pub lbp_face_model: PathBuf,

  #[arg(long, default_value_t = 200, value_name = "PIXELS")]
  pub min_face_size: i32,
  #[arg(long, default_value_t = 600, value_name = "PIXELS")]
  pub max_face_size: i32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output.display());

  let policy = SizeFilterPolicy::new(args.min_face_size, args.max_face_size)?;
  let mut input = InputWrapper::from_url(&args.input)
    .with_context(|| format!("无法打开输入源: {}", args.input))?;
  let classifiers =
    ClassifierSet::load_cascades(&args.face_model, &args.eye_model, &args.lbp_face_model)?;

  let frame = input.read()?;
  info!("输入帧获取成功，开始检测...");
  let now = std::time::Instant::now();
  let (frame, result) = run_pipeline(frame, &classifiers, &policy, &Draw::default())?;
  info!("检测完成，耗时: {:.2?}", now.elapsed());

  for item in result.items.iter() {
    println!(
      "{}, {}, {}, {}, {}, {}",
      item.source, item.bbox.x_min, item.bbox.y_min, item.bbox.x_max, item.bbox.y_max, item.label
    );
  }

  JpegEncoder::default().save(&frame, &args.output)?;
  Ok(())
}
