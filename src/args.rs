// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Yanjing 人脸/人眼检测服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 摄像头序号（对应 /dev/video{N}）
  #[arg(long, env = "YANJING_DEVICE", default_value_t = 0, value_name = "INDEX")]
  pub device: usize,

  /// 输入来源 URL，指定后忽略 --device
  /// 支持格式:
  /// - V4L2: v4l:///dev/video0?width=640&height=480
  /// - 图片: image:///path/to/face.jpg
  #[arg(long, env = "YANJING_INPUT", value_name = "SOURCE")]
  pub input: Option<Url>,

  /// 摄像头请求的画面宽度
  #[arg(long, default_value_t = 640, value_name = "PIXELS")]
  pub capture_width: u32,

  /// 摄像头请求的画面高度
  #[arg(long, default_value_t = 480, value_name = "PIXELS")]
  pub capture_height: u32,

  /// Haar 人脸级联模型
  #[arg(
    long,
    env = "YANJING_FACE_MODEL",
    default_value = "/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml",
    value_name = "FILE"
  )]
  pub face_model: PathBuf,

  /// Haar 人眼级联模型
  #[arg(
    long,
    env = "YANJING_EYE_MODEL",
    default_value = "/usr/share/opencv4/haarcascades/haarcascade_eye.xml",
    value_name = "FILE"
  )]
  pub eye_model: PathBuf,

  /// LBP 人脸级联模型
  #[arg(
    long,
    env = "YANJING_LBP_FACE_MODEL",
    default_value = "/usr/share/opencv4/lbpcascades/lbpcascade_frontalface_improved.xml",
    value_name = "FILE"
  )]
  pub lbp_face_model: PathBuf,

  /// 监听地址
  #[arg(long, env = "YANJING_LISTEN", default_value = "127.0.0.1:8888", value_name = "ADDR")]
  pub listen: SocketAddr,

  /// Haar 人脸最小宽度（不含）
  #[arg(long, default_value_t = 200, value_name = "PIXELS")]
  pub min_face_size: i32,

  /// Haar 人脸最大宽度（不含）
  #[arg(long, default_value_t = 600, value_name = "PIXELS")]
  pub max_face_size: i32,

  /// JPEG 质量 (1 - 100)
  #[arg(long, default_value_t = 75, value_name = "QUALITY")]
  pub jpeg_quality: u8,
}
