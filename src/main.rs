// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use yanjing::{
  FromUrl,
  args::Args,
  input::{CaptureSource, InputWrapper, SharedCapture},
  model::ClassifierSet,
  output::{Draw, JpegEncoder},
  pipeline::SizeFilterPolicy,
  server::{AppContext, create_router},
};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| "yanjing=info,tower_http=info".into()),
    )
    .init();

  let args = Args::parse();

  if let Err(e) = run(args).await {
    error!("程序异常退出: {:#}", e);
    std::process::exit(1);
  }
}

async fn run(args: Args) -> Result<()> {
  info!("Yanjing 人脸/人眼检测服务 v{}", env!("CARGO_PKG_VERSION"));
  info!("Haar 人脸模型: {}", args.face_model.display());
  info!("人眼模型: {}", args.eye_model.display());
  info!("LBP 人脸模型: {}", args.lbp_face_model.display());
  info!(
    "Haar 人脸尺寸范围: ({}, {})",
    args.min_face_size, args.max_face_size
  );

  let policy = SizeFilterPolicy::new(args.min_face_size, args.max_face_size)?;

  // 先打开设备，再加载分类器；任一步失败时已创建的资源随作用域释放
  let capture = open_capture(&args)?;
  let (width, height) = capture.dimensions();
  info!("输入源已打开: {}x{}", width, height);

  let classifiers =
    ClassifierSet::load_cascades(&args.face_model, &args.eye_model, &args.lbp_face_model)
      .context("加载分类器失败")?;

  let state = Arc::new(AppContext {
    capture: SharedCapture::new(capture),
    classifiers,
    policy,
    draw: Draw::default(),
    encoder: JpegEncoder::with_quality(args.jpeg_quality),
  });

  let listener = tokio::net::TcpListener::bind(args.listen)
    .await
    .with_context(|| format!("无法监听地址: {}", args.listen))?;
  info!("服务已启动: http://{}/", args.listen);

  axum::serve(listener, create_router(state))
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP 服务异常")?;

  info!("服务已停止");
  Ok(())
}

fn open_capture(args: &Args) -> Result<InputWrapper> {
  if let Some(url) = &args.input {
    info!("输入来源: {}", url);
    return InputWrapper::from_url(url).with_context(|| format!("无法打开输入源: {}", url));
  }

  open_camera(args)
}

#[cfg(feature = "v4l_input")]
fn open_camera(args: &Args) -> Result<InputWrapper> {
  info!("输入来源: 摄像头 {}", args.device);
  let source =
    yanjing::input::V4l2Source::with_index(args.device, args.capture_width, args.capture_height)
      .with_context(|| format!("无法打开摄像头 {}", args.device))?;
  Ok(InputWrapper::V4l2(source))
}

#[cfg(not(feature = "v4l_input"))]
fn open_camera(args: &Args) -> Result<InputWrapper> {
  anyhow::bail!(
    "未启用 v4l_input 特性，无法打开摄像头 {}（{}x{}），请使用 --input image://... 指定输入",
    args.device,
    args.capture_width,
    args.capture_height
  )
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      warn!("无法监听 Ctrl-C 信号: {}", e);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        warn!("无法监听 SIGTERM 信号: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }

  info!("收到中断信号，准备退出...");
}
