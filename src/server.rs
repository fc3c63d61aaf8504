// 该文件是 Yanjing （眼睛） 项目的一部分。
// src/server.rs - HTTP 服务
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

use std::sync::Arc;
use std::time::Instant;

use axum::{
  Router,
  extract::State,
  http::{StatusCode, header},
  response::{IntoResponse, Response},
  routing::get,
};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
  input::{CaptureError, SharedCapture},
  model::{ClassifierSet, DetectionSource},
  output::{Draw, EncodeError, JpegEncoder},
  pipeline::{PipelineError, SizeFilterPolicy, run_pipeline},
};

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("采集失败: {0}")]
  Capture(#[from] CaptureError),
  #[error("流水线错误: {0}")]
  Pipeline(#[from] PipelineError),
  #[error("编码失败: {0}")]
  Encode(#[from] EncodeError),
  #[error("工作线程异常退出: {0}")]
  Worker(String),
}

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    let status = match &self {
      ServerError::Capture(_) => StatusCode::SERVICE_UNAVAILABLE,
      ServerError::Pipeline(_) | ServerError::Encode(_) | ServerError::Worker(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    // 失败时不返回任何图像数据
    status.into_response()
  }
}

/// 应用上下文：启动时构造一次，所有请求共享
pub struct AppContext {
  pub capture: SharedCapture,
  pub classifiers: ClassifierSet,
  pub policy: SizeFilterPolicy,
  pub draw: Draw,
  pub encoder: JpegEncoder,
}

pub type AppState = Arc<AppContext>;

impl AppContext {
  /// 采集一帧、检测、标注并编码为 JPEG
  pub fn snapshot(&self) -> Result<Vec<u8>, ServerError> {
    let frame = self.capture.read()?;
    let (index, timestamp_ms) = (frame.index, frame.timestamp_ms);
    let now = Instant::now();
    let (frame, result) = run_pipeline(frame, &self.classifiers, &self.policy, &self.draw)?;
    let elapsed = now.elapsed();
    let bytes = self.encoder.encode(&frame)?;
    info!(
      "帧 {} ({} ms): Haar 人脸 {} 个, 人眼 {} 个, LBP 人脸 {} 个, 耗时 {:.2?}",
      index,
      timestamp_ms,
      result.count(DetectionSource::HaarFace),
      result.count(DetectionSource::Eye),
      result.count(DetectionSource::LbpFace),
      elapsed
    );
    Ok(bytes)
  }
}

pub fn create_router(state: AppState) -> Router {
  Router::new()
    .route("/", get(get_frame))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn get_frame(State(state): State<AppState>) -> Result<Response, ServerError> {
  let bytes = tokio::task::spawn_blocking(move || state.snapshot())
    .await
    .map_err(|e| ServerError::Worker(e.to_string()))
    .and_then(|result| result)
    .inspect_err(|e| error!("请求处理失败: {}", e))?;

  Ok(
    (
      StatusCode::OK,
      [
        (header::CONTENT_TYPE, "image/jpeg"),
        (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
      ],
      bytes,
    )
      .into_response(),
  )
}
