// 该文件是 Leukovision 项目的一部分。
// src/server/handlers.rs - 分类与检测请求处理
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

use anyhow::anyhow;
use axum::{
  extract::{Multipart, State, multipart::MultipartRejection},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use tracing::{info, warn};

use crate::{
  input::{decode_bgr, decode_rgb},
  model::{Classification, ClassifierInput},
  output::{PngRender, Render},
  server::{
    response::Envelope,
    state::{AppState, Classifier, Detector},
    upload::read_image_field,
  },
};

pub const ANALYZE_SUCCESS_MESSAGE: &str = "Model is analyze successfully";
pub const INVALID_IMAGE_MESSAGE: &str = "Invalid image file";

/// `POST /analyze`：失败时把错误信息原样返回给调用方
pub async fn analyze<C: Classifier, D: Detector>(
  State(state): State<AppState<C, D>>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Response {
  let upload = match read_image_field(multipart).await {
    Ok(upload) => upload,
    Err(e) => return e.into_response(),
  };

  info!("分类请求: {} ({} 字节)", upload.file_name, upload.bytes.len());
  let classifier = state.classifier.clone();
  let now = std::time::Instant::now();
  let outcome = tokio::task::spawn_blocking(move || classify(&*classifier, &upload.bytes))
    .await
    .map_err(anyhow::Error::from)
    .and_then(|result| result);

  match outcome {
    Ok(classification) => {
      info!(
        "分类完成: {} ({:.4})，耗时: {:.2?}",
        classification.predicted_class,
        classification.confidence,
        now.elapsed()
      );
      Envelope::success(ANALYZE_SUCCESS_MESSAGE, classification).into_response_with(StatusCode::OK)
    }
    Err(e) => {
      warn!("分类失败: {:#}", e);
      Envelope::error(e.to_string()).into_response_with(StatusCode::BAD_REQUEST)
    }
  }
}

/// `POST /detect`：失败时只返回固定的错误信息
pub async fn detect<C: Classifier, D: Detector>(
  State(state): State<AppState<C, D>>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Response {
  let upload = match read_image_field(multipart).await {
    Ok(upload) => upload,
    Err(e) => return e.into_response(),
  };

  info!("检测请求: {} ({} 字节)", upload.file_name, upload.bytes.len());
  let detector = state.detector.clone();
  let render = state.render.clone();
  let now = std::time::Instant::now();
  let outcome =
    tokio::task::spawn_blocking(move || detect_and_render(&*detector, &render, &upload.bytes))
      .await
      .map_err(anyhow::Error::from)
      .and_then(|result| result);

  match outcome {
    Ok(png) => {
      info!("检测图像已生成 ({} 字节)，耗时: {:.2?}", png.len(), now.elapsed());
      ([(header::CONTENT_TYPE, "image/png")], png).into_response()
    }
    Err(e) => {
      warn!("检测失败: {:#}", e);
      Envelope::error(INVALID_IMAGE_MESSAGE).into_response_with(StatusCode::BAD_REQUEST)
    }
  }
}

fn classify<C: Classifier>(model: &C, bytes: &[u8]) -> anyhow::Result<Classification> {
  let image = decode_rgb(bytes)?;
  let input = ClassifierInput::from_rgb_image(&image);
  let scores = model.infer(&input)?;
  Classification::from_scores(&scores).ok_or_else(|| anyhow!("Classifier returned no scores"))
}

fn detect_and_render<D: Detector>(
  model: &D,
  render: &PngRender,
  bytes: &[u8],
) -> anyhow::Result<Vec<u8>> {
  let frame = decode_bgr(bytes)?;
  let result = model.infer(&frame)?;
  info!("检测到 {} 个目标", result.len());
  let png = render.render_result(frame, &result)?;
  Ok(png)
}
