// 该文件是 Leukovision 项目的一部分。
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

use axum::{Router, extract::DefaultBodyLimit, routing::post};
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod response;
pub mod state;
pub mod upload;

pub use self::handlers::{ANALYZE_SUCCESS_MESSAGE, INVALID_IMAGE_MESSAGE};
pub use self::response::{Envelope, Status};
pub use self::state::{AppState, Classifier, Detector};
pub use self::upload::{IMAGE_FIELD, IngestError, UploadedImage};

/// 默认请求体上限 16 MiB
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

pub fn router<C: Classifier, D: Detector>(state: AppState<C, D>, body_limit: usize) -> Router {
  Router::new()
    .route("/analyze", post(handlers::analyze::<C, D>))
    .route("/detect", post(handlers::detect::<C, D>))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
