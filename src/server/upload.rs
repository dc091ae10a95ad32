// 该文件是 Leukovision 项目的一部分。
// src/server/upload.rs - multipart 图像字段读取
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

use axum::{
  body::Bytes,
  extract::{Multipart, multipart::MultipartRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::server::response::Envelope;

/// 上传图像所在的表单字段名
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Clone)]
pub struct UploadedImage {
  pub file_name: String,
  pub bytes: Bytes,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngestError {
  #[error("No image file provided")]
  MissingField,
  #[error("No selected file")]
  EmptyFileName,
}

impl IntoResponse for IngestError {
  fn into_response(self) -> Response {
    Envelope::error(self.to_string()).into_response_with(StatusCode::BAD_REQUEST)
  }
}

/// 取第一个名为 `image` 且带文件名的文件字段。
/// 请求不是 multipart 或无法解析时视为未提供图像。
pub async fn read_image_field(
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadedImage, IngestError> {
  let mut multipart = multipart.map_err(|rejection| {
    debug!("请求不是有效的 multipart: {}", rejection);
    IngestError::MissingField
  })?;

  loop {
    let field = match multipart.next_field().await {
      Ok(Some(field)) => field,
      Ok(None) => return Err(IngestError::MissingField),
      Err(e) => {
        warn!("multipart 解析失败: {}", e);
        return Err(IngestError::MissingField);
      }
    };

    if field.name() != Some(IMAGE_FIELD) {
      continue;
    }
    // 没有 filename 参数的同名字段是普通表单值
    let Some(file_name) = field.file_name().map(str::to_owned) else {
      continue;
    };
    if file_name.is_empty() {
      return Err(IngestError::EmptyFileName);
    }

    let bytes = field.bytes().await.map_err(|e| {
      warn!("读取上传文件失败: {}", e);
      IngestError::MissingField
    })?;
    return Ok(UploadedImage { file_name, bytes });
  }
}
