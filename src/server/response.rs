// 该文件是 Leukovision 项目的一部分。
// src/server/response.rs - 统一 JSON 响应
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
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Success,
  Error,
}

/// `{status, message, data?}`，仅在提供了 data 时输出该字段
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T = Value> {
  pub status: Status,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data: Option<T>,
}

impl Envelope<Value> {
  pub fn error(message: impl Into<String>) -> Self {
    Self::new(Status::Error, message, None)
  }
}

impl<T: Serialize> Envelope<T> {
  pub fn new(status: Status, message: impl Into<String>, data: Option<T>) -> Self {
    Self {
      status,
      message: message.into(),
      data,
    }
  }

  pub fn success(message: impl Into<String>, data: T) -> Self {
    Self::new(Status::Success, message, Some(data))
  }

  pub fn into_response_with(self, status: StatusCode) -> Response {
    (status, Json(self)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn error_envelope_has_no_data_field() {
    let value = serde_json::to_value(Envelope::error("Invalid image file")).unwrap();
    assert_eq!(value, json!({"status": "error", "message": "Invalid image file"}));
  }

  #[test]
  fn success_envelope_carries_data() {
    let value = serde_json::to_value(Envelope::success("ok", json!({"confidence": 0.5}))).unwrap();
    assert_eq!(
      value,
      json!({"status": "success", "message": "ok", "data": {"confidence": 0.5}})
    );
  }

  #[test]
  fn empty_or_zero_payloads_are_kept() {
    let value = serde_json::to_value(Envelope::success("ok", json!({}))).unwrap();
    assert_eq!(value["data"], json!({}));

    let value = serde_json::to_value(Envelope::new(Status::Success, "ok", Some(0))).unwrap();
    assert_eq!(value["data"], json!(0));
  }

  #[test]
  fn response_uses_requested_status() {
    let response = Envelope::error("bad").into_response_with(StatusCode::BAD_REQUEST);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  }
}
