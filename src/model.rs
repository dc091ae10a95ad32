// 该文件是 Leukovision 项目的一部分。
// src/model.rs - 模型
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

/// 推理模型。实现需要可以在多个请求间共享（`&self`）。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Option<Self>;
}

mod classify;
pub use self::classify::{
  CLASSIFIER_INPUT_SIZE, ClassScores, Classification, ClassifierInput, LeukemiaStage, UNKNOWN_CLASS,
};

mod detect;
pub use self::detect::{
  Candidate, CellKind, DetectItem, DetectResult, Letterbox, ObbDecodeError, ObbParams, OrientedBox,
  decode_obb_output, postprocess, rotated_nms,
};

#[cfg(feature = "model_onnx")]
mod onnx_classifier;
#[cfg(feature = "model_onnx")]
pub use self::onnx_classifier::{OnnxClassifier, OnnxClassifierBuilder, OnnxClassifierError};

#[cfg(feature = "model_onnx")]
mod yolo_obb;
#[cfg(feature = "model_onnx")]
pub use self::yolo_obb::{YoloObb, YoloObbBuilder, YoloObbError};
