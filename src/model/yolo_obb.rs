// 该文件是 Leukovision 项目的一部分。
// src/model/yolo_obb.rs - YOLO 旋转框检测模型
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

use std::{marker::PhantomData, path::PathBuf, sync::Mutex};

use ndarray::{Axis, Ix3};
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::{TensorRef, ValueType},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  frame::BgrFrame,
  model::{DetectResult, Letterbox, Model, ObbDecodeError, ObbParams, WithLabel, postprocess},
};

const YOLO_OBB_DEFAULT_IMGSZ: u32 = 640;
const YOLO_OBB_DEFAULT_INTRA_THREADS: usize = 4;

/// 导出为 ONNX 的 YOLO-OBB 网络。
/// 输入 NCHW `[1, 3, imgsz, imgsz]`，输出 `[1, 4 + nc + 1, N]`。
pub struct YoloObb<T> {
  session: Mutex<Session>,
  imgsz: u32,
  params: ObbParams,
  _phantom: PhantomData<fn() -> T>,
}

#[derive(Error, Debug)]
pub enum YoloObbError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型输出无效: {0}")]
  InvalidOutput(String),
  #[error("后处理错误: {0}")]
  DecodeError(#[from] ObbDecodeError),
  #[error("推理会话锁已失效")]
  PoisonedSession,
}

pub struct YoloObbBuilder {
  model_path: PathBuf,
  imgsz: u32,
  intra_threads: usize,
  params: ObbParams,
}

impl YoloObbBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      imgsz: YOLO_OBB_DEFAULT_IMGSZ,
      intra_threads: YOLO_OBB_DEFAULT_INTRA_THREADS,
      params: ObbParams::default(),
    }
  }

  pub fn imgsz(mut self, imgsz: u32) -> Self {
    self.imgsz = imgsz;
    self
  }

  pub fn intra_threads(mut self, intra_threads: usize) -> Self {
    self.intra_threads = intra_threads;
    self
  }

  pub fn params(mut self, params: ObbParams) -> Self {
    self.params = params;
    self
  }

  pub fn build<T: WithLabel>(self) -> Result<YoloObb<T>, YoloObbError> {
    info!("加载检测模型: {}", self.model_path.display());
    if !self.model_path.exists() {
      return Err(YoloObbError::ModelNotFound(
        self.model_path.display().to_string(),
      ));
    }

    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(self.intra_threads)?
      .commit_from_file(&self.model_path)?;

    // 静态导出的模型自带输入尺寸，以模型为准
    let mut imgsz = self.imgsz;
    if let Some(input) = session.inputs.first() {
      debug!("检测模型输入: {} {:?}", input.name, input.input_type);
      if let ValueType::Tensor { shape, .. } = &input.input_type
        && shape.len() == 4
        && shape[2] > 0
        && shape[2] == shape[3]
      {
        let model_size = shape[2] as u32;
        if model_size != imgsz {
          warn!("配置的输入尺寸 {} 与模型不符，使用模型尺寸 {}", imgsz, model_size);
        }
        imgsz = model_size;
      }
    }
    info!("检测模型加载完成，输入尺寸 {}x{}", imgsz, imgsz);

    Ok(YoloObb {
      session: Mutex::new(session),
      imgsz,
      params: self.params,
      _phantom: PhantomData,
    })
  }
}

impl<T: WithLabel> Model for YoloObb<T> {
  type Input = BgrFrame;
  type Output = DetectResult<T>;
  type Error = YoloObbError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let letterbox = Letterbox::new(input.width(), input.height(), self.imgsz);
    let tensor = letterbox.tensor(input);
    let tensor = TensorRef::from_array_view(&tensor)?;

    debug!("执行检测推理");
    let mut session = self
      .session
      .lock()
      .map_err(|_| YoloObbError::PoisonedSession)?;
    let outputs = session.run(ort::inputs![tensor])?;
    if outputs.len() == 0 {
      error!("检测模型没有输出");
      return Err(YoloObbError::InvalidOutput("no outputs".to_string()));
    }

    let raw = outputs[0].try_extract_array::<f32>()?;
    debug!("检测模型输出形状: {:?}", raw.shape());
    let raw = raw
      .into_dimensionality::<Ix3>()
      .map_err(|e| YoloObbError::InvalidOutput(e.to_string()))?;
    if raw.len_of(Axis(0)) != 1 {
      return Err(YoloObbError::InvalidOutput(format!(
        "batch size {}",
        raw.len_of(Axis(0))
      )));
    }

    let result = postprocess(raw.index_axis(Axis(0), 0), &letterbox, &self.params)?;
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::CellKind;

  #[test]
  fn missing_model_file_is_reported() {
    let result = YoloObbBuilder::new("/nonexistent/leukovision.onnx")
      .imgsz(320)
      .build::<CellKind>();
    assert!(matches!(result, Err(YoloObbError::ModelNotFound(_))));
  }
}
