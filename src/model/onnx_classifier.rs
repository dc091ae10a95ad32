// 该文件是 Leukovision 项目的一部分。
// src/model/onnx_classifier.rs - ONNX 分类模型
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

use std::{path::PathBuf, sync::Mutex};

use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::TensorRef,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{ClassScores, ClassifierInput, Model};

const DEFAULT_INTRA_THREADS: usize = 4;

/// 导出为 ONNX 的 Keras 分类网络，输入 NHWC `[1, 224, 224, 3]`
pub struct OnnxClassifier {
  session: Mutex<Session>,
}

#[derive(Error, Debug)]
pub enum OnnxClassifierError {
  #[error("Model file not found: {0}")]
  ModelNotFound(String),
  #[error("{0}")]
  OrtError(#[from] ort::Error),
  #[error("Classifier returned no scores")]
  EmptyOutput,
  #[error("Classifier session is unusable after a previous panic")]
  PoisonedSession,
}

pub struct OnnxClassifierBuilder {
  model_path: PathBuf,
  intra_threads: usize,
}

impl OnnxClassifierBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      intra_threads: DEFAULT_INTRA_THREADS,
    }
  }

  pub fn intra_threads(mut self, intra_threads: usize) -> Self {
    self.intra_threads = intra_threads;
    self
  }

  pub fn build(self) -> Result<OnnxClassifier, OnnxClassifierError> {
    info!("加载分类模型: {}", self.model_path.display());
    if !self.model_path.exists() {
      return Err(OnnxClassifierError::ModelNotFound(
        self.model_path.display().to_string(),
      ));
    }

    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(self.intra_threads)?
      .commit_from_file(&self.model_path)?;

    for input in &session.inputs {
      debug!("分类模型输入: {} {:?}", input.name, input.input_type);
    }
    for output in &session.outputs {
      debug!("分类模型输出: {} {:?}", output.name, output.output_type);
    }
    info!("分类模型加载完成");

    Ok(OnnxClassifier {
      session: Mutex::new(session),
    })
  }
}

impl Model for OnnxClassifier {
  type Input = ClassifierInput;
  type Output = ClassScores;
  type Error = OnnxClassifierError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = TensorRef::from_array_view(input.tensor())?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxClassifierError::PoisonedSession)?;
    let outputs = session.run(ort::inputs![tensor])?;
    if outputs.len() == 0 {
      return Err(OnnxClassifierError::EmptyOutput);
    }

    // 输出形状 [1, num_classes]，按行主序展开即为得分向量
    let scores: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
    debug!("分类得分: {:?}", scores);
    if scores.is_empty() {
      return Err(OnnxClassifierError::EmptyOutput);
    }

    Ok(ClassScores::from(scores))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_model_file_is_reported() {
    let result = OnnxClassifierBuilder::new("/nonexistent/model_leukovision.onnx").build();
    assert!(matches!(result, Err(OnnxClassifierError::ModelNotFound(_))));
  }
}
