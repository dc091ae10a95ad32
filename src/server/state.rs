// 该文件是 Leukovision 项目的一部分。
// src/server/state.rs - 应用上下文
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

use crate::{
  frame::BgrFrame,
  model::{CellKind, ClassScores, ClassifierInput, DetectResult, Model},
  output::PngRender,
};

/// 可供请求共享的分类模型
pub trait Classifier:
  Model<
    Input = ClassifierInput,
    Output = ClassScores,
    Error: std::error::Error + Send + Sync + 'static,
  > + Send
  + Sync
  + 'static
{
}

impl<M> Classifier for M where
  M: Model<
      Input = ClassifierInput,
      Output = ClassScores,
      Error: std::error::Error + Send + Sync + 'static,
    > + Send
    + Sync
    + 'static
{
}

/// 可供请求共享的检测模型
pub trait Detector:
  Model<
    Input = BgrFrame,
    Output = DetectResult<CellKind>,
    Error: std::error::Error + Send + Sync + 'static,
  > + Send
  + Sync
  + 'static
{
}

impl<M> Detector for M where
  M: Model<
      Input = BgrFrame,
      Output = DetectResult<CellKind>,
      Error: std::error::Error + Send + Sync + 'static,
    > + Send
    + Sync
    + 'static
{
}

/// 启动时构造一次，之后只读共享
pub struct AppState<C, D> {
  pub classifier: Arc<C>,
  pub detector: Arc<D>,
  pub render: Arc<PngRender>,
}

impl<C, D> Clone for AppState<C, D> {
  fn clone(&self) -> Self {
    Self {
      classifier: Arc::clone(&self.classifier),
      detector: Arc::clone(&self.detector),
      render: Arc::clone(&self.render),
    }
  }
}

impl<C: Classifier, D: Detector> AppState<C, D> {
  pub fn new(classifier: C, detector: D, render: PngRender) -> Self {
    Self {
      classifier: Arc::new(classifier),
      detector: Arc::new(detector),
      render: Arc::new(render),
    }
  }
}
