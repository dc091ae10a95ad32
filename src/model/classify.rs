// 该文件是 Leukovision 项目的一部分。
// src/model/classify.rs - 分类模型的前后处理
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

use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;
use serde::Serialize;

use crate::model::WithLabel;

/// 分类模型输入边长
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

/// 标签表中不存在的索引使用的名称
pub const UNKNOWN_CLASS: &str = "Unknown Class";

/// 分类模型的类别。索引 1 在标签表中不存在。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeukemiaStage {
  EarlyPreB,
  PrePro,
  ProPro,
}

impl WithLabel for LeukemiaStage {
  fn to_label_str(&self) -> String {
    match self {
      LeukemiaStage::EarlyPreB => "Early_Malignant_early_Pre-B",
      LeukemiaStage::PrePro => "Pre_Malignant_Pro-B",
      LeukemiaStage::ProPro => "Pro_Malignant_Pro-B",
    }
    .to_string()
  }

  fn to_label_id(&self) -> u32 {
    match self {
      LeukemiaStage::EarlyPreB => 0,
      LeukemiaStage::PrePro => 2,
      LeukemiaStage::ProPro => 3,
    }
  }

  fn from_label_id(id: u32) -> Option<Self> {
    match id {
      0 => Some(LeukemiaStage::EarlyPreB),
      2 => Some(LeukemiaStage::PrePro),
      3 => Some(LeukemiaStage::ProPro),
      _ => None,
    }
  }
}

/// NHWC `[1, 224, 224, 3]` 浮点张量，取值范围 [0, 1]
#[derive(Debug, Clone)]
pub struct ClassifierInput {
  tensor: Array4<f32>,
}

impl ClassifierInput {
  /// 直接缩放到 224x224（不保持长宽比），像素除以 255
  pub fn from_rgb_image(image: &RgbImage) -> Self {
    let size = CLASSIFIER_INPUT_SIZE;
    let resized = image::imageops::resize(image, size, size, FilterType::CatmullRom);
    let tensor = Array4::from_shape_fn(
      (1, size as usize, size as usize, 3),
      |(_, y, x, c)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
    );
    Self { tensor }
  }

  pub fn tensor(&self) -> &Array4<f32> {
    &self.tensor
  }
}

/// 分类模型输出的每类得分
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
  scores: Box<[f32]>,
}

impl From<Vec<f32>> for ClassScores {
  fn from(scores: Vec<f32>) -> Self {
    Self {
      scores: scores.into_boxed_slice(),
    }
  }
}

impl ClassScores {
  /// 最大得分的索引及其得分；并列时取第一个，NaN 不参与比较
  pub fn argmax(&self) -> Option<(usize, f32)> {
    self
      .scores
      .iter()
      .copied()
      .enumerate()
      .filter(|(_, score)| !score.is_nan())
      .fold(None, |best, (idx, score)| match best {
        Some((_, best_score)) if best_score >= score => best,
        _ => Some((idx, score)),
      })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
  pub confidence: f32,
  pub predicted_class: String,
}

impl Classification {
  /// 置信度为原始得分，不重新归一化
  pub fn from_scores(scores: &ClassScores) -> Option<Self> {
    let (idx, confidence) = scores.argmax()?;
    let predicted_class = u32::try_from(idx)
      .ok()
      .and_then(LeukemiaStage::from_label_id)
      .map(|stage| stage.to_label_str())
      .unwrap_or_else(|| UNKNOWN_CLASS.to_string());
    Some(Self {
      confidence,
      predicted_class,
    })
  }
}
