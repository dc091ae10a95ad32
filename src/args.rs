// 该文件是 Leukovision 项目的一部分。
// src/args.rs - 服务参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;

use leukovision::{model::ObbParams, server::DEFAULT_BODY_LIMIT};

/// Leukovision 推理服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, default_value = "0.0.0.0", value_name = "HOST")]
  pub host: String,

  /// 监听端口
  #[arg(long, default_value_t = 5001, value_name = "PORT")]
  pub port: u16,

  /// 分类模型文件路径 (ONNX)
  #[arg(long, default_value = "./model/model_leukovision.onnx", value_name = "FILE")]
  pub classifier_model: PathBuf,

  /// 检测模型文件路径 (YOLO OBB, ONNX)
  #[arg(long, default_value = "./model/leukovision.onnx", value_name = "FILE")]
  pub detector_model: PathBuf,

  /// 检测模型输入尺寸，模型声明了固定尺寸时以模型为准
  #[arg(
    long,
    default_value_t = 640,
    value_name = "SIZE",
    value_parser = clap::value_parser!(u32).range(1..)
  )]
  pub imgsz: u32,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.25, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.7, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 每张图像最多保留的检测数
  #[arg(long, default_value_t = 300, value_name = "COUNT")]
  pub max_det: usize,

  /// 每个模型的推理线程数
  #[arg(long, default_value_t = 4, value_name = "COUNT")]
  pub threads: usize,

  /// 请求体大小上限（字节）
  #[arg(long, default_value_t = DEFAULT_BODY_LIMIT, value_name = "BYTES")]
  pub body_limit: usize,
}

impl Args {
  pub fn obb_params(&self) -> ObbParams {
    ObbParams {
      confidence: self.confidence,
      iou: self.iou,
      max_det: self.max_det,
    }
  }

  pub fn bind_addr(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}
