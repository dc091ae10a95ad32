// 该文件是 Leukovision 项目的一部分。
// src/main.rs - 推理服务主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use leukovision::{
  model::{CellKind, OnnxClassifierBuilder, YoloObb, YoloObbBuilder},
  output::{Annotator, PngRender},
  server::{AppState, router},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("分类模型: {}", args.classifier_model.display());
  info!("检测模型: {}", args.detector_model.display());
  info!(
    "检测参数: imgsz={} conf={} iou={} max_det={}",
    args.imgsz, args.confidence, args.iou, args.max_det
  );

  info!("正在加载模型...");
  let now = std::time::Instant::now();
  let classifier = OnnxClassifierBuilder::new(args.classifier_model.clone())
    .intra_threads(args.threads)
    .build()
    .context("加载分类模型失败")?;
  let detector: YoloObb<CellKind> = YoloObbBuilder::new(args.detector_model.clone())
    .imgsz(args.imgsz)
    .intra_threads(args.threads)
    .params(args.obb_params())
    .build()
    .context("加载检测模型失败")?;
  info!("模型加载完成，耗时: {:.2?}", now.elapsed());

  let render = PngRender::new(Annotator::new()?);
  let state = AppState::new(classifier, detector, render);
  let app = router(state, args.body_limit);

  let addr = args.bind_addr();
  let listener = tokio::net::TcpListener::bind(&addr)
    .await
    .with_context(|| format!("无法监听 {}", addr))?;
  info!("服务已启动: http://{}", addr);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已停止");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!("无法监听退出信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到退出信号，正在停止服务...");
}
