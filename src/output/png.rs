// 该文件是 Leukovision 项目的一部分。
// src/output/png.rs - 标注结果编码为 PNG
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

use std::io::Cursor;

use image::ImageFormat;
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::BgrFrame,
  model::{DetectResult, WithLabel},
  output::{Annotator, Render},
};

#[derive(Error, Debug)]
pub enum EncodeError {
  #[error("PNG 编码错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// BGR 帧转换为 RGB 后编码为 PNG 字节。
/// 这是输出路径上唯一的一次通道转换。
pub fn encode_png(frame: BgrFrame) -> Result<Vec<u8>, EncodeError> {
  let image = frame.into_rgb_image();
  let mut buffer = Cursor::new(Vec::new());
  image.write_to(&mut buffer, ImageFormat::Png)?;
  let bytes = buffer.into_inner();
  debug!("PNG 编码完成: {} 字节", bytes.len());
  Ok(bytes)
}

/// 绘制检测结果并编码为内存中的 PNG
pub struct PngRender {
  annotator: Annotator,
}

impl PngRender {
  pub fn new(annotator: Annotator) -> Self {
    Self { annotator }
  }
}

impl<T: WithLabel> Render<BgrFrame, DetectResult<T>> for PngRender {
  type Rendered = Vec<u8>;
  type Error = EncodeError;

  fn render_result(
    &self,
    mut frame: BgrFrame,
    result: &DetectResult<T>,
  ) -> Result<Self::Rendered, Self::Error> {
    self.annotator.annotate(&mut frame, result);
    encode_png(frame)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::CellKind;
  use image::{Rgb, RgbImage};

  #[test]
  fn png_round_trip_preserves_colors() {
    let image = RgbImage::from_fn(5, 4, |x, y| Rgb([x as u8 * 50, y as u8 * 60, 7]));
    let bytes = encode_png(BgrFrame::from_rgb_image(&image)).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
    assert_eq!(decoded, image);
  }

  #[test]
  fn render_without_detections_is_plain_encode() {
    let render = PngRender::new(Annotator::new().unwrap());
    let image = RgbImage::from_pixel(16, 16, Rgb([0, 128, 255]));
    let bytes = render
      .render_result(BgrFrame::from_rgb_image(&image), &DetectResult::<CellKind>::empty())
      .unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
    assert_eq!(decoded, image);
  }
}
