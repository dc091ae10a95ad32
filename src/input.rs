// 该文件是 Leukovision 项目的一部分。
// src/input.rs - 上传图像解码
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

use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

use crate::frame::BgrFrame;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("{0}")]
  ImageError(#[from] image::ImageError),
  #[error("{0}")]
  IoError(#[from] std::io::Error),
}

/// 将上传的字节解码为 RGB 图像，格式由内容推断
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
  let image = ImageReader::new(Cursor::new(bytes))
    .with_guessed_format()?
    .decode()?;
  debug!("解码图像: {}x{}", image.width(), image.height());
  Ok(image.to_rgb8())
}

/// 将上传的字节解码为 BGR 帧，并按 EXIF 方向信息摆正
pub fn decode_bgr(bytes: &[u8]) -> Result<BgrFrame, DecodeError> {
  let mut decoder = ImageReader::new(Cursor::new(bytes))
    .with_guessed_format()?
    .into_decoder()?;
  let orientation = decoder.orientation()?;
  let mut image = DynamicImage::from_decoder(decoder)?;
  image.apply_orientation(orientation);
  debug!(
    "解码图像: {}x{} ({:?})",
    image.width(),
    image.height(),
    orientation
  );
  Ok(BgrFrame::from_rgb_image(&image.to_rgb8()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{ImageFormat, Rgb};

  fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
  }

  #[test]
  fn decodes_png_regardless_of_file_name() {
    let image = RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]));
    let decoded = decode_rgb(&png_bytes(&image)).unwrap();
    assert_eq!(decoded, image);
  }

  #[test]
  fn bgr_decode_swaps_channels() {
    let image = RgbImage::from_pixel(1, 1, Rgb([200, 100, 50]));
    let frame = decode_bgr(&png_bytes(&image)).unwrap();
    assert_eq!(frame.pixel(0, 0), [50, 100, 200]);
  }

  // 40x10 的 JPEG，在 SOI 之后插入 Orientation=6 的 APP1 段
  fn rotated_jpeg_bytes() -> Vec<u8> {
    let image = RgbImage::from_pixel(40, 10, Rgb([120, 60, 30]));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
    let jpeg = buffer.into_inner();

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2a");
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&[0x00, 0x06, 0x00, 0x00]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut app1 = b"Exif\x00\x00".to_vec();
    app1.extend_from_slice(&tiff);

    let mut bytes = jpeg[..2].to_vec();
    bytes.extend_from_slice(&[0xFF, 0xE1]);
    bytes.extend_from_slice(&(app1.len() as u16 + 2).to_be_bytes());
    bytes.extend_from_slice(&app1);
    bytes.extend_from_slice(&jpeg[2..]);
    bytes
  }

  #[test]
  fn bgr_decode_applies_exif_orientation() {
    let bytes = rotated_jpeg_bytes();
    let frame = decode_bgr(&bytes).unwrap();
    assert_eq!((frame.width(), frame.height()), (10, 40));
  }

  #[test]
  fn rgb_decode_keeps_stored_orientation() {
    let image = decode_rgb(&rotated_jpeg_bytes()).unwrap();
    assert_eq!(image.dimensions(), (40, 10));
  }

  #[test]
  fn garbage_bytes_are_rejected() {
    assert!(decode_rgb(b"definitely not an image").is_err());
    assert!(decode_bgr(&[]).is_err());
  }
}
