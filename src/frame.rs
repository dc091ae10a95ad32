// 该文件是 Leukovision 项目的一部分。
// src/frame.rs - BGR 帧定义
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

use image::{Rgb, RgbImage};

const BGR_CHANNELS: usize = 3;

/// 检测与标注阶段使用的 HWC 帧，通道顺序为 B, G, R。
///
/// 内部复用 `RgbImage` 作为画布，但每个像素的三个分量分别是 B、G、R。
/// 在此帧上绘制时颜色也必须按 BGR 给出。编码输出之前必须调用
/// [`BgrFrame::into_rgb_image`] 做一次显式的通道交换。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrFrame {
  canvas: RgbImage,
}

impl BgrFrame {
  pub fn with_shape(width: u32, height: u32) -> Self {
    Self {
      canvas: RgbImage::new(width, height),
    }
  }

  /// 由 RGB 图像构造（交换 R 与 B）
  pub fn from_rgb_image(image: &RgbImage) -> Self {
    let mut canvas = image.clone();
    swap_red_blue(&mut canvas);
    Self { canvas }
  }

  /// 转为 RGB 图像（交换 B 与 R），消耗自身
  pub fn into_rgb_image(self) -> RgbImage {
    let mut canvas = self.canvas;
    swap_red_blue(&mut canvas);
    canvas
  }

  pub fn width(&self) -> u32 {
    self.canvas.width()
  }

  pub fn height(&self) -> u32 {
    self.canvas.height()
  }

  pub fn channels(&self) -> usize {
    BGR_CHANNELS
  }

  /// 取 (x, y) 处像素，返回 [b, g, r]
  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    self.canvas.get_pixel(x, y).0
  }

  /// 交错排列的 BGR 原始字节
  pub fn as_bgr(&self) -> &[u8] {
    self.canvas.as_raw()
  }

  /// 画布，颜色分量按 BGR 解释
  pub fn canvas(&self) -> &RgbImage {
    &self.canvas
  }

  pub fn canvas_mut(&mut self) -> &mut RgbImage {
    &mut self.canvas
  }
}

/// BGR 顺序的颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgrColor(pub [u8; 3]);

impl BgrColor {
  pub const WHITE: BgrColor = BgrColor([255, 255, 255]);

  /// 由 `0xRRGGBB` 构造
  pub const fn from_hex(hex: u32) -> Self {
    let r = ((hex >> 16) & 0xff) as u8;
    let g = ((hex >> 8) & 0xff) as u8;
    let b = (hex & 0xff) as u8;
    BgrColor([b, g, r])
  }

  /// 作为画布像素写入的值
  pub fn to_pixel(self) -> Rgb<u8> {
    Rgb(self.0)
  }
}

fn swap_red_blue(image: &mut RgbImage) {
  for pixel in image.pixels_mut() {
    pixel.0.swap(0, 2);
  }
}
