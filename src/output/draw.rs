// 该文件是 Leukovision 项目的一部分。
// src/output/draw.rs - 旋转框检测结果可视化
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

use ab_glyph::{FontArc, InvalidFont, PxScale};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;

use crate::{
  frame::{BgrColor, BgrFrame},
  model::{DetectResult, OrientedBox, WithLabel},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_PADDING: i32 = 5;
const BOX_THICKNESS: i32 = 2;

// 按类别编号取色
const PALETTE: [u32; 8] = [
  0xA351FB, 0xFF4040, 0xFFA1A0, 0xFF7633, 0xFFB633, 0xD1D435, 0x4CFB12, 0x94CF1A,
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法加载字体: {0}")]
  InvalidFont(#[from] InvalidFont),
}

/// 在 BGR 帧上绘制旋转框与标签
pub struct Annotator {
  font: FontArc,
  font_scale: PxScale,
  text_padding: i32,
  thickness: i32,
  text_color: BgrColor,
  palette: Vec<BgrColor>,
}

impl Annotator {
  pub fn new() -> Result<Self, DrawError> {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;

    Ok(Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      text_padding: LABEL_TEXT_PADDING,
      thickness: BOX_THICKNESS,
      text_color: BgrColor::WHITE,
      palette: PALETTE.iter().map(|&hex| BgrColor::from_hex(hex)).collect(),
    })
  }

  pub fn color_for(&self, class_id: u32) -> BgrColor {
    self.palette[class_id as usize % self.palette.len()]
  }

  /// 先画全部旋转框，再叠加全部标签。没有检测结果时不修改图像。
  pub fn annotate<T: WithLabel>(&self, frame: &mut BgrFrame, result: &DetectResult<T>) {
    for item in result.items.iter() {
      self.draw_oriented_box(frame, &item.obb, self.color_for(item.kind.to_label_id()));
    }
    for item in result.items.iter() {
      self.draw_label(
        frame,
        &item.obb,
        &item.label(),
        self.color_for(item.kind.to_label_id()),
      );
    }
  }

  fn draw_oriented_box(&self, frame: &mut BgrFrame, obb: &OrientedBox, color: BgrColor) {
    let corners = obb.corners();
    let canvas = frame.canvas_mut();
    for i in 0..corners.len() {
      let (x0, y0) = corners[i];
      let (x1, y1) = corners[(i + 1) % corners.len()];
      // 平移若干像素叠画以加粗
      for dx in 0..self.thickness {
        for dy in 0..self.thickness {
          let (dx, dy) = (dx as f32, dy as f32);
          draw_line_segment_mut(
            canvas,
            (x0 + dx, y0 + dy),
            (x1 + dx, y1 + dy),
            color.to_pixel(),
          );
        }
      }
    }
  }

  // 标签放在外接矩形左上角的上方，超出图像时向内收
  fn draw_label(&self, frame: &mut BgrFrame, obb: &OrientedBox, label: &str, color: BgrColor) {
    let (img_w, img_h) = (frame.width() as i32, frame.height() as i32);
    let [x_min, y_min, _, _] = obb.bounds();

    let (text_w, text_h) = text_size(self.font_scale, &self.font, label);
    let box_w = text_w as i32 + 2 * self.text_padding;
    let box_h = text_h as i32 + 2 * self.text_padding;

    let x = (x_min.round() as i32).clamp(0, (img_w - box_w).max(0));
    let y = (y_min.round() as i32 - box_h).clamp(0, (img_h - box_h).max(0));

    let canvas = frame.canvas_mut();
    let rect = Rect::at(x, y).of_size(box_w as u32, box_h as u32);
    draw_filled_rect_mut(canvas, rect, color.to_pixel());
    draw_text_mut(
      canvas,
      self.text_color.to_pixel(),
      x + self.text_padding,
      y + self.text_padding,
      self.font_scale,
      &self.font,
      label,
    );
  }
}
