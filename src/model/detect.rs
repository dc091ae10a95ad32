// 该文件是 Leukovision 项目的一部分。
// src/model/detect.rs - 旋转框检测结果与后处理
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

use std::f32::consts::{FRAC_PI_2, PI};

use image::{Rgb, RgbImage, imageops::FilterType};
use ndarray::{Array4, ArrayView2};
use thiserror::Error;
use tracing::{debug, error};

use crate::{frame::BgrFrame, model::WithLabel};

/// 检测模型的类别，顺序即类别编号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
  Benign,
  Early,
  Pre,
  Pro,
}

impl CellKind {
  pub const ALL: [CellKind; 4] = [CellKind::Benign, CellKind::Early, CellKind::Pre, CellKind::Pro];
}

impl WithLabel for CellKind {
  fn to_label_str(&self) -> String {
    match self {
      CellKind::Benign => "benign",
      CellKind::Early => "early",
      CellKind::Pre => "pre",
      CellKind::Pro => "pro",
    }
    .to_string()
  }

  fn to_label_id(&self) -> u32 {
    *self as u32
  }

  fn from_label_id(id: u32) -> Option<Self> {
    Self::ALL.get(id as usize).copied()
  }
}

/// 旋转框 (cx, cy, w, h, angle)，角度为弧度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
  pub cx: f32,
  pub cy: f32,
  pub width: f32,
  pub height: f32,
  pub angle: f32,
}

impl OrientedBox {
  /// 四个角点，顺序与 xywhr -> xyxyxyxy 一致
  pub fn corners(&self) -> [(f32, f32); 4] {
    let (sin, cos) = self.angle.sin_cos();
    let v1 = (self.width / 2.0 * cos, self.width / 2.0 * sin);
    let v2 = (-self.height / 2.0 * sin, self.height / 2.0 * cos);
    let (cx, cy) = (self.cx, self.cy);
    [
      (cx + v1.0 + v2.0, cy + v1.1 + v2.1),
      (cx + v1.0 - v2.0, cy + v1.1 - v2.1),
      (cx - v1.0 - v2.0, cy - v1.1 - v2.1),
      (cx - v1.0 + v2.0, cy - v1.1 + v2.1),
    ]
  }

  /// 轴对齐外接矩形 [x_min, y_min, x_max, y_max]
  pub fn bounds(&self) -> [f32; 4] {
    self.corners().iter().fold(
      [f32::MAX, f32::MAX, f32::MIN, f32::MIN],
      |[x0, y0, x1, y1], &(x, y)| [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
    )
  }

  /// 规范化：angle mod π 落在 [π/2, π) 时交换宽高，角度取 mod π/2
  pub fn regularized(self) -> Self {
    let swap = self.angle.rem_euclid(PI) >= FRAC_PI_2;
    let (width, height) = if swap {
      (self.height, self.width)
    } else {
      (self.width, self.height)
    };
    Self {
      width,
      height,
      angle: self.angle.rem_euclid(FRAC_PI_2),
      ..self
    }
  }

  fn covariance(&self) -> (f64, f64, f64) {
    let a = (self.width as f64).powi(2) / 12.0;
    let b = (self.height as f64).powi(2) / 12.0;
    let (sin, cos) = (self.angle as f64).sin_cos();
    let (cos2, sin2) = (cos * cos, sin * sin);
    (a * cos2 + b * sin2, a * sin2 + b * cos2, (a - b) * cos * sin)
  }

  /// 基于高斯建模的概率 IoU（probiou）
  pub fn probiou(&self, other: &OrientedBox) -> f32 {
    const EPS: f64 = 1e-7;
    let (x1, y1) = (self.cx as f64, self.cy as f64);
    let (x2, y2) = (other.cx as f64, other.cy as f64);
    let (a1, b1, c1) = self.covariance();
    let (a2, b2, c2) = other.covariance();

    let denom = (a1 + a2) * (b1 + b2) - (c1 + c2).powi(2) + EPS;
    let t1 = ((a1 + a2) * (y1 - y2).powi(2) + (b1 + b2) * (x1 - x2).powi(2)) / denom * 0.25;
    let t2 = ((c1 + c2) * (x2 - x1) * (y1 - y2)) / denom * 0.5;
    let det1 = (a1 * b1 - c1 * c1).max(0.0);
    let det2 = (a2 * b2 - c2 * c2).max(0.0);
    let t3 = (((a1 + a2) * (b1 + b2) - (c1 + c2).powi(2)) / (4.0 * (det1 * det2).sqrt() + EPS) + EPS)
      .ln()
      * 0.5;
    let bd = (t1 + t2 + t3).clamp(EPS, 100.0);
    let hd = (1.0 - (-bd).exp() + EPS).sqrt();
    (1.0 - hd) as f32
  }
}

#[derive(Debug, Clone)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub obb: OrientedBox,
}

impl<T: WithLabel> DetectItem<T> {
  /// 形如 `early: 0.87` 的显示标签
  pub fn label(&self) -> String {
    format!("{}: {:.2}", self.kind.to_label_str(), self.score)
  }
}

#[derive(Debug, Clone)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> DetectResult<T> {
  pub fn empty() -> Self {
    Self {
      items: Box::new([]),
    }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

impl<T> From<Vec<DetectItem<T>>> for DetectResult<T> {
  fn from(items: Vec<DetectItem<T>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 后处理参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObbParams {
  pub confidence: f32,
  pub iou: f32,
  pub max_det: usize,
}

impl Default for ObbParams {
  fn default() -> Self {
    Self {
      confidence: 0.25,
      iou: 0.7,
      max_det: 300,
    }
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum ObbDecodeError {
  #[error("输出形状错误: 期望至少 6 行, 实际 {0} 行")]
  OutputShape(usize),
  #[error("未知类别编号: {0}")]
  UnknownClass(u32),
}

/// 候选框（NMS 之前，坐标仍在 letterbox 空间）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub class_id: u32,
  pub score: f32,
  pub obb: OrientedBox,
}

/// 解析 `[4 + nc + 1, N]` 的原始输出：cx, cy, w, h, 各类得分, angle
pub fn decode_obb_output(
  output: ArrayView2<'_, f32>,
  params: &ObbParams,
) -> Result<Vec<Candidate>, ObbDecodeError> {
  let rows = output.nrows();
  if rows < 6 {
    error!("模型输出行数不足: {}", rows);
    return Err(ObbDecodeError::OutputShape(rows));
  }
  let num_classes = rows - 5;

  let candidates: Vec<Candidate> = output
    .columns()
    .into_iter()
    .filter_map(|col| {
      let (class_id, score) = (0..num_classes)
        .map(|c| (c, col[4 + c]))
        .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
      (score > params.confidence).then(|| Candidate {
        class_id: class_id as u32,
        score,
        obb: OrientedBox {
          cx: col[0],
          cy: col[1],
          width: col[2],
          height: col[3],
          angle: col[rows - 1],
        },
      })
    })
    .collect();

  debug!(
    "候选框 {} 个（共 {} 个锚点, {} 类）",
    candidates.len(),
    output.ncols(),
    num_classes
  );
  Ok(candidates)
}

/// 按类别的旋转框 NMS，返回保留的下标（按得分降序）。
/// 只要任一得分更高的同类框与其 probiou 不小于阈值即被丢弃。
pub fn rotated_nms(candidates: &[Candidate], iou: f32, max_det: usize) -> Vec<usize> {
  let mut order: Vec<usize> = (0..candidates.len()).collect();
  order.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));

  order
    .iter()
    .enumerate()
    .filter(|&(rank, &i)| {
      !order[..rank].iter().any(|&j| {
        candidates[j].class_id == candidates[i].class_id
          && candidates[j].obb.probiou(&candidates[i].obb) >= iou
      })
    })
    .map(|(_, &i)| i)
    .take(max_det)
    .collect()
}

/// 等比缩放并填充到正方形输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  size: u32,
  gain: f32,
  new_width: u32,
  new_height: u32,
  pad_left: u32,
  pad_top: u32,
  orig_width: u32,
  orig_height: u32,
}

impl Letterbox {
  pub const PAD_VALUE: u8 = 114;

  pub fn new(orig_width: u32, orig_height: u32, size: u32) -> Self {
    let gain = (size as f32 / orig_height as f32).min(size as f32 / orig_width as f32);
    let new_width = ((orig_width as f32 * gain).round() as u32).clamp(1, size);
    let new_height = ((orig_height as f32 * gain).round() as u32).clamp(1, size);
    let dw = (size - new_width) as f32 / 2.0;
    let dh = (size - new_height) as f32 / 2.0;
    Self {
      size,
      gain,
      new_width,
      new_height,
      pad_left: (dw - 0.1).round().max(0.0) as u32,
      pad_top: (dh - 0.1).round().max(0.0) as u32,
      orig_width,
      orig_height,
    }
  }

  pub fn gain(&self) -> f32 {
    self.gain
  }

  pub fn padding(&self) -> (u32, u32) {
    (self.pad_left, self.pad_top)
  }

  /// 生成 NCHW `[1, 3, size, size]` 的 RGB 张量，取值 [0, 1]
  pub fn tensor(&self, frame: &BgrFrame) -> Array4<f32> {
    let resized = image::imageops::resize(
      frame.canvas(),
      self.new_width,
      self.new_height,
      FilterType::Triangle,
    );
    let mut padded = RgbImage::from_pixel(self.size, self.size, Rgb([Self::PAD_VALUE; 3]));
    image::imageops::replace(
      &mut padded,
      &resized,
      self.pad_left as i64,
      self.pad_top as i64,
    );

    let size = self.size as usize;
    // 画布为 BGR，张量通道 c 取像素分量 2 - c
    Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
      padded.get_pixel(x as u32, y as u32)[2 - c] as f32 / 255.0
    })
  }

  /// 将 letterbox 空间的框映射回原图坐标
  pub fn restore(&self, obb: OrientedBox) -> OrientedBox {
    let (w, h) = (self.orig_width as f32, self.orig_height as f32);
    OrientedBox {
      cx: ((obb.cx - self.pad_left as f32) / self.gain).clamp(0.0, w),
      cy: ((obb.cy - self.pad_top as f32) / self.gain).clamp(0.0, h),
      width: (obb.width / self.gain).clamp(0.0, w),
      height: (obb.height / self.gain).clamp(0.0, h),
      angle: obb.angle,
    }
  }
}

/// 完整后处理：候选解析、NMS、规范化、坐标还原、类别映射
pub fn postprocess<T: WithLabel>(
  output: ArrayView2<'_, f32>,
  letterbox: &Letterbox,
  params: &ObbParams,
) -> Result<DetectResult<T>, ObbDecodeError> {
  let candidates = decode_obb_output(output, params)?;
  let keep = rotated_nms(&candidates, params.iou, params.max_det);

  let items = keep
    .into_iter()
    .map(|i| {
      let Candidate {
        class_id,
        score,
        obb,
      } = candidates[i];
      let kind = T::from_label_id(class_id).ok_or(ObbDecodeError::UnknownClass(class_id))?;
      Ok(DetectItem {
        kind,
        score,
        obb: letterbox.restore(obb.regularized()),
      })
    })
    .collect::<Result<Vec<_>, _>>()?;

  debug!("NMS 后保留 {} 个目标", items.len());
  Ok(DetectResult::from(items))
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array2;

  fn obb(cx: f32, cy: f32, width: f32, height: f32, angle: f32) -> OrientedBox {
    OrientedBox {
      cx,
      cy,
      width,
      height,
      angle,
    }
  }

  fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
  }

  #[test]
  fn cell_kind_ids_follow_list_order() {
    let names: Vec<String> = (0..4)
      .map(|id| CellKind::from_label_id(id).unwrap().to_label_str())
      .collect();
    assert_eq!(names, ["benign", "early", "pre", "pro"]);
    assert_eq!(CellKind::from_label_id(4), None);
    assert_eq!(CellKind::Pre.to_label_id(), 2);
  }

  #[test]
  fn label_uses_two_decimals() {
    let item = DetectItem {
      kind: CellKind::Early,
      score: 0.876,
      obb: obb(0.0, 0.0, 1.0, 1.0, 0.0),
    };
    assert_eq!(item.label(), "early: 0.88");
  }

  #[test]
  fn axis_aligned_corners_and_bounds() {
    let b = obb(10.0, 20.0, 8.0, 4.0, 0.0);
    let corners = b.corners();
    assert!(approx(corners[0].0, 14.0) && approx(corners[0].1, 22.0));
    assert!(approx(corners[2].0, 6.0) && approx(corners[2].1, 18.0));
    let [x0, y0, x1, y1] = b.bounds();
    assert!(approx(x0, 6.0) && approx(y0, 18.0) && approx(x1, 14.0) && approx(y1, 22.0));
  }

  #[test]
  fn rotated_bounds_grow() {
    let b = obb(0.0, 0.0, 10.0, 2.0, FRAC_PI_2);
    let [x0, y0, x1, y1] = b.bounds();
    assert!(approx(x1 - x0, 2.0));
    assert!(approx(y1 - y0, 10.0));
  }

  #[test]
  fn regularize_swaps_sides_past_half_pi() {
    let r = obb(0.0, 0.0, 10.0, 2.0, 2.0).regularized();
    assert_eq!((r.width, r.height), (2.0, 10.0));
    assert!(approx(r.angle, 2.0 - FRAC_PI_2));

    let r = obb(0.0, 0.0, 10.0, 2.0, 0.3).regularized();
    assert_eq!((r.width, r.height), (10.0, 2.0));
    assert!(approx(r.angle, 0.3));

    let r = obb(0.0, 0.0, 10.0, 2.0, -0.3).regularized();
    assert_eq!((r.width, r.height), (2.0, 10.0));
    assert!(approx(r.angle, FRAC_PI_2 - 0.3));
  }

  #[test]
  fn probiou_of_identical_boxes_is_one() {
    let b = obb(50.0, 50.0, 20.0, 10.0, 0.4);
    assert!(b.probiou(&b) > 0.99);
  }

  #[test]
  fn probiou_decreases_with_distance() {
    let a = obb(50.0, 50.0, 20.0, 10.0, 0.0);
    let near = obb(53.0, 50.0, 20.0, 10.0, 0.0);
    let far = obb(200.0, 50.0, 20.0, 10.0, 0.0);
    assert!(a.probiou(&near) > a.probiou(&far));
    assert!(a.probiou(&far) < 0.01);
  }

  fn candidate(class_id: u32, score: f32, cx: f32) -> Candidate {
    Candidate {
      class_id,
      score,
      obb: obb(cx, 50.0, 20.0, 10.0, 0.0),
    }
  }

  #[test]
  fn nms_suppresses_overlapping_boxes_of_same_class() {
    let candidates = [
      candidate(0, 0.6, 50.0),
      candidate(0, 0.9, 51.0),
      candidate(1, 0.5, 51.0),
      candidate(0, 0.4, 300.0),
    ];
    assert_eq!(rotated_nms(&candidates, 0.7, 300), vec![1, 2, 3]);
    assert_eq!(rotated_nms(&candidates, 0.7, 2), vec![1, 2]);
    assert!(rotated_nms(&[], 0.7, 300).is_empty());
  }

  fn raw_output(columns: &[[f32; 9]]) -> Array2<f32> {
    // 行: cx, cy, w, h, 4 类得分, angle
    Array2::from_shape_fn((9, columns.len()), |(r, c)| columns[c][r])
  }

  #[test]
  fn decode_filters_by_confidence() {
    let output = raw_output(&[
      [10.0, 10.0, 4.0, 4.0, 0.1, 0.8, 0.0, 0.0, 0.2],
      [20.0, 20.0, 4.0, 4.0, 0.1, 0.2, 0.1, 0.0, 0.0],
    ]);
    let candidates = decode_obb_output(output.view(), &ObbParams::default()).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].class_id, 1);
    assert!(approx(candidates[0].score, 0.8));
    assert!(approx(candidates[0].obb.angle, 0.2));
  }

  #[test]
  fn decode_rejects_short_output() {
    let output = Array2::<f32>::zeros((5, 3));
    assert_eq!(
      decode_obb_output(output.view(), &ObbParams::default()),
      Err(ObbDecodeError::OutputShape(5))
    );
  }

  #[test]
  fn letterbox_pads_the_short_side() {
    let lb = Letterbox::new(1280, 640, 640);
    assert!(approx(lb.gain(), 0.5));
    assert_eq!(lb.padding(), (0, 160));

    let restored = lb.restore(obb(320.0, 320.0, 100.0, 50.0, 0.1));
    assert!(approx(restored.cx, 640.0));
    assert!(approx(restored.cy, 320.0));
    assert!(approx(restored.width, 200.0));
    assert!(approx(restored.height, 100.0));
  }

  #[test]
  fn letterbox_tensor_is_rgb_with_grey_padding() {
    let mut frame = BgrFrame::with_shape(4, 2);
    for pixel in frame.canvas_mut().pixels_mut() {
      *pixel = Rgb([255, 0, 0]); // 纯蓝（BGR）
    }
    let lb = Letterbox::new(4, 2, 8);
    let tensor = lb.tensor(&frame);
    assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
    let pad = Letterbox::PAD_VALUE as f32 / 255.0;
    assert!(approx(tensor[[0, 0, 0, 0]], pad));
    // 内容区域：R=0, B=1
    assert!(approx(tensor[[0, 0, 4, 4]], 0.0));
    assert!(approx(tensor[[0, 2, 4, 4]], 1.0));
  }

  #[test]
  fn postprocess_maps_back_and_rejects_unknown_classes() {
    let lb = Letterbox::new(1280, 640, 640);
    let output = raw_output(&[[320.0, 320.0, 10.0, 20.0, 0.0, 0.0, 0.9, 0.0, 0.0]]);
    let result: DetectResult<CellKind> =
      postprocess(output.view(), &lb, &ObbParams::default()).unwrap();
    assert_eq!(result.len(), 1);
    let item = &result.items[0];
    assert_eq!(item.kind, CellKind::Pre);
    assert!(approx(item.obb.cx, 640.0));
    assert!(approx(item.obb.width, 20.0));

    // 5 类输出，类别 4 不在列表内
    let output = Array2::from_shape_fn((10, 1), |(r, _)| match r {
      0 | 1 => 100.0,
      2 | 3 => 10.0,
      8 => 0.9,
      _ => 0.0,
    });
    let err = postprocess::<CellKind>(output.view(), &lb, &ObbParams::default()).unwrap_err();
    assert_eq!(err, ObbDecodeError::UnknownClass(4));
  }
}
