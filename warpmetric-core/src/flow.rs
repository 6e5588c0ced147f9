//! Displacement field resampling and point warping.
//!
//! The model predicts its field at a small internal resolution. Before the
//! field can move points given in original-image pixels it is resized to the
//! original resolution and each channel is multiplied by its own axis scale:
//! one cell of displacement at the internal size is `scale` pixels at full size.
//!
//! Resizing is separable: per-axis tap tables are built once for the chosen
//! [`ResizeFilter`] and applied along x, then along y.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::geometry::Point;
use crate::line::Line;

/// Interpolation used when resizing a displacement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    /// Nearest source cell (`floor(dst * src / dst_len)`).
    #[default]
    Nearest,
    /// Bilinear with half-pixel centres and clamped edges.
    Bilinear,
    /// Overlap-weighted box average.
    Area,
}

/// Dense `(dx, dy)` field of shape `(height, width, 2)`.
#[derive(Debug, Clone)]
pub struct DisplacementField {
    data: Array3<f32>,
}

impl DisplacementField {
    /// Wrap an `(H, W, 2)` array.
    pub fn from_hwc(data: Array3<f32>) -> Result<Self> {
        if data.shape()[2] != 2 {
            return Err(MetricError::FieldShape(data.shape().to_vec()));
        }
        Ok(Self { data })
    }

    /// Wrap a `(2, H, W)` array, as emitted by channel-first networks.
    pub fn from_chw(data: Array3<f32>) -> Result<Self> {
        if data.shape()[0] != 2 {
            return Err(MetricError::FieldShape(data.shape().to_vec()));
        }
        let hwc = data.permuted_axes([1, 2, 0]).as_standard_layout().into_owned();
        Ok(Self { data: hwc })
    }

    pub fn width(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn height(&self) -> usize {
        self.data.shape()[0]
    }

    /// Channel 0 is x displacement, channel 1 is y displacement.
    pub fn channel(&self, c: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(2), c)
    }

    /// Resize to `width x height` and rescale each channel by its axis factor.
    pub fn resample(&self, width: usize, height: usize, filter: ResizeFilter) -> Result<ResampledFlow> {
        if width == 0 || height == 0 || self.width() == 0 || self.height() == 0 {
            return Err(MetricError::EmptyResolution { width, height });
        }
        let scale_x = width as f32 / self.width() as f32;
        let scale_y = height as f32 / self.height() as f32;

        let taps_x = axis_taps(self.width(), width, filter);
        let taps_y = axis_taps(self.height(), height, filter);

        let mut flow_x = resize_channel(self.channel(0), &taps_x, &taps_y);
        let mut flow_y = resize_channel(self.channel(1), &taps_x, &taps_y);
        flow_x.mapv_inplace(|v| v * scale_x);
        flow_y.mapv_inplace(|v| v * scale_y);

        log::trace!(
            "resampled flow {}x{} -> {}x{} (scale {:.3}, {:.3}, {:?})",
            self.width(),
            self.height(),
            width,
            height,
            scale_x,
            scale_y,
            filter
        );

        Ok(ResampledFlow { flow_x, flow_y })
    }
}

/// Per-pixel displacement at the original image resolution.
#[derive(Debug, Clone)]
pub struct ResampledFlow {
    flow_x: Array2<f32>,
    flow_y: Array2<f32>,
}

impl ResampledFlow {
    /// Build directly from two `(H, W)` channels that already live at image resolution.
    pub fn from_channels(flow_x: Array2<f32>, flow_y: Array2<f32>) -> Result<Self> {
        if flow_x.dim() != flow_y.dim() {
            return Err(MetricError::FieldShape(vec![
                flow_x.nrows(),
                flow_x.ncols(),
                flow_y.nrows(),
                flow_y.ncols(),
            ]));
        }
        if flow_x.is_empty() {
            return Err(MetricError::EmptyResolution {
                width: flow_x.ncols(),
                height: flow_x.nrows(),
            });
        }
        Ok(Self { flow_x, flow_y })
    }

    pub fn width(&self) -> usize {
        self.flow_x.ncols()
    }

    pub fn height(&self) -> usize {
        self.flow_x.nrows()
    }

    pub fn flow_x(&self) -> &Array2<f32> {
        &self.flow_x
    }

    pub fn flow_y(&self) -> &Array2<f32> {
        &self.flow_y
    }

    /// Displacement of the cell nearest to `p`.
    pub fn displacement_at(&self, p: Point) -> (f32, f32) {
        let row = nearest_index(p.y, self.height());
        let col = nearest_index(p.x, self.width());
        (self.flow_x[[row, col]], self.flow_y[[row, col]])
    }

    /// Move `p` backwards along the field: `p - flow(round(p))`.
    pub fn warp(&self, p: Point) -> Point {
        let (dx, dy) = self.displacement_at(p);
        Point::new(p.x - dx, p.y - dy)
    }

    pub fn warp_line(&self, line: &Line) -> Line {
        line.points.iter().map(|&p| self.warp(p)).collect()
    }
}

fn nearest_index(v: f32, len: usize) -> usize {
    // Points are expected inside the image; clamp so x = W - 0.4 stays on the grid.
    (v.round().max(0.0) as usize).min(len - 1)
}

/// Source taps `(index, weight)` for each destination index along one axis.
fn axis_taps(src: usize, dst: usize, filter: ResizeFilter) -> Vec<Vec<(usize, f32)>> {
    let scale = src as f64 / dst as f64;
    let last = src - 1;
    (0..dst)
        .map(|i| match filter {
            ResizeFilter::Nearest => {
                let k = ((i as f64 * scale).floor() as usize).min(last);
                vec![(k, 1.0)]
            }
            ResizeFilter::Bilinear => {
                let s = ((i as f64 + 0.5) * scale - 0.5).max(0.0);
                let k0 = (s.floor() as usize).min(last);
                let k1 = (k0 + 1).min(last);
                let frac = (s - k0 as f64) as f32;
                if k0 == k1 || frac == 0.0 {
                    vec![(k0, 1.0)]
                } else {
                    vec![(k0, 1.0 - frac), (k1, frac)]
                }
            }
            ResizeFilter::Area => {
                let start = i as f64 * scale;
                let end = (i as f64 + 1.0) * scale;
                let first = start.floor() as usize;
                let stop = (end.ceil() as usize).min(src);
                (first..stop)
                    .filter_map(|k| {
                        let overlap = end.min(k as f64 + 1.0) - start.max(k as f64);
                        (overlap > 0.0).then(|| (k, (overlap / scale) as f32))
                    })
                    .collect()
            }
        })
        .collect()
}

fn resize_channel(
    src: ArrayView2<'_, f32>,
    taps_x: &[Vec<(usize, f32)>],
    taps_y: &[Vec<(usize, f32)>],
) -> Array2<f32> {
    let rows = src.nrows();
    let mut horizontal = Array2::<f32>::zeros((rows, taps_x.len()));
    for r in 0..rows {
        for (c, taps) in taps_x.iter().enumerate() {
            horizontal[[r, c]] = taps.iter().map(|&(k, w)| w * src[[r, k]]).sum();
        }
    }

    let mut out = Array2::<f32>::zeros((taps_y.len(), taps_x.len()));
    for (r, taps) in taps_y.iter().enumerate() {
        for c in 0..taps_x.len() {
            out[[r, c]] = taps.iter().map(|&(k, w)| w * horizontal[[k, c]]).sum();
        }
    }
    out
}
