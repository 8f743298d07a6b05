//! Read-only views over raw detector output tensors.
//!
//! `TensorView` borrows one scale's output buffer laid out as
//! `(grid_h, grid_w, channels)` in row-major order, channels innermost. For a
//! YOLOv5 head the channel axis holds 3 anchors of `5 + class_number` values
//! each, so a single anchor slot is a contiguous sub-slice of its cell.

use crate::util::{PostprocessError, PostprocessResult};

/// Borrowed `(grid_h, grid_w, channels)` view over a float32 buffer.
#[derive(Copy, Clone, Debug)]
pub struct TensorView<'a> {
    data: &'a [f32],
    grid_h: usize,
    grid_w: usize,
    channels: usize,
}

impl<'a> TensorView<'a> {
    /// Creates a view with explicit dimensions.
    ///
    /// The buffer length must equal `grid_h * grid_w * channels` exactly.
    pub fn new(
        data: &'a [f32],
        grid_h: usize,
        grid_w: usize,
        channels: usize,
    ) -> PostprocessResult<Self> {
        if grid_h == 0 || grid_w == 0 || channels == 0 {
            return Err(PostprocessError::InvalidDimensions {
                grid_h,
                grid_w,
                channels,
            });
        }
        let expected = grid_h
            .checked_mul(grid_w)
            .and_then(|v| v.checked_mul(channels))
            .ok_or(PostprocessError::InvalidDimensions {
                grid_h,
                grid_w,
                channels,
            })?;
        if data.len() != expected {
            return Err(PostprocessError::BufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            grid_h,
            grid_w,
            channels,
        })
    }

    /// Creates a view from a reported tensor shape.
    ///
    /// Accepts `[H, W, C]` or an NHWC `[1, H, W, C]` shape.
    pub fn from_shape(data: &'a [f32], shape: &[usize]) -> PostprocessResult<Self> {
        match *shape {
            [h, w, c] => Self::new(data, h, w, c),
            [1, h, w, c] => Self::new(data, h, w, c),
            _ => Err(PostprocessError::InvalidShape { rank: shape.len() }),
        }
    }

    /// Returns the number of grid rows.
    pub fn grid_h(&self) -> usize {
        self.grid_h
    }

    /// Returns the number of grid columns.
    pub fn grid_w(&self) -> usize {
        self.grid_w
    }

    /// Returns the number of channels per cell.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns `[grid_h, grid_w, channels]`.
    pub fn dims(&self) -> [usize; 3] {
        [self.grid_h, self.grid_w, self.channels]
    }

    /// Returns the backing slice.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Returns all channels of cell `(gx, gy)`.
    pub fn cell(&self, gx: usize, gy: usize) -> Option<&'a [f32]> {
        if gx >= self.grid_w || gy >= self.grid_h {
            return None;
        }
        let start = (gy * self.grid_w + gx) * self.channels;
        self.data.get(start..start + self.channels)
    }

    /// Returns the `slot_len` channels of anchor slot `anchor` in cell
    /// `(gx, gy)`.
    pub fn anchor_slot(
        &self,
        gx: usize,
        gy: usize,
        anchor: usize,
        slot_len: usize,
    ) -> Option<&'a [f32]> {
        let cell = self.cell(gx, gy)?;
        let start = anchor.checked_mul(slot_len)?;
        cell.get(start..start.checked_add(slot_len)?)
    }
}
