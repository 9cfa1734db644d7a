//! Coordinate normalization and viewport mapping
//!
//! Pointer positions are stored as fractions of a reference window so that a
//! recording can be replayed over a differently sized view. [`normalize`]
//! clamps into [0,1]; [`denormalize`] is the inverse and does not clamp.
//! [`ViewportFit`] maps a frame into a view with letterboxing.

use crate::error::{Result, SyncError};
use crate::types::{CoordinateSpace, WindowReference};

/// Map an absolute point into [0,1]² relative to `reference`
pub fn normalize(x: f64, y: f64, reference: WindowReference) -> Result<(f64, f64)> {
    if !reference.is_valid() {
        return Err(SyncError::InvalidReference {
            width: reference.width,
            height: reference.height,
        });
    }
    Ok((
        (x / reference.width).clamp(0.0, 1.0),
        (y / reference.height).clamp(0.0, 1.0),
    ))
}

/// Map a normalized point back into `reference` coordinates
pub fn denormalize(nx: f64, ny: f64, reference: WindowReference) -> (f64, f64) {
    (nx * reference.width, ny * reference.height)
}

/// Scale and offsets that fit a frame inside a view, preserving aspect ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportFit {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    /// Frame the fit was computed for
    pub frame: WindowReference,
}

impl ViewportFit {
    /// Letterbox `frame` into `view`, centered
    pub fn letterbox(frame: WindowReference, view: WindowReference) -> Result<Self> {
        for reference in [frame, view] {
            if !reference.is_valid() {
                return Err(SyncError::InvalidReference {
                    width: reference.width,
                    height: reference.height,
                });
            }
        }
        let scale = (view.width / frame.width).min(view.height / frame.height);
        Ok(Self {
            scale,
            offset_x: (view.width - frame.width * scale) / 2.0,
            offset_y: (view.height - frame.height * scale) / 2.0,
            frame,
        })
    }

    /// Map a frame-space point into view space
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }

    /// Map a recorded point into view space.
    ///
    /// Normalized points are first expanded to frame coordinates. A point
    /// whose stream declares absolute coordinates is never expanded.
    pub fn map_point(&self, x: f64, y: f64, declared: Option<CoordinateSpace>) -> (f64, f64) {
        let space = match declared {
            Some(CoordinateSpace::Absolute) => CoordinateSpace::Absolute,
            _ => CoordinateSpace::classify(x, y),
        };
        let (fx, fy) = match space {
            CoordinateSpace::Normalized => denormalize(x, y, self.frame),
            CoordinateSpace::Absolute => (x, y),
        };
        self.map(fx, fy)
    }
}
