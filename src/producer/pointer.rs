//! Pointer tracking producer

use crate::config::ProducerSettings;
use crate::error::{Result, SyncError};
use crate::geometry::normalize;
use crate::transport::Transport;
use crate::types::{CoordinateSpace, PointerEventKind, StreamDescriptor, WindowReference};

use super::SampleProducer;

/// Publishes `[x, y, event_kind]` samples
///
/// With normalization enabled, positions are divided by the reference
/// window. If the reference is missing or invalid the absolute position is
/// published instead and a warning is logged once.
pub struct PointerProducer {
    inner: SampleProducer,
    normalize: bool,
    reference: Option<WindowReference>,
    fallback_warned: bool,
}

impl PointerProducer {
    pub fn new(
        transport: &dyn Transport,
        settings: &ProducerSettings,
        source_id: impl Into<String>,
    ) -> Result<Self> {
        let space = if settings.normalize_pointer {
            CoordinateSpace::Normalized
        } else {
            CoordinateSpace::Absolute
        };
        let descriptor = StreamDescriptor::pointer(
            settings.pointer_stream_name.clone(),
            settings.pointer_rate(),
            space,
            source_id,
        );
        Ok(Self {
            inner: SampleProducer::new(transport, descriptor, None)?,
            normalize: settings.normalize_pointer,
            reference: settings.capture_reference,
            fallback_warned: false,
        })
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        self.inner.descriptor()
    }

    /// Update the reference window, e.g. after the capture window is resized
    pub fn set_reference(&mut self, reference: Option<WindowReference>) {
        self.reference = reference;
        self.fallback_warned = false;
    }

    pub fn reference(&self) -> Option<WindowReference> {
        self.reference
    }

    /// Publish a pointer sample; returns the coordinates actually written
    pub fn emit(&mut self, x: f64, y: f64, kind: PointerEventKind) -> Result<(f64, f64)> {
        let (px, py) = if self.normalize {
            self.normalized_or_absolute(x, y)
        } else {
            (x, y)
        };
        self.inner.emit(&[px, py, kind.code()])?;
        Ok((px, py))
    }

    fn normalized_or_absolute(&mut self, x: f64, y: f64) -> (f64, f64) {
        let reference = self.reference.unwrap_or(WindowReference::new(0.0, 0.0));
        match normalize(x, y, reference) {
            Ok(point) => point,
            Err(SyncError::InvalidReference { width, height }) => {
                if !self.fallback_warned {
                    tracing::warn!(
                        "Invalid pointer reference {}x{}, publishing absolute coordinates",
                        width,
                        height
                    );
                    self.fallback_warned = true;
                }
                (x, y)
            }
            Err(_) => (x, y),
        }
    }
}
