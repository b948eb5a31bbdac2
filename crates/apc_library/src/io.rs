use std::sync::Arc;

use log::{debug, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::lights::LedImage;
use crate::transport::{NullTransport, Transport};

/// Per-pattern connection to the outside world: the transport, the clock, and the
/// dirty tracking that keeps LED traffic proportional to state changes.
pub struct SurfaceIo {
    transport: Box<dyn Transport>,
    clock: Arc<dyn Clock>,
    dirty: bool,
    last_image: Option<LedImage>,
}

impl SurfaceIo {
    pub fn new(transport: Box<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            clock,
            dirty: true,
            last_image: None,
        }
    }

    /// No controller attached; queries keep working, output goes nowhere.
    pub fn disconnected() -> Self {
        Self::new(Box::new(NullTransport), Arc::new(MonotonicClock::new()))
    }

    pub fn timestamp(&self) -> f64 {
        self.clock.now_ms()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn send(&mut self, status: u8, data1: u8, data2: u8) {
        if !self.transport.is_connected() {
            return;
        }
        self.transport.send_message(&[status, data1, data2]);
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sends `image` if the state is dirty and the image differs from the last one sent.
    /// Returns true when a burst went out.
    pub fn flush(&mut self, image: LedImage) -> bool {
        if !self.dirty {
            return false;
        }
        if !self.transport.is_connected() {
            // stays dirty so the surface gets painted once output exists
            return false;
        }

        self.dirty = false;
        if self.last_image.as_ref() == Some(&image) {
            return false;
        }

        let messages = image.messages();
        debug!("flushing {} LED messages", messages.len());
        for [status, data1, data2] in messages {
            self.send(status, data1, data2);
        }
        if !self.transport.is_connected() {
            warn!("transport dropped during LED flush");
            self.last_image = None;
            self.dirty = true;
            return true;
        }
        self.last_image = Some(image);
        true
    }
}
