use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Outbound side of the MIDI connection. Opening and keeping the port alive is the host's job.
pub trait Transport: Send {
    fn is_connected(&self) -> bool;
    fn send_message(&mut self, message: &[u8]);
}

/// Transport for running without a controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn is_connected(&self) -> bool {
        false
    }

    fn send_message(&mut self, _message: &[u8]) {}
}

/// Records every message. Clones share the log, so one handle can be kept for inspection.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    connected: Arc<AtomicBool>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Removes and returns everything sent so far.
    pub fn take(&self) -> Vec<Vec<u8>> {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *sent)
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for MemoryTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_message(&mut self, message: &[u8]) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_vec());
    }
}
