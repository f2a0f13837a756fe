//! Test infrastructure: a recording channel for exercising tasks without a
//! live transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::channels::Channel;

/// A channel that captures all outgoing messages, with a failure switch
/// for exercising retry paths.
pub struct RecordingChannel {
    sent: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        })
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Make subsequent sends fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_text(&self, text: &str) -> anyhow::Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("simulated send failure");
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text.to_string());
        Ok(())
    }
}
