use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::broadcast::HourlyBroadcast;
use crate::channels::Channel;
use crate::console::OperatorConsole;
use crate::lifecycle::Lifecycle;
use crate::router;

/// Wires the long-lived tasks to the transport once it comes up and owns
/// their handles, so shutdown can wait for every task to finish before the
/// connection is torn down.
pub struct TaskCoordinator {
    lifecycle: Lifecycle,
    tz: Tz,
    schedule_path: PathBuf,
    started: AtomicBool,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    /// Operator input, handed to the console task on first readiness.
    lines: std::sync::Mutex<Option<mpsc::Receiver<String>>>,
    startup_failure: std::sync::Mutex<Option<String>>,
}

impl TaskCoordinator {
    pub fn new(
        lifecycle: Lifecycle,
        tz: Tz,
        schedule_path: PathBuf,
        lines: mpsc::Receiver<String>,
    ) -> Self {
        Self {
            lifecycle,
            tz,
            schedule_path,
            started: AtomicBool::new(false),
            tasks: std::sync::Mutex::new(Vec::new()),
            lines: std::sync::Mutex::new(Some(lines)),
            startup_failure: std::sync::Mutex::new(None),
        }
    }

    /// First transport readiness: announce startup, spawn the periodic
    /// tasks, then mark the process ready. The announcement is awaited
    /// before readiness so it is the first message the channel sees.
    /// Gateway reconnects land here again and are ignored.
    pub async fn on_transport_ready(&self, sender: Arc<dyn Channel>) {
        if self.started.swap(true, Ordering::SeqCst) {
            info!("Transport reconnected, tasks already running");
            return;
        }

        let announcement = format!(
            "super cool bot is online. Startup time: {}",
            Utc::now().with_timezone(&self.tz).format("%H:%M:%S %Z")
        );
        if let Err(e) = sender.send_text(&announcement).await {
            warn!("Failed to send startup announcement: {}", e);
        }

        let lines = self
            .lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let mut handles = Vec::new();
        handles.push(tokio::spawn(
            HourlyBroadcast::new(sender.clone(), self.lifecycle.clone(), self.tz).run(),
        ));
        if let Some(lines) = lines {
            handles.push(tokio::spawn(
                OperatorConsole::new(sender.clone(), self.lifecycle.clone(), lines).run(),
            ));
        }
        {
            let mut tasks = self
                .tasks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            tasks.extend(handles);
        }

        self.lifecycle.mark_ready();
        info!(channel = sender.name(), "Startup complete, periodic tasks running");
    }

    /// One inbound chat message from the transport.
    pub async fn on_inbound_message(&self, text: &str, reply: &dyn Channel) {
        router::dispatch(text, reply, &self.schedule_path, self.tz).await;
    }

    /// Record an unrecoverable startup problem and begin shutdown. The
    /// first recorded reason becomes the process exit error.
    pub fn fail_startup(&self, reason: String) {
        {
            let mut failure = self
                .startup_failure
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            failure.get_or_insert(reason);
        }
        self.lifecycle.begin_shutdown();
    }

    pub fn startup_failure(&self) -> Option<String> {
        self.startup_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Wait for every spawned task to finish. Called during shutdown after
    /// the lifecycle has flipped, so the tasks are already unwinding; a
    /// completed farewell is therefore on the wire before this returns.
    pub async fn await_tasks(&self) {
        let handles = {
            let mut tasks = self
                .tasks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *tasks)
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}
