use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::channels::Channel;
use crate::lifecycle::Lifecycle;
use crate::retry::RetryPolicy;

/// A parsed operator line. Parsing is separate from dispatch so it can be
/// tested without a terminal attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `say <text>`, with the payload already trimmed.
    Say(String),
    Quit,
    Unknown(String),
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    // `get` keeps the prefix check safe on multibyte input.
    if line.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("say ")) {
        return Command::Say(line[4..].trim().to_string());
    }
    if line.eq_ignore_ascii_case("say") {
        return Command::Say(String::new());
    }
    if line.eq_ignore_ascii_case("quit") {
        return Command::Quit;
    }
    if line.trim().is_empty() {
        return Command::Empty;
    }
    Command::Unknown(line.to_string())
}

/// Read operator lines on a dedicated thread and publish them onto a
/// channel. Stdin reads block, so they never touch the async runtime; the
/// thread exits on EOF or when the receiving side is dropped.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
                    if tx.blocking_send(trimmed).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read operator input: {}", e);
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
    });
    rx
}

/// Operator console: relays `say` lines into the announcement channel and
/// turns `quit` into a farewell plus a clean shutdown.
pub struct OperatorConsole {
    channel: Arc<dyn Channel>,
    lifecycle: Lifecycle,
    lines: mpsc::Receiver<String>,
    retry: RetryPolicy,
}

impl OperatorConsole {
    pub fn new(channel: Arc<dyn Channel>, lifecycle: Lifecycle, lines: mpsc::Receiver<String>) -> Self {
        Self {
            channel,
            lifecycle,
            lines,
            retry: RetryPolicy::constant(Duration::from_secs(1)),
        }
    }

    pub async fn run(mut self) {
        self.lifecycle.ready().await;
        if self.lifecycle.is_shutting_down() {
            return;
        }
        info!("Operator console ready, accepting 'say' and 'quit'");

        loop {
            let line = tokio::select! {
                _ = self.lifecycle.shutdown_requested() => break,
                line = self.lines.recv() => match line {
                    Some(line) => line,
                    None => {
                        info!("Operator input closed, console task stopping");
                        break;
                    }
                },
            };

            match parse_command(&line) {
                Command::Say(text) if text.is_empty() => {
                    warn!("'say' command requires a message");
                }
                Command::Say(text) => {
                    if let Err(e) = self.channel.send_text(&text).await {
                        warn!("Failed to relay operator message: {}", e);
                        if self.pause_after_error().await {
                            break;
                        }
                    }
                }
                Command::Quit => {
                    info!("Operator requested shutdown");
                    if let Err(e) = self.channel.send_text("bot is shutting down Goodbye!").await {
                        warn!("Failed to send farewell: {}", e);
                    }
                    self.lifecycle.begin_shutdown();
                    break;
                }
                Command::Unknown(input) => {
                    warn!(input = %input, "Unknown console command");
                }
                Command::Empty => {}
            }
        }
    }

    /// Brief pause after a relay failure, cut short by shutdown.
    async fn pause_after_error(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.retry.delay_for(0)) => false,
            _ = self.lifecycle.shutdown_requested() => true,
        }
    }
}
