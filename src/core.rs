use std::sync::Arc;

use tracing::info;

use crate::channels::DiscordChannel;
use crate::config::AppConfig;
use crate::console;
use crate::coordinator::TaskCoordinator;
use crate::lifecycle::Lifecycle;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 1. Lifecycle state machine
    let lifecycle = Lifecycle::new();

    // 2. Schedule settings
    let tz = config.timezone()?;
    info!(
        schedule = %config.schedule.file.display(),
        timezone = %tz,
        "Schedule configured"
    );

    // 3. Operator input (blocking reads stay on their own thread)
    let lines = console::spawn_stdin_reader();

    // 4. Task coordinator
    let coordinator = Arc::new(TaskCoordinator::new(
        lifecycle.clone(),
        tz,
        config.schedule.file.clone(),
        lines,
    ));

    // 5. Discord channel
    let token = config.resolve_token()?;
    let channel = Arc::new(DiscordChannel::new(
        &token,
        config.discord.target_channel_id,
        Arc::clone(&coordinator),
        lifecycle.clone(),
    ));

    // 6. Shutdown watcher: waits for quit or Ctrl-C, then tears down in
    // order, tasks first and gateway last, so a farewell in flight
    // completes before the connection goes away.
    {
        let lifecycle = lifecycle.clone();
        let coordinator = Arc::clone(&coordinator);
        let channel = Arc::clone(&channel);
        tokio::spawn(async move {
            tokio::select! {
                _ = lifecycle.shutdown_requested() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, shutting down");
                    lifecycle.begin_shutdown();
                }
            }
            coordinator.await_tasks().await;
            channel.disconnect().await;
        });
    }

    // 7. Start Discord with auto-retry (blocks until shutdown)
    info!(version = env!("CARGO_PKG_VERSION"), "Starting schedbot");
    channel.start_with_retry().await;

    if let Some(reason) = coordinator.startup_failure() {
        anyhow::bail!(reason);
    }

    lifecycle.mark_stopped();
    info!("schedbot stopped");
    Ok(())
}
