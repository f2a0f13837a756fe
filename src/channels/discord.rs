use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::all::{
    ChannelId, Context, EventHandler, GatewayIntents, Message as SerenityMessage, Ready,
};
use serenity::gateway::ShardManager;
use serenity::Client;
use tracing::{error, info, warn};

use super::Channel;
use crate::coordinator::TaskCoordinator;
use crate::lifecycle::{Lifecycle, Phase};
use crate::retry::RetryPolicy;

/// Sending half of the Discord transport: a REST handle plus a fixed
/// destination. The handle stays valid across gateway reconnects, so a
/// sender built once at startup never goes stale.
pub struct DiscordSender {
    http: Arc<serenity::http::Http>,
    channel_id: ChannelId,
}

impl DiscordSender {
    pub fn new(http: Arc<serenity::http::Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Channel for DiscordSender {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send_text(&self, text: &str) -> anyhow::Result<()> {
        self.channel_id
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Failed to send Discord message: {}", e))
    }
}

/// Discord connection owner using the serenity library. Keeps the gateway
/// client alive, restarts it on crashes, and hands inbound events to the
/// task coordinator.
pub struct DiscordChannel {
    bot_token: String,
    target_channel: ChannelId,
    coordinator: Arc<TaskCoordinator>,
    lifecycle: Lifecycle,
    /// Stored once the client is built so shutdown can stop the gateway.
    shard_manager: std::sync::RwLock<Option<Arc<ShardManager>>>,
}

impl DiscordChannel {
    pub fn new(
        bot_token: &str,
        target_channel_id: u64,
        coordinator: Arc<TaskCoordinator>,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            target_channel: ChannelId::new(target_channel_id),
            coordinator,
            lifecycle,
            shard_manager: std::sync::RwLock::new(None),
        }
    }

    /// Start the Discord client with automatic retry on crash.
    /// Uses exponential backoff: 5s → 10s → 20s → 40s → 60s cap.
    pub async fn start_with_retry(self: Arc<Self>) {
        let policy = RetryPolicy::new(Duration::from_secs(5), Duration::from_secs(60));
        let stable_threshold = Duration::from_secs(60);
        let mut attempt = 0u32;

        loop {
            info!("Starting Discord client");
            let started = tokio::time::Instant::now();
            self.clone().start().await;
            let ran_for = started.elapsed();

            if self.lifecycle.is_shutting_down() {
                info!("Discord client stopped for shutdown");
                break;
            }

            if ran_for >= stable_threshold {
                attempt = 0;
            }
            let backoff = policy.delay_for(attempt);
            attempt = attempt.saturating_add(1);

            warn!(
                backoff_secs = backoff.as_secs(),
                ran_for_secs = ran_for.as_secs(),
                "Discord client stopped, restarting"
            );
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = self.lifecycle.shutdown_requested() => break,
            }
        }
    }

    async fn start(self: Arc<Self>) {
        let intents = GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let handler = DiscordHandler {
            channel: Arc::clone(&self),
        };

        let mut client = match Client::builder(&self.bot_token, intents)
            .event_handler(handler)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to create Discord client: {}", e);
                return;
            }
        };

        // Store the shard manager so disconnect() can stop the gateway.
        {
            let mut manager = self
                .shard_manager
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *manager = Some(client.shard_manager.clone());
        }

        tokio::select! {
            result = client.start() => {
                if let Err(e) = result {
                    warn!("Discord client error: {}", e);
                }
            }
            _ = self.lifecycle.shutdown_requested() => {
                info!("Shutdown requested, stopping Discord client");
                self.disconnect().await;
            }
        }
    }

    /// Stop the gateway connection so `start()` returns. Idempotent.
    pub async fn disconnect(&self) {
        let manager = {
            let guard = self
                .shard_manager
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.clone()
        };
        if let Some(manager) = manager {
            manager.shutdown_all().await;
        }
    }
}

/// Serenity event handler that bridges to our DiscordChannel methods.
struct DiscordHandler {
    channel: Arc<DiscordChannel>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(username = %ready.user.name, "entered the mainframe");

        if self.channel.lifecycle.phase() != Phase::Starting {
            // Gateway reconnect after a completed startup. Senders built
            // from the REST handle stay valid, so there is nothing to redo.
            return;
        }

        // Resolve the announcement target exactly once. An invisible or
        // nonexistent channel is a misconfiguration, not worth retrying.
        if let Err(e) = self.channel.target_channel.to_channel(&ctx.http).await {
            error!(
                channel_id = %self.channel.target_channel,
                "Target channel lookup failed: {}", e
            );
            self.channel.coordinator.fail_startup(format!(
                "target channel {} is not visible to the bot: {}",
                self.channel.target_channel, e
            ));
            return;
        }

        let sender = Arc::new(DiscordSender::new(
            ctx.http.clone(),
            self.channel.target_channel,
        ));
        self.channel.coordinator.on_transport_ready(sender).await;
    }

    async fn message(&self, ctx: Context, msg: SerenityMessage) {
        if msg.author.bot {
            return;
        }
        let reply = DiscordSender::new(ctx.http.clone(), msg.channel_id);
        self.channel
            .coordinator
            .on_inbound_message(&msg.content, &reply)
            .await;
    }
}
