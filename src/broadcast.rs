use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use futures::FutureExt;
use tracing::{info, warn};

use crate::channels::Channel;
use crate::lifecycle::Lifecycle;
use crate::retry::RetryPolicy;

/// Hamster gallery posted by the hourly broadcast, one random entry per
/// hour.
const GALLERY: [&str; 10] = [
    "https://cdn.discordapp.com/attachments/1448683440831598808/1448704528357658815/e73cd4ddca957c0794be7e140f052990.jpg?ex=693c3abb&is=693ae93b&hm=d2c9268b3b67de733a57122ba968bed12dfbebdc2e2ac76091db0407a90902a3&",
    "https://cdn.discordapp.com/attachments/1447116715044507760/1448318554289082408/4fe33d5dbe2ec0a0e06f1c3fdb4f223a.jpg?ex=693ccd83&is=693b7c03&hm=1426c9f7fe342d067b7f9c8919870cf1a2ca1c157735a8aca87a7361b72c8bda&",
    "https://cdn.discordapp.com/attachments/1447116715044507760/1448315205225287680/4f55979bf27ca414e71b2293f3cedc18.jpg?ex=693cca65&is=693b78e5&hm=29ca4cf126c6204ecdfe76b1da62964cf54f98381336c48e78f6c6378a9b71bc&",
    "https://cdn.discordapp.com/attachments/1447116715044507760/1447968286930112624/fa6bfcce972a6135e38bfd9a439401bb.jpg?ex=693cd8cd&is=693b874d&hm=6730e70124a51f07a98a5b3e8f7f60ed19e804ecae86865d520543205f88dfd6&",
    "https://cdn.discordapp.com/attachments/1447116715044507760/1447945351066550272/d6a5508bd631a1043b66f443d066e4ab.jpg?ex=693cc371&is=693b71f1&hm=f712300334ae101dd86d928bb531f645594dc87fe7a12f803c37cb0dd2721161&",
    "https://cdn.discordapp.com/attachments/1447116715044507760/1447881640645754890/3ff44c37ce8c905a57c107c3d3c8842d.jpg?ex=693c881b&is=693b369b&hm=9d52d42ec422e9850e8964a4e672ae4ab7352b1c610f4938964f812120454c3d&",
    "https://cdn.discordapp.com/attachments/1447116715044507760/1447879240887304214/9d27876501e96ebef7604c451db0ed34_1.jpg?ex=693c85df&is=693b345f&hm=75c74e5b335bee60d8f7b9608e726eb6c791ed7e6f079e1e8c3a614105dbf89c&",
    "https://cdn.discordapp.com/attachments/1447116715044507760/1447869141137756261/ef3a31c80a1a3fbdbe6b561d13f302b2.jpg?ex=693c7c77&is=693b2af7&hm=33a464eb5b7cf61b0cad84e64ccbc06e45ff1ead0fc9fe23338ac67b240c3167&",
    "https://cdn.discordapp.com/attachments/1447116715044507760/1447142312881950740/98e9045249478573da6c361a03c560b2.jpg?ex=693c7a8d&is=693b290d&hm=7161b6543ba7ce1ffa0c3de92a771881f7457f0738f30947658e2a969120e92e&",
    "https://cdn.discordapp.com/attachments/1447116715044507760/1447138213964681288/jollyham.jpg?ex=693c76bc&is=693b253c&hm=36c8ed75fc6086d543ce20dfe197e572c41a608d7379774391c81a946819b965&",
];

fn pick_image() -> &'static str {
    GALLERY[rand::random::<usize>() % GALLERY.len()]
}

/// Seconds from `now` to the next top of the hour. At an exact hour
/// boundary this is a full 3600, so a broadcast that just fired waits a
/// whole hour rather than firing twice.
pub fn seconds_until_next_hour(now: DateTime<Tz>) -> u64 {
    (60 - now.minute() as u64) * 60 - now.second() as u64
}

/// Posts one gallery entry to the announcement channel every hour, aligned
/// to wall-clock hour boundaries in the configured time zone.
pub struct HourlyBroadcast {
    channel: Arc<dyn Channel>,
    lifecycle: Lifecycle,
    tz: Tz,
    retry: RetryPolicy,
}

impl HourlyBroadcast {
    pub fn new(channel: Arc<dyn Channel>, lifecycle: Lifecycle, tz: Tz) -> Self {
        Self {
            channel,
            lifecycle,
            tz,
            retry: RetryPolicy::constant(Duration::from_secs(60)),
        }
    }

    /// Run until shutdown. A failed or panicking send is logged and retried
    /// after the policy delay; the hourly cadence itself never dies.
    pub async fn run(self) {
        self.lifecycle.ready().await;
        if self.lifecycle.is_shutting_down() {
            return;
        }

        let wait = seconds_until_next_hour(Utc::now().with_timezone(&self.tz));
        info!(seconds = wait, "Waiting to align with the next hour");
        if self.sleep_unless_shutdown(Duration::from_secs(wait)).await {
            return;
        }

        loop {
            if self.lifecycle.is_shutting_down() {
                break;
            }
            let delay = match AssertUnwindSafe(self.broadcast_once()).catch_unwind().await {
                Ok(Ok(())) => Duration::from_secs(3600),
                Ok(Err(e)) => {
                    warn!("Hourly broadcast failed: {}", e);
                    self.retry.delay_for(0)
                }
                Err(_) => {
                    warn!("Hourly broadcast panicked");
                    self.retry.delay_for(0)
                }
            };
            if self.sleep_unless_shutdown(delay).await {
                break;
            }
        }
    }

    async fn broadcast_once(&self) -> anyhow::Result<()> {
        let now = Utc::now().with_timezone(&self.tz);
        self.channel.send_text(pick_image()).await?;
        info!(at = %now.format("%H:%M"), "Sent hourly broadcast");
        Ok(())
    }

    /// Sleep for `duration`, returning true early if shutdown begins.
    async fn sleep_unless_shutdown(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.lifecycle.shutdown_requested() => true,
        }
    }
}
