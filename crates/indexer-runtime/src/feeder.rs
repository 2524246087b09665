//! # Notification Feeder
//!
//! Publishes notifications read as text lines, one per line:
//!
//! ```text
//! new_block {"blockNumber": 10}
//! revert_block {"blockNumber": 10}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. The payload is
//! passed through untouched; judging it is the dispatcher's job.

use shared_bus::{Notification, NotificationPublisher};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("Line {line:?} has no payload (expected \"<channel> <payload>\")")]
    MissingPayload { line: String },
}

/// Totals of one feeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub published: u64,
    pub skipped: u64,
}

/// Parse one input line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Notification>, FeedError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    match line.split_once(char::is_whitespace) {
        Some((channel, payload)) if !payload.trim().is_empty() => {
            Ok(Some(Notification::new(channel, payload.trim())))
        }
        _ => Err(FeedError::MissingPayload {
            line: line.to_string(),
        }),
    }
}

/// Publish every line of `reader` until end of input or shutdown.
pub async fn feed_notifications<R, P>(
    reader: R,
    publisher: &P,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<FeedSummary>
where
    R: AsyncBufRead + Unpin,
    P: NotificationPublisher + ?Sized,
{
    let mut lines = reader.lines();
    let mut summary = FeedSummary::default();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.changed() => {
                info!("[feeder] Shutdown signal received");
                break;
            }
        };
        let Some(line) = line else {
            info!(published = summary.published, "[feeder] End of input");
            break;
        };

        match parse_line(&line) {
            Ok(Some(notification)) => {
                let receivers = publisher.notify(notification).await;
                debug!(receivers, "Notification published");
                summary.published += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Skipping input line");
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}
