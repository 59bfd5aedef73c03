use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::platform::{FormatMode, MessageSender};

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans a message out to every allow-listed user, one send at a time.
pub struct Broadcaster {
    sender: Arc<dyn MessageSender>,
    recipients: Vec<u64>,
    delay: Duration,
}

impl Broadcaster {
    pub fn new(sender: Arc<dyn MessageSender>, recipients: Vec<u64>, delay: Duration) -> Self {
        Self {
            sender,
            recipients,
            delay,
        }
    }

    /// Send `text` to each recipient in order. A failed send is logged and
    /// the loop moves on, so delivery may be partial.
    pub async fn broadcast(&self, text: &str, mode: FormatMode) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        if self.recipients.is_empty() {
            warn!("No allowed user IDs configured for broadcast.");
            return report;
        }

        info!(
            "Broadcasting message to {} authorized users",
            self.recipients.len()
        );

        for (i, &user_id) in self.recipients.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.delay).await;
            }

            match self.sender.send_message(user_id as i64, text, mode).await {
                Ok(()) => {
                    debug!("Broadcast delivered to user {}", user_id);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to send broadcast message to user ID {}: {:#}",
                        user_id, e
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSender;
    use std::time::Instant;

    #[tokio::test]
    async fn test_one_send_per_recipient_in_order() {
        let sender = Arc::new(RecordingSender::new());
        let broadcaster = Broadcaster::new(sender.clone(), vec![111, 222, 333], Duration::ZERO);

        let report = broadcaster.broadcast("pump on", FormatMode::Plain).await;

        assert_eq!(report, BroadcastReport { delivered: 3, failed: 0 });
        let sent = sender.sent();
        let chats: Vec<i64> = sent.iter().map(|m| m.chat_id).collect();
        assert_eq!(chats, vec![111, 222, 333]);
        assert!(sent.iter().all(|m| m.text == "pump on"));
        assert!(sent.iter().all(|m| m.mode == FormatMode::Plain));
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_the_loop() {
        let sender = Arc::new(RecordingSender::failing_for(&[222]));
        let broadcaster = Broadcaster::new(sender.clone(), vec![111, 222, 333], Duration::ZERO);

        let report = broadcaster.broadcast("hi", FormatMode::default()).await;

        assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
        assert_eq!(sender.attempts(), vec![111, 222, 333]);
        let delivered: Vec<i64> = sender.sent().iter().map(|m| m.chat_id).collect();
        assert_eq!(delivered, vec![111, 333]);
    }

    #[tokio::test]
    async fn test_empty_allow_list_sends_nothing() {
        let sender = Arc::new(RecordingSender::new());
        let broadcaster = Broadcaster::new(sender.clone(), vec![], Duration::ZERO);

        let report = broadcaster.broadcast("hi", FormatMode::default()).await;

        assert_eq!(report, BroadcastReport::default());
        assert!(sender.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_sends_are_paced() {
        let sender = Arc::new(RecordingSender::new());
        let delay = Duration::from_millis(20);
        let broadcaster = Broadcaster::new(sender.clone(), vec![1, 2, 3], delay);

        let started = Instant::now();
        broadcaster.broadcast("hi", FormatMode::default()).await;

        assert!(started.elapsed() >= delay * 2);
        assert_eq!(sender.sent().len(), 3);
    }
}
