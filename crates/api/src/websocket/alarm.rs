//! Background sweeper delivering due chat expiry alarms

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::registry::RoomRegistry;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll the store for due alarms every `interval` and route them to their rooms
pub fn spawn_alarm_sweeper(registry: RoomRegistry, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_ms = interval.as_millis() as u64, "Chat alarm sweeper started");

        loop {
            ticker.tick().await;
            match registry.fire_due_alarms().await {
                Ok(0) => {}
                Ok(fired) => tracing::debug!(rooms = fired, "Chat alarms delivered"),
                Err(e) => tracing::error!(error = %e, "Failed to poll chat alarms"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{message_key, ChatStore, MemoryChatStore};
    use crate::websocket::RoomSettings;
    use huntroom_shared::{ChatMessage, ManualClock};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_due_logs() {
        let store = Arc::new(MemoryChatStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let registry = RoomRegistry::new(store.clone(), clock.clone(), RoomSettings::default());

        let message = ChatMessage {
            text: "old".to_string(),
            name: "ada".to_string(),
            timestamp: 100,
        };
        store.append("p1", &message_key(100, 0, 0), &message).await.unwrap();
        store.append("p2", &message_key(100, 0, 0), &message).await.unwrap();
        store.set_alarm("p1", 500).await.unwrap();
        store.set_alarm("p2", 5_000).await.unwrap();

        let sweeper = spawn_alarm_sweeper(registry, Duration::from_secs(1));
        for _ in 0..50 {
            if store.load_log("p1").await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        sweeper.abort();

        assert!(store.load_log("p1").await.unwrap().is_empty());
        assert_eq!(store.alarm("p1").await.unwrap(), None);
        assert_eq!(store.load_log("p2").await.unwrap().len(), 1);
        assert_eq!(store.alarm("p2").await.unwrap(), Some(5_000));
    }
}
