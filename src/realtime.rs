//! In-process change-notification bus.
//!
//! One broadcast channel per case, created lazily on first subscriber and
//! pruned once the last receiver is gone. Subscribers hold a plain
//! `broadcast::Receiver`, so a dropped SSE connection releases its slot
//! without any explicit teardown call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseEvent {
    MessageCreated { case_id: Uuid, message_id: Uuid },
}

#[derive(Clone, Default)]
pub struct CaseEvents {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<CaseEvent>>>>,
}

impl CaseEvents {
    pub fn subscribe(&self, case_id: Uuid) -> broadcast::Receiver<CaseEvent> {
        let mut channels = self.channels.lock().expect("case events lock poisoned");
        channels
            .entry(case_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Best effort: publishing to a case nobody is watching is a no-op, and
    /// a channel whose last receiver disconnected is dropped here.
    pub fn publish(&self, case_id: Uuid, event: CaseEvent) {
        let mut channels = self.channels.lock().expect("case events lock poisoned");
        if let Some(sender) = channels.get(&case_id) {
            if sender.send(event).is_err() {
                channels.remove(&case_id);
            }
        }
    }

    pub fn active_channels(&self) -> usize {
        self.channels
            .lock()
            .expect("case events lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_to_case_subscribers() {
        let events = CaseEvents::default();
        let case_id = Uuid::new_v4();
        let message_id = Uuid::new_v4();

        let mut rx = events.subscribe(case_id);
        events.publish(
            case_id,
            CaseEvent::MessageCreated {
                case_id,
                message_id,
            },
        );

        match rx.recv().await.unwrap() {
            CaseEvent::MessageCreated {
                case_id: got_case,
                message_id: got_message,
            } => {
                assert_eq!(got_case, case_id);
                assert_eq!(got_message, message_id);
            }
        }
    }

    #[tokio::test]
    async fn other_cases_do_not_cross_talk() {
        let events = CaseEvents::default();
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut rx = events.subscribe(watched);
        events.publish(
            other,
            CaseEvent::MessageCreated {
                case_id: other,
                message_id: Uuid::new_v4(),
            },
        );

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn prunes_channel_after_last_subscriber_drops() {
        let events = CaseEvents::default();
        let case_id = Uuid::new_v4();

        let rx = events.subscribe(case_id);
        assert_eq!(events.active_channels(), 1);
        drop(rx);

        events.publish(
            case_id,
            CaseEvent::MessageCreated {
                case_id,
                message_id: Uuid::new_v4(),
            },
        );
        assert_eq!(events.active_channels(), 0);
    }
}
