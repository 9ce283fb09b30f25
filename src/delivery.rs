//! Delivery fan-out.
//!
//! Persist first, push second: the store row is the durable record, the push
//! is best-effort signaling to whoever happens to be connected. A missed push
//! is recovered by the pull API; a missed persist means the candidate was not
//! delivered at all and the condition fires again next tick.

use tokio::sync::broadcast;

use crate::store::{ReminderStore, StoreError};
use crate::types::{Audience, Notification, ReminderCandidate};

/// Buffered notifications per audience channel before slow receivers lag.
const CHANNEL_CAPACITY: usize = 64;

/// Per-audience broadcast channels for live push.
pub struct DeliveryHub {
    admin: broadcast::Sender<Notification>,
    staff: broadcast::Sender<Notification>,
}

impl DeliveryHub {
    pub fn new() -> Self {
        let (admin, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (staff, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { admin, staff }
    }

    /// Subscribe to one audience's live notifications.
    pub fn subscribe(&self, audience: Audience) -> broadcast::Receiver<Notification> {
        self.sender(audience).subscribe()
    }

    /// Push a stored notification to its audience. Returns the number of
    /// live subscribers reached; zero subscribers is not an error.
    pub fn publish(&self, notification: &Notification) -> usize {
        match self.sender(notification.audience).send(notification.clone()) {
            Ok(receivers) => receivers,
            Err(_) => {
                log::debug!(
                    "No live {} subscribers for '{}'",
                    notification.audience.as_str(),
                    notification.title
                );
                0
            }
        }
    }

    fn sender(&self, audience: Audience) -> &broadcast::Sender<Notification> {
        match audience {
            Audience::Admin => &self.admin,
            Audience::Staff => &self.staff,
        }
    }
}

impl Default for DeliveryHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver an admitted candidate: append to the store, then push the stored
/// notification. If the append fails nothing is pushed and the error
/// propagates to the caller.
pub async fn deliver(
    store: &dyn ReminderStore,
    hub: &DeliveryHub,
    candidate: &ReminderCandidate,
) -> Result<Notification, StoreError> {
    let notification = store.append(candidate).await?;
    hub.publish(&notification);
    log::info!(
        "Notified {}: {} ({})",
        notification.audience.as_str(),
        notification.title,
        notification.subject_key
    );
    Ok(notification)
}
