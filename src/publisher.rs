use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::BankAccount;

const EVENT_BUFFER: usize = 16;

/// Fan-out of bank account events to subscription resolvers.
///
/// Mutations publish every account they touch; each subscriber gets its own
/// receiver, optionally filtered down to a single account id.
pub struct BankAccountPublisher {
    event_tx: broadcast::Sender<BankAccount>,
}

impl Default for BankAccountPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl BankAccountPublisher {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { event_tx }
    }

    pub fn publish(&self, bank_account: BankAccount) {
        tracing::info!(id = %bank_account.id, "publishing bank account");
        // No subscribers is fine; the event just goes nowhere.
        let _ = self.event_tx.send(bank_account);
    }

    /// Subscribes to every published account event.
    pub fn subscribe(&self) -> AccountEvents {
        AccountEvents { event_rx: self.event_tx.subscribe(), only: None }
    }

    /// Subscribes to events for one account id.
    pub fn subscribe_to(&self, id: Uuid) -> AccountEvents {
        AccountEvents { event_rx: self.event_tx.subscribe(), only: Some(id) }
    }
}

/// One subscriber's view of the event stream.
pub struct AccountEvents {
    event_rx: broadcast::Receiver<BankAccount>,
    only: Option<Uuid>,
}

impl AccountEvents {
    /// Next matching event, or `None` once the publisher is gone. A slow
    /// subscriber that misses events skips the gap and keeps going.
    pub async fn recv(&mut self) -> Option<BankAccount> {
        loop {
            match self.event_rx.recv().await {
                Ok(account) => match self.only {
                    Some(id) if account.id != id => continue,
                    _ => {
                        tracing::debug!(id = %account.id, "delivering subscription event");
                        return Some(account);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged behind the event stream");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
