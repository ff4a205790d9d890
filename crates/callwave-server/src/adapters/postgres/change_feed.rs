//! Postgres LISTEN/NOTIFY change feed
//!
//! Row triggers (see migrations) publish JSON on `callwave_changes`; a
//! background listener fans them out on a broadcast channel.

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::broadcast;

use callwave::{ChangeFeed, DomainError, StoreChange};

const CHANNEL: &str = "callwave_changes";
const BUFFER: usize = 512;

pub struct PgChangeFeed {
    sender: broadcast::Sender<StoreChange>,
}

impl PgChangeFeed {
    /// Connect a listener and start forwarding notifications
    pub async fn start(pool: &PgPool) -> Result<Self, DomainError> {
        let mut listener = PgListener::connect_with(pool)
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;
        listener
            .listen(CHANNEL)
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;

        let (sender, _) = broadcast::channel(BUFFER);
        let forward = sender.clone();

        tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<StoreChange>(notification.payload()) {
                            // No subscribers is fine
                            Ok(change) => {
                                let _ = forward.send(change);
                            }
                            Err(e) => tracing::warn!("⚠️  Malformed change notification: {}", e),
                        }
                    }
                    Err(e) => {
                        tracing::warn!("⚠️  Change listener error, retrying: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self { sender })
    }

    /// A feed that never emits (listener unavailable)
    pub fn disabled() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }
}

impl ChangeFeed for PgChangeFeed {
    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }
}
