use async_trait::async_trait;
use dabloons_core::{DeliveryError, Notifier, ServerMessage, UserId};
use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// How long a private message may wait on a full connection before the
/// recipient counts as unreachable.
const PRIVATE_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Live connections, keyed by the chat user bound to each.
///
/// This is the server's side of [`Notifier`]: the public channel is every
/// connected user, and a private message goes down one user's socket.
#[derive(Default)]
pub struct Hub {
    connections: DashMap<UserId, mpsc::Sender<ServerMessage>>,
}

impl Hub {
    /// Binds `user` to a connection, replacing any older one.
    pub fn register(&self, user: UserId, sender: mpsc::Sender<ServerMessage>) {
        if self.connections.insert(user, sender).is_some() {
            warn!(user, "user reconnected; dropping the old connection");
        }
    }

    /// Unbinds `user`, unless the entry already belongs to a newer connection.
    pub fn unregister(&self, user: UserId, sender: &mpsc::Sender<ServerMessage>) {
        self.connections.remove_if(&user, |_, current| current.same_channel(sender));
    }

    pub fn is_connected(&self, user: UserId) -> bool {
        self.connections.contains_key(&user)
    }
}

#[async_trait]
impl Notifier for Hub {
    /// Never waits: a connection whose buffer is full misses the message.
    async fn post_public(&self, message: ServerMessage) {
        for entry in self.connections.iter() {
            match entry.value().try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!(user = *entry.key(), "connection is backed up, dropping public message"),
                Err(TrySendError::Closed(_)) => warn!(user = *entry.key(), "failed to post to user (disconnected?)"),
            }
        }
    }

    async fn send_private(&self, user: UserId, message: ServerMessage) -> Result<(), DeliveryError> {
        let sender = self.connections.get(&user).map(|e| e.value().clone()).ok_or(DeliveryError(user))?;
        match tokio::time::timeout(PRIVATE_SEND_TIMEOUT, sender.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError(user)),
            Err(_) => {
                warn!(user, "connection stayed full, private message not delivered");
                Err(DeliveryError(user))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_private_needs_a_live_connection() {
        let hub = Hub::default();
        assert_eq!(hub.send_private(1, ServerMessage::Info { message: "hi".into() }).await, Err(DeliveryError(1)));

        let (tx, mut rx) = mpsc::channel(4);
        hub.register(1, tx.clone());
        hub.send_private(1, ServerMessage::Info { message: "hi".into() }).await.unwrap();
        assert_eq!(rx.recv().await, Some(ServerMessage::Info { message: "hi".into() }));

        drop(rx);
        assert_eq!(hub.send_private(1, ServerMessage::Info { message: "gone".into() }).await, Err(DeliveryError(1)));

        hub.unregister(1, &tx);
        assert!(!hub.is_connected(1));
    }

    #[tokio::test]
    async fn test_public_reaches_everyone() {
        let hub = Hub::default();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        hub.register(1, tx1);
        hub.register(2, tx2);

        hub.post_public(ServerMessage::Info { message: "all".into() }).await;
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_backed_up_reader_does_not_stall_public_posts() {
        let hub = Hub::default();
        let (slow, mut slow_rx) = mpsc::channel(1);
        let (fast, mut fast_rx) = mpsc::channel(4);
        slow.try_send(ServerMessage::Info { message: "unread".into() }).unwrap();
        hub.register(1, slow);
        hub.register(2, fast);

        let posted = tokio::time::timeout(
            Duration::from_secs(1),
            hub.post_public(ServerMessage::Info { message: "all".into() }),
        )
        .await;
        assert!(posted.is_ok());
        assert_eq!(fast_rx.recv().await, Some(ServerMessage::Info { message: "all".into() }));

        // the slow reader only has what it had before
        assert_eq!(slow_rx.recv().await, Some(ServerMessage::Info { message: "unread".into() }));
        assert!(slow_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_connection_does_not_unregister_newer_one() {
        let hub = Hub::default();
        let (old, _old_rx) = mpsc::channel(4);
        let (new, _new_rx) = mpsc::channel(4);
        hub.register(1, old.clone());
        hub.register(1, new);

        hub.unregister(1, &old);
        assert!(hub.is_connected(1));
    }
}
