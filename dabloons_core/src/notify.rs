use crate::message::{Outbound, ServerMessage};
use crate::state::UserId;
use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not reach user {0}")]
pub struct DeliveryError(pub UserId);

/// The chat side of the casino.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Posts to the shared channel.
    async fn post_public(&self, message: ServerMessage);

    /// Sends to one user only. Hidden hands travel this way, so a failure
    /// here must be reported rather than swallowed.
    async fn send_private(&self, user: UserId, message: ServerMessage) -> Result<(), DeliveryError>;
}

/// Delivers a batch of outbound messages, logging private failures.
pub async fn deliver(notifier: &dyn Notifier, outbound: Vec<Outbound>) {
    for out in outbound {
        match out {
            Outbound::Public(message) => notifier.post_public(message).await,
            Outbound::Private(user, message) => {
                if let Err(err) = notifier.send_private(user, message).await {
                    warn!("{}", err);
                }
            }
        }
    }
}
