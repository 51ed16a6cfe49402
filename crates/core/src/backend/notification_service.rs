//! Abstracts over the notification service, which fans out block-commit and
//! transaction-status events to subscribed connections (spec.md §4.6,
//! `ASSERT_LATEST_BLOCK_ID` / `ASSERT_LATEST_BLOCK_ID_CANCEL`).

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::data_model::BlockId;

#[derive(Debug, thiserror::Error)]
pub enum NotificationServiceError {
	#[error("io error talking to notification service: {0}")]
	Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, NotificationServiceError>;

/// Emitted whenever the chain tip advances.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LatestBlockIdUpdate {
	pub block_id: BlockId,
	pub height: u64,
}

#[async_trait]
pub trait NotificationServiceClient: std::fmt::Debug + Send + Sync + 'static {
	/// Subscribes to chain-tip updates. A connection holds the returned
	/// receiver only while it has an outstanding `ASSERT_LATEST_BLOCK_ID`
	/// request; dropping it is how `ASSERT_LATEST_BLOCK_ID_CANCEL` works.
	fn subscribe(&self) -> broadcast::Receiver<LatestBlockIdUpdate>;

	/// Announces a new chain tip. Called by whatever drives block commit
	/// (outside the scope of a single connection).
	async fn publish(&self, update: LatestBlockIdUpdate) -> Result<()>;
}

/// In-process notification bus backed by a broadcast channel. Used by tests
/// and by `vaultd` when no external notification service is configured.
#[derive(Debug)]
pub struct MockNotificationService {
	tx: broadcast::Sender<LatestBlockIdUpdate>,
}

impl MockNotificationService {
	pub fn new() -> Self {
		let (tx, _rx) = broadcast::channel(64);
		Self { tx }
	}
}

impl Default for MockNotificationService {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl NotificationServiceClient for MockNotificationService {
	fn subscribe(&self) -> broadcast::Receiver<LatestBlockIdUpdate> {
		self.tx.subscribe()
	}

	async fn publish(&self, update: LatestBlockIdUpdate) -> Result<()> {
		// No receivers is not an error: nobody has an outstanding assertion yet.
		let _ = self.tx.send(update);
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn subscriber_receives_published_update() {
		let svc = MockNotificationService::new();
		let mut rx = svc.subscribe();
		let update = LatestBlockIdUpdate {
			block_id: BlockId::new_v4(),
			height: 5,
		};
		svc.publish(update).await.unwrap();
		assert_eq!(rx.recv().await.unwrap(), update);
	}

	#[tokio::test]
	async fn publish_with_no_subscribers_does_not_error() {
		let svc = MockNotificationService::new();
		let update = LatestBlockIdUpdate {
			block_id: BlockId::new_v4(),
			height: 1,
		};
		svc.publish(update).await.unwrap();
	}
}
