//! Bounds the number of data-service requests the instance has outstanding
//! at once. The original server tracked this with a fixed-size array of
//! child contexts (`MAX_CHILD_CONTEXTS` slots); a `tokio::sync::Semaphore`
//! gives the same backpressure without a hand-rolled slab allocator.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::backend::data_service::{DataServiceClient, DataServiceError};
use crate::data_model::{Block, BlockId, ServiceStatus, Transaction, TransactionId};
use vaultd_wire::MAX_CHILD_CONTEXTS;

type Result<T> = std::result::Result<T, DataServiceError>;

#[derive(Debug)]
pub struct BoundedDataService {
	inner: Arc<dyn DataServiceClient>,
	permits: Arc<Semaphore>,
}

impl BoundedDataService {
	pub fn new(inner: Arc<dyn DataServiceClient>) -> Self {
		Self {
			inner,
			permits: Arc::new(Semaphore::new(MAX_CHILD_CONTEXTS)),
		}
	}
}

#[async_trait]
impl DataServiceClient for BoundedDataService {
	async fn latest_block_id_get(&self) -> Result<BlockId> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.latest_block_id_get().await
	}

	async fn block_id_by_height_get(&self, height: u64) -> Result<BlockId> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.block_id_by_height_get(height).await
	}

	async fn block_get(&self, id: BlockId) -> Result<Block> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.block_get(id).await
	}

	async fn block_next_id_get(&self, id: BlockId) -> Result<BlockId> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.block_next_id_get(id).await
	}

	async fn block_prev_id_get(&self, id: BlockId) -> Result<BlockId> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.block_prev_id_get(id).await
	}

	async fn transaction_get(&self, id: TransactionId) -> Result<Transaction> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.transaction_get(id).await
	}

	async fn transaction_next_id_get(&self, id: TransactionId) -> Result<TransactionId> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.transaction_next_id_get(id).await
	}

	async fn transaction_prev_id_get(&self, id: TransactionId) -> Result<TransactionId> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.transaction_prev_id_get(id).await
	}

	async fn transaction_block_id_get(&self, id: TransactionId) -> Result<Option<BlockId>> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.transaction_block_id_get(id).await
	}

	async fn transaction_submit(&self, txn: Transaction) -> Result<()> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.transaction_submit(txn).await
	}

	async fn artifact_first_txn_id_get(&self, artifact_id: TransactionId) -> Result<TransactionId> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.artifact_first_txn_id_get(artifact_id).await
	}

	async fn artifact_last_txn_id_get(&self, artifact_id: TransactionId) -> Result<TransactionId> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.artifact_last_txn_id_get(artifact_id).await
	}

	async fn status_get(&self) -> Result<ServiceStatus> {
		let _permit = self.permits.acquire().await.expect("semaphore never closed");
		self.inner.status_get().await
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backend::data_service::MockDataService;
	use futures::future::join_all;

	#[tokio::test]
	async fn delegates_to_inner_service() {
		let bounded = BoundedDataService::new(Arc::new(MockDataService::new()));
		let latest = bounded.latest_block_id_get().await.unwrap();
		let block = bounded.block_get(latest).await.unwrap();
		assert_eq!(block.height, 0);
	}

	#[tokio::test]
	async fn many_concurrent_calls_all_complete() {
		let bounded = Arc::new(BoundedDataService::new(Arc::new(MockDataService::new())));
		let calls = (0..64).map(|_| {
			let bounded = Arc::clone(&bounded);
			async move { bounded.latest_block_id_get().await }
		});
		let results = join_all(calls).await;
		assert!(results.into_iter().all(|r| r.is_ok()));
	}
}
