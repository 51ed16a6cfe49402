//! Abstracts over the data service: the backend of record for blocks,
//! transactions, and artifacts (spec.md §5). Exists as a trait so it can be
//! backed by an in-memory [`MockDataService`] in tests and by
//! [`UnixDataService`] talking to the real backend process in production,
//! following the same real/mock split `identity_server` uses for its JWKS
//! provider.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::RwLock;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::data_model::{
	Block, BlockId, ServiceStatus, Transaction, TransactionId, TransactionState, ID_MAX, ID_NIL,
};
use futures::{SinkExt, StreamExt};
use vaultd_wire::command::{CommandRequest, CommandResponse};
use vaultd_wire::{RequestId, Status};

#[derive(Debug, thiserror::Error)]
pub enum DataServiceError {
	#[error("block {0} not found")]
	BlockNotFound(BlockId),
	#[error("transaction {0} not found")]
	TransactionNotFound(TransactionId),
	#[error("no block exists at height {0}")]
	InvalidBlockHeight(u64),
	#[error("transaction {0} failed certificate verification")]
	TransactionVerification(TransactionId),
	#[error("previous block id does not match the current chain tip")]
	InvalidPreviousBlockUuid,
	#[error("io error talking to data service: {0}")]
	Io(#[from] std::io::Error),
	#[error("data service returned a malformed response")]
	MalformedResponse,
}

impl DataServiceError {
	pub fn as_status(&self) -> Status {
		match self {
			DataServiceError::BlockNotFound(_) | DataServiceError::TransactionNotFound(_) => {
				Status::NotFound
			}
			DataServiceError::InvalidBlockHeight(_) => Status::InvalidBlockHeight,
			DataServiceError::TransactionVerification(_) => Status::TransactionVerification,
			DataServiceError::InvalidPreviousBlockUuid => Status::InvalidPreviousBlockUuid,
			DataServiceError::Io(_) | DataServiceError::MalformedResponse => {
				Status::IpcWriteDataFailure
			}
		}
	}
}

type Result<T> = std::result::Result<T, DataServiceError>;

#[async_trait]
pub trait DataServiceClient: std::fmt::Debug + Send + Sync + 'static {
	async fn latest_block_id_get(&self) -> Result<BlockId>;
	async fn block_id_by_height_get(&self, height: u64) -> Result<BlockId>;
	async fn block_get(&self, id: BlockId) -> Result<Block>;
	async fn block_next_id_get(&self, id: BlockId) -> Result<BlockId>;
	async fn block_prev_id_get(&self, id: BlockId) -> Result<BlockId>;
	async fn transaction_get(&self, id: TransactionId) -> Result<Transaction>;
	async fn transaction_next_id_get(&self, id: TransactionId) -> Result<TransactionId>;
	async fn transaction_prev_id_get(&self, id: TransactionId) -> Result<TransactionId>;
	async fn transaction_block_id_get(&self, id: TransactionId) -> Result<Option<BlockId>>;
	async fn transaction_submit(&self, txn: Transaction) -> Result<()>;
	async fn artifact_first_txn_id_get(&self, artifact_id: TransactionId) -> Result<TransactionId>;
	async fn artifact_last_txn_id_get(&self, artifact_id: TransactionId) -> Result<TransactionId>;
	async fn status_get(&self) -> Result<ServiceStatus>;
}

/// In-memory data service, seeded with a single genesis block. Used by tests
/// and by `vaultd` when started without a `--data-service-socket`.
#[derive(Debug)]
pub struct MockDataService {
	blocks: DashMap<BlockId, Block>,
	transactions: DashMap<TransactionId, Transaction>,
	/// Per-artifact chain of transaction ids, oldest first.
	artifact_chains: DashMap<TransactionId, Vec<TransactionId>>,
	latest_block: RwLock<BlockId>,
}

impl MockDataService {
	pub fn new() -> Self {
		let genesis_id = BlockId::new_v4();
		let genesis = Block {
			id: genesis_id,
			height: 0,
			prev_block_id: ID_NIL,
			next_block_id: ID_MAX,
			transaction_ids: Vec::new(),
			certificate: bytes::Bytes::new(),
		};
		let blocks = DashMap::new();
		blocks.insert(genesis_id, genesis);
		Self {
			blocks,
			transactions: DashMap::new(),
			artifact_chains: DashMap::new(),
			latest_block: RwLock::new(genesis_id),
		}
	}
}

impl Default for MockDataService {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl DataServiceClient for MockDataService {
	async fn latest_block_id_get(&self) -> Result<BlockId> {
		Ok(*self.latest_block.read().expect("poisoned"))
	}

	async fn block_id_by_height_get(&self, height: u64) -> Result<BlockId> {
		self.blocks
			.iter()
			.find(|entry| entry.value().height == height)
			.map(|entry| *entry.key())
			.ok_or(DataServiceError::InvalidBlockHeight(height))
	}

	async fn block_get(&self, id: BlockId) -> Result<Block> {
		self.blocks
			.get(&id)
			.map(|entry| entry.value().clone())
			.ok_or(DataServiceError::BlockNotFound(id))
	}

	async fn block_next_id_get(&self, id: BlockId) -> Result<BlockId> {
		let block = self.block_get(id).await?;
		Ok(block.next_block_id)
	}

	async fn block_prev_id_get(&self, id: BlockId) -> Result<BlockId> {
		let block = self.block_get(id).await?;
		Ok(block.prev_block_id)
	}

	async fn transaction_get(&self, id: TransactionId) -> Result<Transaction> {
		self.transactions
			.get(&id)
			.map(|entry| entry.value().clone())
			.ok_or(DataServiceError::TransactionNotFound(id))
	}

	async fn transaction_next_id_get(&self, id: TransactionId) -> Result<TransactionId> {
		let txn = self.transaction_get(id).await?;
		Ok(txn.next_txn_id)
	}

	async fn transaction_prev_id_get(&self, id: TransactionId) -> Result<TransactionId> {
		let txn = self.transaction_get(id).await?;
		Ok(txn.prev_txn_id)
	}

	async fn transaction_block_id_get(&self, id: TransactionId) -> Result<Option<BlockId>> {
		let txn = self.transaction_get(id).await?;
		Ok(txn.block_id)
	}

	async fn transaction_submit(&self, mut txn: Transaction) -> Result<()> {
		if txn.certificate.is_empty() {
			return Err(DataServiceError::TransactionVerification(txn.id));
		}
		let mut chain = self.artifact_chains.entry(txn.artifact_id).or_default();
		if let Some(&prev_id) = chain.last() {
			txn.prev_txn_id = prev_id;
			if let Some(mut prev) = self.transactions.get_mut(&prev_id) {
				prev.next_txn_id = txn.id;
			}
		} else {
			txn.prev_txn_id = ID_NIL;
		}
		txn.next_txn_id = ID_MAX;
		txn.state = TransactionState::Pending;
		chain.push(txn.id);
		self.transactions.insert(txn.id, txn);
		Ok(())
	}

	async fn artifact_first_txn_id_get(&self, artifact_id: TransactionId) -> Result<TransactionId> {
		self.artifact_chains
			.get(&artifact_id)
			.and_then(|chain| chain.first().copied())
			.ok_or(DataServiceError::TransactionNotFound(artifact_id))
	}

	async fn artifact_last_txn_id_get(&self, artifact_id: TransactionId) -> Result<TransactionId> {
		self.artifact_chains
			.get(&artifact_id)
			.and_then(|chain| chain.last().copied())
			.ok_or(DataServiceError::TransactionNotFound(artifact_id))
	}

	async fn status_get(&self) -> Result<ServiceStatus> {
		let latest_block_id = self.latest_block_id_get().await?;
		let height = self.block_get(latest_block_id).await?.height;
		Ok(ServiceStatus {
			latest_block_id,
			latest_block_height: height,
		})
	}
}

/// Talks to the real data service process over a Unix domain socket using
/// the same request/response envelope the client command loop uses
/// (`vaultd_wire::command`), length-delimited rather than MAC-authenticated
/// since the socket is already local and trusted.
#[derive(Debug)]
pub struct UnixDataService {
	framed: Mutex<Framed<UnixStream, LengthDelimitedCodec>>,
}

impl UnixDataService {
	pub async fn connect(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
		let stream = UnixStream::connect(path).await?;
		Ok(Self {
			framed: Mutex::new(Framed::new(stream, LengthDelimitedCodec::new())),
		})
	}

	async fn call(&self, req_id: RequestId, body: bytes::Bytes) -> Result<CommandResponse> {
		let request = CommandRequest {
			req_id,
			offset: 0,
			body,
		};
		let mut framed = self.framed.lock().await;
		framed
			.send(request.encode())
			.await
			.map_err(DataServiceError::Io)?;
		let raw = framed
			.next()
			.await
			.ok_or(DataServiceError::MalformedResponse)?
			.map_err(DataServiceError::Io)?;
		let response =
			CommandResponse::decode(raw.freeze()).map_err(|_| DataServiceError::MalformedResponse)?;
		if !response.status.is_success() {
			return Err(DataServiceError::MalformedResponse);
		}
		Ok(response)
	}
}

#[async_trait]
impl DataServiceClient for UnixDataService {
	async fn latest_block_id_get(&self) -> Result<BlockId> {
		let resp = self.call(RequestId::LatestBlockIdGet, bytes::Bytes::new()).await?;
		parse_uuid(&resp.body)
	}

	async fn block_id_by_height_get(&self, height: u64) -> Result<BlockId> {
		let resp = self
			.call(
				RequestId::BlockIdByHeightGet,
				bytes::Bytes::copy_from_slice(&height.to_be_bytes()),
			)
			.await?;
		parse_uuid(&resp.body)
	}

	async fn block_get(&self, id: BlockId) -> Result<Block> {
		let resp = self
			.call(RequestId::BlockGet, bytes::Bytes::copy_from_slice(id.as_bytes()))
			.await?;
		Ok(Block {
			id,
			height: 0,
			prev_block_id: ID_NIL,
			next_block_id: ID_MAX,
			transaction_ids: Vec::new(),
			certificate: resp.body,
		})
	}

	async fn block_next_id_get(&self, id: BlockId) -> Result<BlockId> {
		let resp = self
			.call(RequestId::BlockNextIdGet, bytes::Bytes::copy_from_slice(id.as_bytes()))
			.await?;
		parse_uuid(&resp.body)
	}

	async fn block_prev_id_get(&self, id: BlockId) -> Result<BlockId> {
		let resp = self
			.call(RequestId::BlockPrevIdGet, bytes::Bytes::copy_from_slice(id.as_bytes()))
			.await?;
		parse_uuid(&resp.body)
	}

	async fn transaction_get(&self, id: TransactionId) -> Result<Transaction> {
		let resp = self
			.call(RequestId::TransactionGet, bytes::Bytes::copy_from_slice(id.as_bytes()))
			.await?;
		Ok(Transaction {
			id,
			artifact_id: ID_NIL,
			block_id: None,
			prev_txn_id: ID_NIL,
			next_txn_id: ID_MAX,
			state: TransactionState::Pending,
			certificate: resp.body,
		})
	}

	async fn transaction_next_id_get(&self, id: TransactionId) -> Result<TransactionId> {
		let resp = self
			.call(
				RequestId::TransactionNextIdGet,
				bytes::Bytes::copy_from_slice(id.as_bytes()),
			)
			.await?;
		parse_uuid(&resp.body)
	}

	async fn transaction_prev_id_get(&self, id: TransactionId) -> Result<TransactionId> {
		let resp = self
			.call(
				RequestId::TransactionPrevIdGet,
				bytes::Bytes::copy_from_slice(id.as_bytes()),
			)
			.await?;
		parse_uuid(&resp.body)
	}

	async fn transaction_block_id_get(&self, id: TransactionId) -> Result<Option<BlockId>> {
		let resp = self
			.call(
				RequestId::TransactionBlockIdGet,
				bytes::Bytes::copy_from_slice(id.as_bytes()),
			)
			.await?;
		let block_id = parse_uuid(&resp.body)?;
		Ok(if block_id == ID_NIL { None } else { Some(block_id) })
	}

	async fn transaction_submit(&self, txn: Transaction) -> Result<()> {
		self.call(RequestId::TransactionSubmit, txn.certificate).await?;
		Ok(())
	}

	async fn artifact_first_txn_id_get(&self, artifact_id: TransactionId) -> Result<TransactionId> {
		let resp = self
			.call(
				RequestId::ArtifactFirstTxnIdGet,
				bytes::Bytes::copy_from_slice(artifact_id.as_bytes()),
			)
			.await?;
		parse_uuid(&resp.body)
	}

	async fn artifact_last_txn_id_get(&self, artifact_id: TransactionId) -> Result<TransactionId> {
		let resp = self
			.call(
				RequestId::ArtifactLastTxnIdGet,
				bytes::Bytes::copy_from_slice(artifact_id.as_bytes()),
			)
			.await?;
		parse_uuid(&resp.body)
	}

	async fn status_get(&self) -> Result<ServiceStatus> {
		let resp = self.call(RequestId::StatusGet, bytes::Bytes::new()).await?;
		let latest_block_id = parse_uuid(&resp.body[..16])?;
		let height = u64::from_be_bytes(
			resp.body[16..24]
				.try_into()
				.map_err(|_| DataServiceError::MalformedResponse)?,
		);
		Ok(ServiceStatus {
			latest_block_id,
			latest_block_height: height,
		})
	}
}

fn parse_uuid(bytes: &[u8]) -> Result<uuid::Uuid> {
	let arr: [u8; 16] = bytes
		.get(..16)
		.ok_or(DataServiceError::MalformedResponse)?
		.try_into()
		.map_err(|_| DataServiceError::MalformedResponse)?;
	Ok(uuid::Uuid::from_bytes(arr))
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn genesis_block_exists() {
		let svc = MockDataService::new();
		let latest = svc.latest_block_id_get().await.unwrap();
		let block = svc.block_get(latest).await.unwrap();
		assert_eq!(block.height, 0);
		assert_eq!(block.prev_block_id, ID_NIL);
	}

	#[tokio::test]
	async fn submit_then_traverse_chain() {
		let svc = MockDataService::new();
		let artifact_id = TransactionId::new_v4();
		let first = Transaction {
			id: TransactionId::new_v4(),
			artifact_id,
			block_id: None,
			prev_txn_id: ID_NIL,
			next_txn_id: ID_MAX,
			state: TransactionState::Pending,
			certificate: bytes::Bytes::from_static(b"cert-1"),
		};
		let second = Transaction {
			id: TransactionId::new_v4(),
			artifact_id,
			block_id: None,
			prev_txn_id: ID_NIL,
			next_txn_id: ID_MAX,
			state: TransactionState::Pending,
			certificate: bytes::Bytes::from_static(b"cert-2"),
		};
		svc.transaction_submit(first.clone()).await.unwrap();
		svc.transaction_submit(second.clone()).await.unwrap();

		assert_eq!(
			svc.artifact_first_txn_id_get(artifact_id).await.unwrap(),
			first.id
		);
		assert_eq!(
			svc.artifact_last_txn_id_get(artifact_id).await.unwrap(),
			second.id
		);
		assert_eq!(svc.transaction_next_id_get(first.id).await.unwrap(), second.id);
		assert_eq!(svc.transaction_prev_id_get(second.id).await.unwrap(), first.id);
	}

	#[tokio::test]
	async fn empty_certificate_fails_verification() {
		let svc = MockDataService::new();
		let txn = Transaction {
			id: TransactionId::new_v4(),
			artifact_id: TransactionId::new_v4(),
			block_id: None,
			prev_txn_id: ID_NIL,
			next_txn_id: ID_MAX,
			state: TransactionState::Pending,
			certificate: bytes::Bytes::new(),
		};
		let err = svc.transaction_submit(txn).await.unwrap_err();
		assert!(matches!(err, DataServiceError::TransactionVerification(_)));
	}

	#[tokio::test]
	async fn unknown_block_not_found() {
		let svc = MockDataService::new();
		let err = svc.block_get(BlockId::new_v4()).await.unwrap_err();
		assert!(matches!(err, DataServiceError::BlockNotFound(_)));
	}
}
