//! The ledger entities served by the data service: blocks, transactions, and
//! the artifacts transactions act upon. These are internal to vaultd-core —
//! the wire format only ever carries their opaque certificate bytes plus the
//! ids needed for traversal (spec.md §5).

use bytes::Bytes;
use uuid::Uuid;

pub type BlockId = Uuid;
pub type TransactionId = Uuid;
pub type ArtifactId = Uuid;

/// `Uuid::nil()`/`Uuid::max()` double as "before the beginning"/"past the
/// end" traversal sentinels, matching [`vaultd_wire::EntityId::NIL`]/`MAX`.
pub const ID_NIL: Uuid = Uuid::nil();
pub const ID_MAX: Uuid = Uuid::max();

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Block {
	pub id: BlockId,
	pub height: u64,
	pub prev_block_id: BlockId,
	pub next_block_id: BlockId,
	pub transaction_ids: Vec<TransactionId>,
	pub certificate: Bytes,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TransactionState {
	Pending,
	Committed,
	Canceled,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Transaction {
	pub id: TransactionId,
	pub artifact_id: ArtifactId,
	pub block_id: Option<BlockId>,
	pub prev_txn_id: TransactionId,
	pub next_txn_id: TransactionId,
	pub state: TransactionState,
	pub certificate: Bytes,
}

/// Snapshot returned by `STATUS_GET`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServiceStatus {
	pub latest_block_id: BlockId,
	pub latest_block_height: u64,
}
