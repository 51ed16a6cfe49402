//! The outer 32-bit verb enum carried in every post-handshake command frame.
//! See spec.md §4.4. The extended-API path additionally carries a full
//! 16-byte [`crate::ids::VerbId`] inside the body (spec.md §9, "mixed
//! request id shapes").

/// `req_id` as carried on the wire (`u32` big-endian). `0` is reserved for
/// the handshake request/response pair and never appears in the command
/// loop.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum RequestId {
	Handshake = 0,
	LatestBlockIdGet = 1,
	BlockIdByHeightGet = 2,
	BlockGet = 3,
	BlockNextIdGet = 4,
	BlockPrevIdGet = 5,
	TransactionGet = 6,
	TransactionNextIdGet = 7,
	TransactionPrevIdGet = 8,
	TransactionBlockIdGet = 9,
	TransactionSubmit = 10,
	ArtifactFirstTxnIdGet = 11,
	ArtifactLastTxnIdGet = 12,
	StatusGet = 13,
	Close = 14,
	AssertLatestBlockId = 15,
	AssertLatestBlockIdCancel = 16,
	ExtendedApiEnable = 17,
	ExtendedApiSendRecv = 18,
	ExtendedApiSendResp = 19,
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized request id {0}")]
pub struct UnknownRequestId(pub u32);

impl TryFrom<u32> for RequestId {
	type Error = UnknownRequestId;

	fn try_from(value: u32) -> Result<Self, Self::Error> {
		use RequestId::*;
		Ok(match value {
			0 => Handshake,
			1 => LatestBlockIdGet,
			2 => BlockIdByHeightGet,
			3 => BlockGet,
			4 => BlockNextIdGet,
			5 => BlockPrevIdGet,
			6 => TransactionGet,
			7 => TransactionNextIdGet,
			8 => TransactionPrevIdGet,
			9 => TransactionBlockIdGet,
			10 => TransactionSubmit,
			11 => ArtifactFirstTxnIdGet,
			12 => ArtifactLastTxnIdGet,
			13 => StatusGet,
			14 => Close,
			15 => AssertLatestBlockId,
			16 => AssertLatestBlockIdCancel,
			17 => ExtendedApiEnable,
			18 => ExtendedApiSendRecv,
			19 => ExtendedApiSendResp,
			other => return Err(UnknownRequestId(other)),
		})
	}
}

impl From<RequestId> for u32 {
	fn from(value: RequestId) -> Self {
		value as u32
	}
}

/// Well-known verb UUIDs used as capability objects and as the extended-API
/// verb namespace. Unlike [`RequestId`], these are full 16-byte ids so that
/// application servers registered via extended-API can mint their own.
pub mod verb_uuid {
	use crate::ids::VerbId;
	use uuid::Uuid;

	macro_rules! fixed_verb {
		($name:ident, $uuid:literal) => {
			pub fn $name() -> VerbId {
				VerbId::from(Uuid::parse_str($uuid).expect("valid literal uuid"))
			}
		};
	}

	fixed_verb!(latest_block_id_get, "6a936e9a-df06-4c2e-8e8a-000000000001");
	fixed_verb!(block_id_by_height_get, "6a936e9a-df06-4c2e-8e8a-000000000002");
	fixed_verb!(block_get, "6a936e9a-df06-4c2e-8e8a-000000000003");
	fixed_verb!(block_next_id_get, "6a936e9a-df06-4c2e-8e8a-000000000004");
	fixed_verb!(block_prev_id_get, "6a936e9a-df06-4c2e-8e8a-000000000005");
	fixed_verb!(transaction_get, "6a936e9a-df06-4c2e-8e8a-000000000006");
	fixed_verb!(transaction_next_id_get, "6a936e9a-df06-4c2e-8e8a-000000000007");
	fixed_verb!(transaction_prev_id_get, "6a936e9a-df06-4c2e-8e8a-000000000008");
	fixed_verb!(transaction_block_id_get, "6a936e9a-df06-4c2e-8e8a-000000000009");
	fixed_verb!(transaction_submit, "6a936e9a-df06-4c2e-8e8a-00000000000a");
	fixed_verb!(artifact_first_txn_id_get, "6a936e9a-df06-4c2e-8e8a-00000000000b");
	fixed_verb!(artifact_last_txn_id_get, "6a936e9a-df06-4c2e-8e8a-00000000000c");
	fixed_verb!(status_get, "6a936e9a-df06-4c2e-8e8a-00000000000d");
	fixed_verb!(close, "6a936e9a-df06-4c2e-8e8a-00000000000e");
	fixed_verb!(assert_latest_block_id, "6a936e9a-df06-4c2e-8e8a-00000000000f");
	fixed_verb!(assert_latest_block_id_cancel, "6a936e9a-df06-4c2e-8e8a-000000000010");
	fixed_verb!(sentinel_extend_api_enable, "6a936e9a-df06-4c2e-8e8a-000000000011");
	fixed_verb!(extended_api_enable, "6a936e9a-df06-4c2e-8e8a-000000000012");
	fixed_verb!(extended_api_send, "6a936e9a-df06-4c2e-8e8a-000000000013");
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn roundtrips() {
		for raw in 0..=19u32 {
			let id = RequestId::try_from(raw).unwrap();
			assert_eq!(u32::from(id), raw);
		}
		assert!(RequestId::try_from(20).is_err());
	}
}
