//! Status codes carried in response frames. See spec.md §7.

/// The `status` field of every client-facing and control-channel response.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u32)]
pub enum Status {
	Success = 0,
	MalformedRequest = 1,
	RequestPacketInvalidSize = 2,
	RequestPacketBad = 3,
	Unauthorized = 4,
	NotFound = 5,
	WouldTruncate = 6,
	OutOfMemory = 7,
	PrivateKeyAlreadySet = 8,
	TransactionVerification = 9,
	InvalidBlockHeight = 10,
	InvalidPreviousBlockUuid = 11,
	InvalidBlockUuid = 12,
	ExtendedApiUnknownEntity = 13,
	IpcWriteDataFailure = 14,
	DuplicateEntity = 15,
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized status code {0}")]
pub struct UnknownStatus(pub u32);

impl TryFrom<u32> for Status {
	type Error = UnknownStatus;

	fn try_from(value: u32) -> Result<Self, Self::Error> {
		use Status::*;
		Ok(match value {
			0 => Success,
			1 => MalformedRequest,
			2 => RequestPacketInvalidSize,
			3 => RequestPacketBad,
			4 => Unauthorized,
			5 => NotFound,
			6 => WouldTruncate,
			7 => OutOfMemory,
			8 => PrivateKeyAlreadySet,
			9 => TransactionVerification,
			10 => InvalidBlockHeight,
			11 => InvalidPreviousBlockUuid,
			12 => InvalidBlockUuid,
			13 => ExtendedApiUnknownEntity,
			14 => IpcWriteDataFailure,
			15 => DuplicateEntity,
			other => return Err(UnknownStatus(other)),
		})
	}
}

impl From<Status> for u32 {
	fn from(value: Status) -> Self {
		value as u32
	}
}

impl Status {
	pub fn is_success(&self) -> bool {
		matches!(self, Status::Success)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn roundtrips_all_variants() {
		let variants = [
			Status::Success,
			Status::MalformedRequest,
			Status::RequestPacketInvalidSize,
			Status::RequestPacketBad,
			Status::Unauthorized,
			Status::NotFound,
			Status::WouldTruncate,
			Status::OutOfMemory,
			Status::PrivateKeyAlreadySet,
			Status::TransactionVerification,
			Status::InvalidBlockHeight,
			Status::InvalidPreviousBlockUuid,
			Status::InvalidBlockUuid,
			Status::ExtendedApiUnknownEntity,
			Status::IpcWriteDataFailure,
			Status::DuplicateEntity,
		];
		for v in variants {
			let code: u32 = v.into();
			assert_eq!(Status::try_from(code).unwrap(), v);
		}
	}

	#[test]
	fn rejects_unknown_code() {
		assert!(Status::try_from(999).is_err());
	}
}
