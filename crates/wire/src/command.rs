//! The command-loop envelope carried inside post-handshake [`crate::frame::AuthedFrame`]
//! payloads once a session is open. See spec.md §4.4.
//!
//! Request: `req_id(4, BE) | offset(4, BE) | body`.
//! Response: `req_id(4, BE, echoed) | status(4, BE) | offset(4, BE, echoed) | body`.
//!
//! `offset` lets a client correlate responses with requests when several are
//! in flight; the agent always echoes back whatever the client sent.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::status::{Status, UnknownStatus};
use crate::verb::RequestId;

#[derive(Debug, thiserror::Error)]
pub enum CommandDecodeError {
	#[error("command envelope truncated: need at least {need} bytes, have {have}")]
	Truncated { need: usize, have: usize },
	/// `offset` is still recovered here even though `raw` didn't resolve to a
	/// known [`RequestId`] — the envelope layout reads it unconditionally
	/// right after `req_id`, so the caller can still echo it back.
	#[error("request id {raw} is not recognized")]
	UnknownRequestId { raw: u32, offset: u32 },
	#[error(transparent)]
	UnknownStatus(#[from] UnknownStatus),
}

/// A decoded client request envelope. `body` is left opaque here; the
/// per-verb body layouts live alongside the router logic in `vaultd-core`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandRequest {
	pub req_id: RequestId,
	pub offset: u32,
	pub body: Bytes,
}

impl CommandRequest {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(8 + self.body.len());
		buf.put_u32(u32::from(self.req_id));
		buf.put_u32(self.offset);
		buf.put_slice(&self.body);
		buf.freeze()
	}

	pub fn decode(mut buf: Bytes) -> Result<Self, CommandDecodeError> {
		if buf.len() < 8 {
			return Err(CommandDecodeError::Truncated {
				need: 8,
				have: buf.len(),
			});
		}
		let raw_req_id = buf.get_u32();
		let offset = buf.get_u32();
		let req_id = RequestId::try_from(raw_req_id).map_err(|_| CommandDecodeError::UnknownRequestId {
			raw: raw_req_id,
			offset,
		})?;
		Ok(Self {
			req_id,
			offset,
			body: buf,
		})
	}
}

/// Encodes an error response for a request whose `req_id` wasn't a
/// recognized [`RequestId`] — there's no enum value to put in a typed
/// [`CommandResponse`], but the caller still needs *something* echoed back
/// so it can correlate the error with its request.
pub fn encode_unknown_request_error(raw_req_id: u32, offset: u32, status: Status) -> Bytes {
	let mut buf = BytesMut::with_capacity(12);
	buf.put_u32(raw_req_id);
	buf.put_u32(u32::from(status));
	buf.put_u32(offset);
	buf.freeze()
}

/// A decoded (or to-be-encoded) response envelope.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandResponse {
	pub req_id: RequestId,
	pub status: Status,
	pub offset: u32,
	pub body: Bytes,
}

impl CommandResponse {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(12 + self.body.len());
		buf.put_u32(u32::from(self.req_id));
		buf.put_u32(u32::from(self.status));
		buf.put_u32(self.offset);
		buf.put_slice(&self.body);
		buf.freeze()
	}

	pub fn decode(mut buf: Bytes) -> Result<Self, CommandDecodeError> {
		if buf.len() < 12 {
			return Err(CommandDecodeError::Truncated {
				need: 12,
				have: buf.len(),
			});
		}
		let req_id = RequestId::try_from(buf.get_u32())?;
		let status = Status::try_from(buf.get_u32())?;
		let offset = buf.get_u32();
		Ok(Self {
			req_id,
			status,
			offset,
			body: buf,
		})
	}

	/// Builds an error response that echoes the request's id and offset
	/// with an empty body, the common case for every non-Success status.
	pub fn error(req_id: RequestId, offset: u32, status: Status) -> Self {
		Self {
			req_id,
			status,
			offset,
			body: Bytes::new(),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn request_roundtrip() {
		let req = CommandRequest {
			req_id: RequestId::BlockGet,
			offset: 7,
			body: Bytes::from_static(b"payload"),
		};
		let encoded = req.encode();
		let decoded = CommandRequest::decode(encoded).unwrap();
		assert_eq!(decoded, req);
	}

	#[test]
	fn response_roundtrip() {
		let resp = CommandResponse {
			req_id: RequestId::TransactionSubmit,
			status: Status::Success,
			offset: 3,
			body: Bytes::from_static(b"ok"),
		};
		let encoded = resp.encode();
		let decoded = CommandResponse::decode(encoded).unwrap();
		assert_eq!(decoded, resp);
	}

	#[test]
	fn error_response_has_empty_body() {
		let resp = CommandResponse::error(RequestId::BlockGet, 1, Status::NotFound);
		assert!(resp.body.is_empty());
		assert_eq!(resp.status, Status::NotFound);
	}

	#[test]
	fn truncated_request_errors() {
		assert!(CommandRequest::decode(Bytes::from_static(b"123")).is_err());
	}

	#[test]
	fn unknown_request_id_errors() {
		let mut buf = BytesMut::new();
		buf.put_u32(9999);
		buf.put_u32(42);
		assert!(matches!(
			CommandRequest::decode(buf.freeze()),
			Err(CommandDecodeError::UnknownRequestId { raw: 9999, offset: 42 })
		));
	}
}
