//! Wire layouts for the two-message authenticated key agreement (spec.md
//! §4.1). Both request/response pairs use plain `u32`/fixed-width fields
//! rather than the generic command envelope (`command.rs`) because the
//! handshake precedes authentication and has its own framing.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ids::EntityId;
use crate::status::{Status, UnknownStatus};

/// X25519 public key length.
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Nonce length used for both the key-derivation nonce and the challenge nonce.
pub const NONCE_SIZE: usize = 32;
/// HMAC-SHA256 output length, also used for the challenge signatures.
pub const SIGNATURE_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum HandshakeDecodeError {
	#[error("handshake message truncated: need {need} bytes, have {have}")]
	Truncated { need: usize, have: usize },
	#[error("unexpected request id {0}, expected 0 (handshake)")]
	WrongRequestId(u32),
	#[error(transparent)]
	UnknownStatus(#[from] UnknownStatus),
}

fn require(buf: &[u8], need: usize) -> Result<(), HandshakeDecodeError> {
	if buf.len() < need {
		Err(HandshakeDecodeError::Truncated {
			need,
			have: buf.len(),
		})
	} else {
		Ok(())
	}
}

/// The client's first handshake message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Request1 {
	pub protocol_version: u32,
	pub crypto_suite_version: u32,
	pub entity_id: EntityId,
	pub client_key_nonce: [u8; NONCE_SIZE],
	pub client_challenge_nonce: [u8; NONCE_SIZE],
}

impl Request1 {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(4 + 4 + 4 + 16 + NONCE_SIZE * 2);
		buf.put_u32(0); // req_id
		buf.put_u32(0); // offset
		buf.put_u32(self.protocol_version);
		buf.put_u32(self.crypto_suite_version);
		buf.put_slice(&self.entity_id.to_bytes());
		buf.put_slice(&self.client_key_nonce);
		buf.put_slice(&self.client_challenge_nonce);
		buf.freeze()
	}

	pub fn decode(mut buf: &[u8]) -> Result<Self, HandshakeDecodeError> {
		require(buf, 4 + 4 + 4 + 4 + 16 + NONCE_SIZE * 2)?;
		let req_id = buf.get_u32();
		if req_id != 0 {
			return Err(HandshakeDecodeError::WrongRequestId(req_id));
		}
		let _offset = buf.get_u32();
		let protocol_version = buf.get_u32();
		let crypto_suite_version = buf.get_u32();
		let mut entity_bytes = [0u8; 16];
		buf.copy_to_slice(&mut entity_bytes);
		let mut client_key_nonce = [0u8; NONCE_SIZE];
		buf.copy_to_slice(&mut client_key_nonce);
		let mut client_challenge_nonce = [0u8; NONCE_SIZE];
		buf.copy_to_slice(&mut client_challenge_nonce);
		Ok(Self {
			protocol_version,
			crypto_suite_version,
			entity_id: EntityId::from_bytes(entity_bytes),
			client_key_nonce,
			client_challenge_nonce,
		})
	}
}

/// The agent's reply, carrying its ephemeral public key and a signature over
/// the client's challenge nonce (proof of private-key possession).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Response1 {
	pub status: Status,
	pub agent_id: EntityId,
	pub server_public_key: [u8; PUBLIC_KEY_SIZE],
	pub server_key_nonce: [u8; NONCE_SIZE],
	pub server_challenge_nonce: [u8; NONCE_SIZE],
	pub client_challenge_signature: [u8; SIGNATURE_SIZE],
}

impl Response1 {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(
			4 + 4 + 4 + 16 + PUBLIC_KEY_SIZE + NONCE_SIZE * 2 + SIGNATURE_SIZE,
		);
		buf.put_u32(0); // req_id echo
		buf.put_u32(0); // offset echo
		buf.put_u32(u32::from(self.status));
		buf.put_slice(&self.agent_id.to_bytes());
		buf.put_slice(&self.server_public_key);
		buf.put_slice(&self.server_key_nonce);
		buf.put_slice(&self.server_challenge_nonce);
		buf.put_slice(&self.client_challenge_signature);
		buf.freeze()
	}

	pub fn decode(mut buf: &[u8]) -> Result<Self, HandshakeDecodeError> {
		require(
			buf,
			4 + 4 + 4 + 16 + PUBLIC_KEY_SIZE + NONCE_SIZE * 2 + SIGNATURE_SIZE,
		)?;
		let req_id = buf.get_u32();
		if req_id != 0 {
			return Err(HandshakeDecodeError::WrongRequestId(req_id));
		}
		let _offset = buf.get_u32();
		let status = Status::try_from(buf.get_u32())?;
		let mut agent_bytes = [0u8; 16];
		buf.copy_to_slice(&mut agent_bytes);
		let mut server_public_key = [0u8; PUBLIC_KEY_SIZE];
		buf.copy_to_slice(&mut server_public_key);
		let mut server_key_nonce = [0u8; NONCE_SIZE];
		buf.copy_to_slice(&mut server_key_nonce);
		let mut server_challenge_nonce = [0u8; NONCE_SIZE];
		buf.copy_to_slice(&mut server_challenge_nonce);
		let mut client_challenge_signature = [0u8; SIGNATURE_SIZE];
		buf.copy_to_slice(&mut client_challenge_signature);
		Ok(Self {
			status,
			agent_id: EntityId::from_bytes(agent_bytes),
			server_public_key,
			server_key_nonce,
			server_challenge_nonce,
			client_challenge_signature,
		})
	}
}

/// The client's second message (sent as an [`crate::frame::AuthedFrame`]
/// payload): proof it derived the same shared secret, by signing the
/// agent's challenge nonce.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Request2 {
	pub server_challenge_signature: [u8; SIGNATURE_SIZE],
}

impl Request2 {
	pub fn encode(&self) -> Bytes {
		Bytes::copy_from_slice(&self.server_challenge_signature)
	}

	pub fn decode(buf: &[u8]) -> Result<Self, HandshakeDecodeError> {
		require(buf, SIGNATURE_SIZE)?;
		let mut server_challenge_signature = [0u8; SIGNATURE_SIZE];
		server_challenge_signature.copy_from_slice(&buf[..SIGNATURE_SIZE]);
		Ok(Self {
			server_challenge_signature,
		})
	}
}

/// The agent's final acknowledgement (also an `AuthedFrame` payload). An
/// empty body with `status == Success` means the session is now open for
/// the command loop.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Response2 {
	pub status: Status,
}

impl Response2 {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(4);
		buf.put_u32(u32::from(self.status));
		buf.freeze()
	}

	pub fn decode(mut buf: &[u8]) -> Result<Self, HandshakeDecodeError> {
		require(buf, 4)?;
		let status = Status::try_from(buf.get_u32())?;
		Ok(Self { status })
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn request1_roundtrip() {
		let req = Request1 {
			protocol_version: 1,
			crypto_suite_version: 1,
			entity_id: EntityId::random(),
			client_key_nonce: [1u8; NONCE_SIZE],
			client_challenge_nonce: [2u8; NONCE_SIZE],
		};
		let encoded = req.encode();
		let decoded = Request1::decode(&encoded).unwrap();
		assert_eq!(decoded, req);
	}

	#[test]
	fn response1_roundtrip() {
		let resp = Response1 {
			status: Status::Success,
			agent_id: EntityId::random(),
			server_public_key: [3u8; PUBLIC_KEY_SIZE],
			server_key_nonce: [4u8; NONCE_SIZE],
			server_challenge_nonce: [5u8; NONCE_SIZE],
			client_challenge_signature: [6u8; SIGNATURE_SIZE],
		};
		let encoded = resp.encode();
		let decoded = Response1::decode(&encoded).unwrap();
		assert_eq!(decoded, resp);
	}

	#[test]
	fn request1_rejects_wrong_req_id() {
		let mut buf = BytesMut::new();
		buf.put_u32(99);
		buf.put_bytes(0, 4 + 4 + 4 + 16 + NONCE_SIZE * 2);
		assert!(matches!(
			Request1::decode(&buf),
			Err(HandshakeDecodeError::WrongRequestId(99))
		));
	}

	#[test]
	fn request2_response2_roundtrip() {
		let req2 = Request2 {
			server_challenge_signature: [9u8; SIGNATURE_SIZE],
		};
		assert_eq!(Request2::decode(&req2.encode()).unwrap(), req2);

		let resp2 = Response2 {
			status: Status::Success,
		};
		assert_eq!(Response2::decode(&resp2.encode()).unwrap(), resp2);
	}

	#[test]
	fn truncated_buffers_error() {
		assert!(Request1::decode(&[0u8; 3]).is_err());
		assert!(Response1::decode(&[0u8; 3]).is_err());
		assert!(Request2::decode(&[0u8; 3]).is_err());
		assert!(Response2::decode(&[0u8; 3]).is_err());
	}
}
