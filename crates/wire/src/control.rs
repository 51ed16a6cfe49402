//! The control channel: a second, privileged connection used to administer
//! entities, capabilities, and the agent's own private key (spec.md §4.8).
//! Unlike the client command loop, the control channel is never encrypted —
//! it is only ever reachable over a locally-trusted socket.
//!
//! Request: `method(4, BE) | offset(4, BE) | body`.
//! Response: `method(4, BE, echoed) | offset(4, BE, echoed) | status(4, BE) | body`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::capability::Capability;
use crate::ids::{EntityId, ObjectId, VerbId};
use crate::status::{Status, UnknownStatus};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum ControlMethod {
	AuthEntityAdd = 0,
	AuthEntityCapAdd = 1,
	PrivateKeySet = 2,
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized control method {0}")]
pub struct UnknownControlMethod(pub u32);

impl TryFrom<u32> for ControlMethod {
	type Error = UnknownControlMethod;

	fn try_from(value: u32) -> Result<Self, Self::Error> {
		Ok(match value {
			0 => ControlMethod::AuthEntityAdd,
			1 => ControlMethod::AuthEntityCapAdd,
			2 => ControlMethod::PrivateKeySet,
			other => return Err(UnknownControlMethod(other)),
		})
	}
}

impl From<ControlMethod> for u32 {
	fn from(value: ControlMethod) -> Self {
		value as u32
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ControlDecodeError {
	#[error("control envelope truncated: need at least {need} bytes, have {have}")]
	Truncated { need: usize, have: usize },
	#[error(transparent)]
	UnknownMethod(#[from] UnknownControlMethod),
	#[error(transparent)]
	UnknownStatus(#[from] UnknownStatus),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ControlRequest {
	pub method: ControlMethod,
	pub offset: u32,
	pub body: Bytes,
}

impl ControlRequest {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(8 + self.body.len());
		buf.put_u32(u32::from(self.method));
		buf.put_u32(self.offset);
		buf.put_slice(&self.body);
		buf.freeze()
	}

	pub fn decode(mut buf: Bytes) -> Result<Self, ControlDecodeError> {
		if buf.len() < 8 {
			return Err(ControlDecodeError::Truncated {
				need: 8,
				have: buf.len(),
			});
		}
		let method = ControlMethod::try_from(buf.get_u32())?;
		let offset = buf.get_u32();
		Ok(Self {
			method,
			offset,
			body: buf,
		})
	}
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ControlResponse {
	pub method: ControlMethod,
	pub offset: u32,
	pub status: Status,
	pub body: Bytes,
}

impl ControlResponse {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(12 + self.body.len());
		buf.put_u32(u32::from(self.method));
		buf.put_u32(self.offset);
		buf.put_u32(u32::from(self.status));
		buf.put_slice(&self.body);
		buf.freeze()
	}

	pub fn decode(mut buf: Bytes) -> Result<Self, ControlDecodeError> {
		if buf.len() < 12 {
			return Err(ControlDecodeError::Truncated {
				need: 12,
				have: buf.len(),
			});
		}
		let method = ControlMethod::try_from(buf.get_u32())?;
		let offset = buf.get_u32();
		let status = Status::try_from(buf.get_u32())?;
		Ok(Self {
			method,
			offset,
			status,
			body: buf,
		})
	}

	pub fn ack(method: ControlMethod, offset: u32, status: Status) -> Self {
		Self {
			method,
			offset,
			status,
			body: Bytes::new(),
		}
	}
}

/// Body of `AUTH_ENTITY_ADD`: registers an entity and its public encryption
/// and signature keys.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AuthEntityAddBody {
	pub entity_id: EntityId,
	pub public_encryption_key: [u8; 32],
	pub public_signature_key: [u8; 32],
}

impl AuthEntityAddBody {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(80);
		buf.put_slice(&self.entity_id.to_bytes());
		buf.put_slice(&self.public_encryption_key);
		buf.put_slice(&self.public_signature_key);
		buf.freeze()
	}

	pub fn decode(buf: &[u8]) -> Result<Self, ControlDecodeError> {
		if buf.len() < 80 {
			return Err(ControlDecodeError::Truncated {
				need: 80,
				have: buf.len(),
			});
		}
		let mut entity_bytes = [0u8; 16];
		entity_bytes.copy_from_slice(&buf[..16]);
		let mut enc_key = [0u8; 32];
		enc_key.copy_from_slice(&buf[16..48]);
		let mut sign_key = [0u8; 32];
		sign_key.copy_from_slice(&buf[48..80]);
		Ok(Self {
			entity_id: EntityId::from_bytes(entity_bytes),
			public_encryption_key: enc_key,
			public_signature_key: sign_key,
		})
	}
}

/// Body of `AUTH_ENTITY_CAP_ADD`: grants a `(subject, verb, object)` capability.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AuthEntityCapAddBody {
	pub capability: Capability,
}

impl AuthEntityCapAddBody {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(48);
		buf.put_slice(&self.capability.subject.to_bytes());
		buf.put_slice(&self.capability.verb.to_bytes());
		buf.put_slice(&self.capability.object.to_bytes());
		buf.freeze()
	}

	pub fn decode(buf: &[u8]) -> Result<Self, ControlDecodeError> {
		if buf.len() < 48 {
			return Err(ControlDecodeError::Truncated {
				need: 48,
				have: buf.len(),
			});
		}
		let mut subject = [0u8; 16];
		subject.copy_from_slice(&buf[..16]);
		let mut verb = [0u8; 16];
		verb.copy_from_slice(&buf[16..32]);
		let mut object = [0u8; 16];
		object.copy_from_slice(&buf[32..48]);
		Ok(Self {
			capability: Capability::new(
				EntityId::from_bytes(subject),
				VerbId::from_bytes(verb),
				ObjectId::from_bytes(object),
			),
		})
	}
}

/// Body of `PRIVATE_KEY_SET`: installs the agent's own identity — its entity
/// id and both long-term keypairs. May only succeed once per instance
/// (spec.md §4.8, `PrivateKeyAlreadySet`).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PrivateKeySetBody {
	pub agent_id: EntityId,
	pub encryption_public_key: [u8; 32],
	pub encryption_private_key: [u8; 32],
	pub signature_public_key: [u8; 32],
	pub signature_private_key: [u8; 32],
}

impl PrivateKeySetBody {
	pub fn encode(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(16 + 32 * 4);
		buf.put_slice(&self.agent_id.to_bytes());
		buf.put_slice(&self.encryption_public_key);
		buf.put_slice(&self.encryption_private_key);
		buf.put_slice(&self.signature_public_key);
		buf.put_slice(&self.signature_private_key);
		buf.freeze()
	}

	pub fn decode(buf: &[u8]) -> Result<Self, ControlDecodeError> {
		let need = 16 + 32 * 4;
		if buf.len() < need {
			return Err(ControlDecodeError::Truncated {
				need,
				have: buf.len(),
			});
		}
		let mut agent_bytes = [0u8; 16];
		agent_bytes.copy_from_slice(&buf[..16]);
		let mut encryption_public_key = [0u8; 32];
		encryption_public_key.copy_from_slice(&buf[16..48]);
		let mut encryption_private_key = [0u8; 32];
		encryption_private_key.copy_from_slice(&buf[48..80]);
		let mut signature_public_key = [0u8; 32];
		signature_public_key.copy_from_slice(&buf[80..112]);
		let mut signature_private_key = [0u8; 32];
		signature_private_key.copy_from_slice(&buf[112..144]);
		Ok(Self {
			agent_id: EntityId::from_bytes(agent_bytes),
			encryption_public_key,
			encryption_private_key,
			signature_public_key,
			signature_private_key,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn control_request_roundtrip() {
		let req = ControlRequest {
			method: ControlMethod::AuthEntityAdd,
			offset: 1,
			body: Bytes::from_static(b"body"),
		};
		let decoded = ControlRequest::decode(req.encode()).unwrap();
		assert_eq!(decoded, req);
	}

	#[test]
	fn control_response_roundtrip() {
		let resp = ControlResponse::ack(ControlMethod::PrivateKeySet, 2, Status::Success);
		let decoded = ControlResponse::decode(resp.encode()).unwrap();
		assert_eq!(decoded, resp);
	}

	#[test]
	fn auth_entity_add_body_roundtrip() {
		let body = AuthEntityAddBody {
			entity_id: EntityId::random(),
			public_encryption_key: [5u8; 32],
			public_signature_key: [6u8; 32],
		};
		let decoded = AuthEntityAddBody::decode(&body.encode()).unwrap();
		assert_eq!(decoded, body);
	}

	#[test]
	fn auth_entity_cap_add_body_roundtrip() {
		let body = AuthEntityCapAddBody {
			capability: Capability::new(
				EntityId::random(),
				VerbId::random(),
				ObjectId::random(),
			),
		};
		let decoded = AuthEntityCapAddBody::decode(&body.encode()).unwrap();
		assert_eq!(decoded, body);
	}

	#[test]
	fn private_key_set_body_roundtrip() {
		let body = PrivateKeySetBody {
			agent_id: EntityId::random(),
			encryption_public_key: [7u8; 32],
			encryption_private_key: [8u8; 32],
			signature_public_key: [9u8; 32],
			signature_private_key: [10u8; 32],
		};
		let decoded = PrivateKeySetBody::decode(&body.encode()).unwrap();
		assert_eq!(decoded, body);
	}

	#[test]
	fn unknown_method_errors() {
		let mut buf = BytesMut::new();
		buf.put_u32(777);
		buf.put_u32(0);
		assert!(matches!(
			ControlRequest::decode(buf.freeze()),
			Err(ControlDecodeError::UnknownMethod(_))
		));
	}
}
