//! The two frame codecs used on the wire (spec.md §6).
//!
//! Pre-handshake: `type(1)=0x20 | size(4, BE) | payload`.
//! Post-handshake: `type(1)=0x30 | size(4, BE) | iv(8, BE) | mac(32) | ciphertext(size)`.
//!
//! Both are implemented as `tokio_util::codec::{Decoder,Encoder}` so callers
//! wrap a byte stream with `tokio_util::codec::Framed` exactly the way the
//! teacher wraps its transport with `tokio_util::codec::Framed` in
//! `replicate-common`'s `framed.rs` — the difference is these codecs speak a
//! fixed binary layout instead of length-delimited JSON.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub const PLAINTEXT_FRAME_TYPE: u8 = 0x20;
pub const AUTHED_FRAME_TYPE: u8 = 0x30;

/// HMAC-SHA256 tag length, fixed by the crypto suite (see `vaultd-crypto`).
pub const MAC_SIZE: usize = 32;
pub const IV_SIZE: usize = 8;

/// Largest payload we will ever frame. Guards against a hostile peer
/// claiming a multi-gigabyte `size` and stalling the connection forever
/// waiting for bytes that will never arrive.
pub const MAX_FRAME_PAYLOAD: u32 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
	#[error("frame exceeds maximum payload size ({0} > {MAX_FRAME_PAYLOAD})")]
	TooLarge(u32),
	#[error("unexpected frame type {0:#04x}, expected {1:#04x}")]
	WrongType(u8, u8),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// A pre-handshake, unauthenticated, unencrypted block.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PlaintextFrame {
	pub payload: Bytes,
}

#[derive(Debug, Default)]
pub struct PlaintextCodec;

impl Decoder for PlaintextCodec {
	type Item = PlaintextFrame;
	type Error = FrameError;

	fn decode(
		&mut self,
		src: &mut BytesMut,
	) -> Result<Option<Self::Item>, Self::Error> {
		if src.len() < 5 {
			return Ok(None);
		}
		let frame_type = src[0];
		let size = u32::from_be_bytes([src[1], src[2], src[3], src[4]]);
		if frame_type != PLAINTEXT_FRAME_TYPE {
			return Err(FrameError::WrongType(frame_type, PLAINTEXT_FRAME_TYPE));
		}
		if size > MAX_FRAME_PAYLOAD {
			return Err(FrameError::TooLarge(size));
		}
		let total = 5 + size as usize;
		if src.len() < total {
			src.reserve(total - src.len());
			return Ok(None);
		}
		src.advance(5);
		let payload = src.split_to(size as usize).freeze();
		Ok(Some(PlaintextFrame { payload }))
	}
}

impl Encoder<PlaintextFrame> for PlaintextCodec {
	type Error = FrameError;

	fn encode(
		&mut self,
		item: PlaintextFrame,
		dst: &mut BytesMut,
	) -> Result<(), Self::Error> {
		dst.reserve(5 + item.payload.len());
		dst.put_u8(PLAINTEXT_FRAME_TYPE);
		dst.put_u32(item.payload.len() as u32);
		dst.put_slice(&item.payload);
		Ok(())
	}
}

/// A post-handshake, MAC-authenticated block. `ciphertext` is the payload
/// XORed with the suite's stream cipher; decryption/verification happens one
/// layer up in `vaultd-crypto`/`vaultd-core`, not here — this codec only
/// knows how to carve the wire layout apart.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AuthedFrame {
	pub iv: u64,
	pub mac: [u8; MAC_SIZE],
	pub ciphertext: Bytes,
}

#[derive(Debug, Default)]
pub struct AuthedCodec;

const AUTHED_HEADER_LEN: usize = 1 + 4 + IV_SIZE + MAC_SIZE;

impl Decoder for AuthedCodec {
	type Item = AuthedFrame;
	type Error = FrameError;

	fn decode(
		&mut self,
		src: &mut BytesMut,
	) -> Result<Option<Self::Item>, Self::Error> {
		if src.len() < AUTHED_HEADER_LEN {
			return Ok(None);
		}
		let frame_type = src[0];
		let size = u32::from_be_bytes([src[1], src[2], src[3], src[4]]);
		if frame_type != AUTHED_FRAME_TYPE {
			return Err(FrameError::WrongType(frame_type, AUTHED_FRAME_TYPE));
		}
		if size > MAX_FRAME_PAYLOAD {
			return Err(FrameError::TooLarge(size));
		}
		let total = AUTHED_HEADER_LEN + size as usize;
		if src.len() < total {
			src.reserve(total - src.len());
			return Ok(None);
		}
		src.advance(5);
		let mut iv_bytes = [0u8; IV_SIZE];
		iv_bytes.copy_from_slice(&src[..IV_SIZE]);
		src.advance(IV_SIZE);
		let iv = u64::from_be_bytes(iv_bytes);
		let mut mac = [0u8; MAC_SIZE];
		mac.copy_from_slice(&src[..MAC_SIZE]);
		src.advance(MAC_SIZE);
		let ciphertext = src.split_to(size as usize).freeze();
		Ok(Some(AuthedFrame {
			iv,
			mac,
			ciphertext,
		}))
	}
}

impl Encoder<AuthedFrame> for AuthedCodec {
	type Error = FrameError;

	fn encode(
		&mut self,
		item: AuthedFrame,
		dst: &mut BytesMut,
	) -> Result<(), Self::Error> {
		dst.reserve(AUTHED_HEADER_LEN + item.ciphertext.len());
		dst.put_u8(AUTHED_FRAME_TYPE);
		dst.put_u32(item.ciphertext.len() as u32);
		dst.put_u64(item.iv);
		dst.put_slice(&item.mac);
		dst.put_slice(&item.ciphertext);
		Ok(())
	}
}

/// Computes the MAC input: `type || size || iv || ciphertext`, per spec.md
/// §4.1. Exposed so `vaultd-crypto` can compute/verify the tag without
/// duplicating the layout.
pub fn mac_input(iv: u64, ciphertext: &[u8]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(AUTHED_HEADER_LEN - MAC_SIZE + ciphertext.len());
	buf.push(AUTHED_FRAME_TYPE);
	buf.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
	buf.extend_from_slice(&iv.to_be_bytes());
	buf.extend_from_slice(ciphertext);
	buf
}

#[cfg(test)]
mod test {
	use super::*;
	use tokio_util::codec::{Decoder, Encoder};

	#[test]
	fn plaintext_roundtrip() {
		let mut codec = PlaintextCodec;
		let mut buf = BytesMut::new();
		let frame = PlaintextFrame {
			payload: Bytes::from_static(b"hello"),
		};
		codec.encode(frame.clone(), &mut buf).unwrap();
		let decoded = codec.decode(&mut buf).unwrap().unwrap();
		assert_eq!(decoded, frame);
		assert!(buf.is_empty());
	}

	#[test]
	fn plaintext_wrong_type_errors() {
		let mut codec = PlaintextCodec;
		let mut buf = BytesMut::new();
		buf.put_u8(0x99);
		buf.put_u32(0);
		assert!(codec.decode(&mut buf).is_err());
	}

	#[test]
	fn authed_roundtrip() {
		let mut codec = AuthedCodec;
		let mut buf = BytesMut::new();
		let frame = AuthedFrame {
			iv: 42,
			mac: [7u8; MAC_SIZE],
			ciphertext: Bytes::from_static(b"ciphertext bytes"),
		};
		codec.encode(frame.clone(), &mut buf).unwrap();
		let decoded = codec.decode(&mut buf).unwrap().unwrap();
		assert_eq!(decoded, frame);
	}

	#[test]
	fn authed_partial_frame_returns_none() {
		let mut codec = AuthedCodec;
		let mut buf = BytesMut::new();
		let frame = AuthedFrame {
			iv: 1,
			mac: [0u8; MAC_SIZE],
			ciphertext: Bytes::from_static(b"0123456789"),
		};
		codec.encode(frame, &mut buf).unwrap();
		let mut partial = buf.split_to(buf.len() - 1);
		assert!(codec.decode(&mut partial).unwrap().is_none());
	}

	#[test]
	fn oversize_frame_is_rejected() {
		let mut codec = AuthedCodec;
		let mut buf = BytesMut::new();
		buf.put_u8(AUTHED_FRAME_TYPE);
		buf.put_u32(MAX_FRAME_PAYLOAD + 1);
		assert!(matches!(
			codec.decode(&mut buf),
			Err(FrameError::TooLarge(_))
		));
	}
}
