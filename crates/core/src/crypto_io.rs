//! Bridges `vaultd_wire`'s [`AuthedFrame`] layout to `vaultd_crypto`'s
//! primitives: encrypt-then-MAC on the way out, verify-then-decrypt on the
//! way in.

use bytes::Bytes;

use crate::error::CoreError;
use vaultd_crypto::{apply_keystream, hmac_sha256, verify_hmac_sha256, SessionKeys};
use vaultd_wire::frame::{mac_input, AuthedFrame};

pub fn encrypt_frame(keys: &SessionKeys, iv: u64, plaintext: &[u8]) -> AuthedFrame {
	let mut ciphertext = plaintext.to_vec();
	apply_keystream(&keys.encryption_key, iv, &mut ciphertext);
	let mac = hmac_sha256(&keys.mac_key, &mac_input(iv, &ciphertext));
	AuthedFrame {
		iv,
		mac,
		ciphertext: Bytes::from(ciphertext),
	}
}

pub fn decrypt_frame(keys: &SessionKeys, frame: &AuthedFrame) -> Result<Bytes, CoreError> {
	let expected_input = mac_input(frame.iv, &frame.ciphertext);
	if !verify_hmac_sha256(&keys.mac_key, &expected_input, &frame.mac) {
		return Err(CoreError::FrameAuthenticationFailed);
	}
	let mut plaintext = frame.ciphertext.to_vec();
	apply_keystream(&keys.encryption_key, frame.iv, &mut plaintext);
	Ok(Bytes::from(plaintext))
}

#[cfg(test)]
mod test {
	use super::*;
	use vaultd_crypto::derive_session_keys;

	fn test_keys() -> SessionKeys {
		derive_session_keys(&[1u8; 32], &[2u8; 32], &[3u8; 32])
	}

	#[test]
	fn encrypt_then_decrypt_roundtrips() {
		let keys = test_keys();
		let frame = encrypt_frame(&keys, 5, b"hello world");
		let decrypted = decrypt_frame(&keys, &frame).unwrap();
		assert_eq!(&decrypted[..], b"hello world");
	}

	#[test]
	fn tampered_ciphertext_fails_mac() {
		let keys = test_keys();
		let mut frame = encrypt_frame(&keys, 1, b"payload");
		let mut tampered = frame.ciphertext.to_vec();
		tampered[0] ^= 0xff;
		frame.ciphertext = Bytes::from(tampered);
		assert!(matches!(
			decrypt_frame(&keys, &frame),
			Err(CoreError::FrameAuthenticationFailed)
		));
	}

	#[test]
	fn wrong_iv_fails_mac() {
		let keys = test_keys();
		let mut frame = encrypt_frame(&keys, 1, b"payload");
		frame.iv = 2;
		assert!(matches!(
			decrypt_frame(&keys, &frame),
			Err(CoreError::FrameAuthenticationFailed)
		));
	}
}
