use zeroize::Zeroize;

use crate::mac::hmac_sha256;
use crate::sensitive::Sensitive;

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
	#[error("crypto suite version {0} is not supported, expected 1")]
	UnsupportedSuiteVersion(u32),
}

/// The two keys derived from a completed handshake: one for the ChaCha20
/// keystream, one for the per-frame HMAC. Keeping them distinct means a
/// compromise of one does not automatically leak the other.
pub struct SessionKeys {
	pub encryption_key: Sensitive<[u8; 32]>,
	pub mac_key: Sensitive<[u8; 32]>,
}

/// Derives [`SessionKeys`] from the ECDH shared secret and both parties'
/// key-derivation nonces, using HMAC-SHA256 as a KDF. Distinct label bytes
/// keep the two derived keys independent even though they share an input.
pub fn derive_session_keys(
	shared_secret: &[u8; 32],
	client_key_nonce: &[u8; 32],
	server_key_nonce: &[u8; 32],
) -> SessionKeys {
	let mut encryption_input = Vec::with_capacity(13 + 64);
	encryption_input.extend_from_slice(b"vaultd-enc-key");
	encryption_input.extend_from_slice(client_key_nonce);
	encryption_input.extend_from_slice(server_key_nonce);
	let encryption_key = Sensitive::new(hmac_sha256(shared_secret, &encryption_input));
	encryption_input.zeroize();

	let mut mac_input = Vec::with_capacity(13 + 64);
	mac_input.extend_from_slice(b"vaultd-mac-key");
	mac_input.extend_from_slice(client_key_nonce);
	mac_input.extend_from_slice(server_key_nonce);
	let mac_key = Sensitive::new(hmac_sha256(shared_secret, &mac_input));
	mac_input.zeroize();

	SessionKeys {
		encryption_key,
		mac_key,
	}
}

/// Protocol advertises suite version 1; this is the only one implemented.
pub fn check_suite_version(version: u32) -> Result<(), SuiteError> {
	if version == 1 {
		Ok(())
	} else {
		Err(SuiteError::UnsupportedSuiteVersion(version))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn derived_keys_differ() {
		let shared = [9u8; 32];
		let client_nonce = [1u8; 32];
		let server_nonce = [2u8; 32];
		let keys = derive_session_keys(&shared, &client_nonce, &server_nonce);
		assert_ne!(*keys.encryption_key, *keys.mac_key);
	}

	#[test]
	fn derivation_is_deterministic() {
		let shared = [9u8; 32];
		let client_nonce = [1u8; 32];
		let server_nonce = [2u8; 32];
		let a = derive_session_keys(&shared, &client_nonce, &server_nonce);
		let b = derive_session_keys(&shared, &client_nonce, &server_nonce);
		assert_eq!(*a.encryption_key, *b.encryption_key);
		assert_eq!(*a.mac_key, *b.mac_key);
	}

	#[test]
	fn rejects_unsupported_suite_version() {
		assert!(check_suite_version(1).is_ok());
		assert!(check_suite_version(2).is_err());
	}
}
