use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;

/// XORs `data` in place with the ChaCha20 keystream for `key`/`iv`. This is
/// the bare stream cipher, not an AEAD — the wire format authenticates
/// separately via HMAC-SHA256 over the ciphertext (spec.md §4.2), so callers
/// must verify the frame's MAC before trusting anything decrypted here.
///
/// The 64-bit wire IV is placed in the low 8 bytes of ChaCha20's 12-byte
/// nonce; the top 4 bytes are always zero, which is safe as long as a given
/// `(key, iv)` pair is never reused — each session derives a fresh key, and
/// each direction increments its own IV per frame.
pub fn apply_keystream(key: &[u8; 32], iv: u64, data: &mut [u8]) {
	let mut nonce = [0u8; 12];
	nonce[4..].copy_from_slice(&iv.to_be_bytes());
	let mut cipher = ChaCha20::new(key.into(), &nonce.into());
	cipher.apply_keystream(data);
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn encrypt_then_decrypt_recovers_plaintext() {
		let key = [0x42u8; 32];
		let iv = 7u64;
		let mut data = b"the quick brown fox".to_vec();
		let original = data.clone();
		apply_keystream(&key, iv, &mut data);
		assert_ne!(data, original);
		apply_keystream(&key, iv, &mut data);
		assert_eq!(data, original);
	}

	#[test]
	fn different_ivs_produce_different_ciphertext() {
		let key = [0x11u8; 32];
		let mut a = b"same plaintext here!".to_vec();
		let mut b = a.clone();
		apply_keystream(&key, 1, &mut a);
		apply_keystream(&key, 2, &mut b);
		assert_ne!(a, b);
	}
}
