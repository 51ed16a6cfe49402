use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub type HmacTag = [u8; 32];

/// Computes `HMAC-SHA256(key, data)`. Used both for the handshake's
/// challenge-nonce proof of possession and for authenticating every
/// post-handshake frame (spec.md §4.1, §4.2).
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> HmacTag {
	let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
	mac.update(data);
	mac.finalize().into_bytes().into()
}

/// Verifies `tag` against a freshly computed MAC in constant time, so a
/// timing side channel can't leak how many leading bytes matched.
pub fn verify_hmac_sha256(key: &[u8], data: &[u8], tag: &HmacTag) -> bool {
	let expected = hmac_sha256(key, data);
	expected.ct_eq(tag).into()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn verify_accepts_matching_tag() {
		let key = b"session-key-material-32-bytes!!";
		let tag = hmac_sha256(key, b"frame contents");
		assert!(verify_hmac_sha256(key, b"frame contents", &tag));
	}

	#[test]
	fn verify_rejects_tampered_data() {
		let key = b"session-key-material-32-bytes!!";
		let tag = hmac_sha256(key, b"frame contents");
		assert!(!verify_hmac_sha256(key, b"tampered contents", &tag));
	}

	#[test]
	fn verify_rejects_wrong_key() {
		let tag = hmac_sha256(b"key-one-32-bytes-padded-out-now!", b"data");
		assert!(!verify_hmac_sha256(
			b"key-two-32-bytes-padded-out-now!",
			b"data",
			&tag
		));
	}
}
