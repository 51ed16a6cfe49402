//! Abstracts over the source of cryptographic randomness used for handshake
//! nonces. Factored out as a trait (rather than calling `OsRng` directly)
//! so tests can supply deterministic nonces and assert on exact wire bytes.

use async_trait::async_trait;
use rand::RngCore;
use rand_core::OsRng;

#[async_trait]
pub trait RandomServiceClient: std::fmt::Debug + Send + Sync + 'static {
	async fn random_bytes(&self, len: usize) -> Vec<u8>;

	async fn random_nonce(&self) -> [u8; 32] {
		let bytes = self.random_bytes(32).await;
		let mut nonce = [0u8; 32];
		nonce.copy_from_slice(&bytes);
		nonce
	}
}

/// Draws from the operating system's CSPRNG.
#[derive(Debug, Default)]
pub struct OsRandomService;

#[async_trait]
impl RandomServiceClient for OsRandomService {
	async fn random_bytes(&self, len: usize) -> Vec<u8> {
		let mut buf = vec![0u8; len];
		OsRng.fill_bytes(&mut buf);
		buf
	}
}

/// Replays a fixed byte sequence, repeating it as needed. Used in tests that
/// need to assert on exact handshake wire bytes.
#[derive(Debug)]
pub struct FixedRandomService {
	bytes: Vec<u8>,
}

impl FixedRandomService {
	pub fn new(bytes: Vec<u8>) -> Self {
		assert!(!bytes.is_empty(), "fixed random source must be non-empty");
		Self { bytes }
	}
}

#[async_trait]
impl RandomServiceClient for FixedRandomService {
	async fn random_bytes(&self, len: usize) -> Vec<u8> {
		self.bytes.iter().copied().cycle().take(len).collect()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn os_random_service_produces_requested_length() {
		let svc = OsRandomService;
		assert_eq!(svc.random_bytes(32).await.len(), 32);
		assert_eq!(svc.random_nonce().await.len(), 32);
	}

	#[tokio::test]
	async fn fixed_random_service_repeats_pattern() {
		let svc = FixedRandomService::new(vec![1, 2, 3]);
		assert_eq!(svc.random_bytes(7).await, vec![1, 2, 3, 1, 2, 3, 1]);
	}
}
