use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{EphemeralSecret, StaticSecret};
use zeroize::Zeroize;

use crate::sensitive::Sensitive;

/// An X25519 public key as carried on the wire.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
	pub fn from_bytes(bytes: [u8; 32]) -> Self {
		Self(bytes)
	}

	pub fn to_bytes(self) -> [u8; 32] {
		self.0
	}
}

impl From<x25519_dalek::PublicKey> for PublicKey {
	fn from(value: x25519_dalek::PublicKey) -> Self {
		Self(*value.as_bytes())
	}
}

/// A fresh keypair generated for a single handshake. Consumed by
/// [`EphemeralKeypair::diffie_hellman`] so the scalar cannot be reused
/// across sessions.
pub struct EphemeralKeypair {
	secret: EphemeralSecret,
	pub public: PublicKey,
}

impl EphemeralKeypair {
	pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
		let secret = EphemeralSecret::random_from_rng(rng);
		let public = PublicKey::from(x25519_dalek::PublicKey::from(&secret));
		Self { secret, public }
	}

	/// Computes the shared secret with `peer_public`. Scrubbed on drop.
	pub fn diffie_hellman(self, peer_public: PublicKey) -> Sensitive<[u8; 32]> {
		let peer = x25519_dalek::PublicKey::from(peer_public.0);
		let shared = self.secret.diffie_hellman(&peer);
		Sensitive::new(*shared.as_bytes())
	}
}

/// The agent's long-term private key, installed once via `PRIVATE_KEY_SET`
/// (spec.md §4.8) and reused across every handshake thereafter.
#[derive(Clone)]
pub struct StaticPrivateKey(StaticSecret);

impl StaticPrivateKey {
	pub fn from_bytes(mut bytes: [u8; 32]) -> Self {
		let key = StaticSecret::from(bytes);
		bytes.zeroize();
		Self(key)
	}

	pub fn public_key(&self) -> PublicKey {
		PublicKey::from(x25519_dalek::PublicKey::from(&self.0))
	}

	pub fn diffie_hellman(&self, peer_public: PublicKey) -> Sensitive<[u8; 32]> {
		let peer = x25519_dalek::PublicKey::from(peer_public.0);
		let shared = self.0.diffie_hellman(&peer);
		Sensitive::new(*shared.as_bytes())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use rand_core::OsRng;

	#[test]
	fn ephemeral_agreement_matches() {
		let mut rng = OsRng;
		let alice = EphemeralKeypair::generate(&mut rng);
		let bob = EphemeralKeypair::generate(&mut rng);
		let alice_public = alice.public;
		let bob_public = bob.public;
		let alice_secret = alice.diffie_hellman(bob_public);
		let bob_secret = bob.diffie_hellman(alice_public);
		assert_eq!(*alice_secret, *bob_secret);
	}

	#[test]
	fn static_key_roundtrips_and_agrees_with_ephemeral() {
		let mut rng = OsRng;
		let server = StaticPrivateKey::from_bytes([0x11u8; 32]);
		let client = EphemeralKeypair::generate(&mut rng);
		let client_public = client.public;
		let server_secret = server.diffie_hellman(client_public);
		let client_secret = client.diffie_hellman(server.public_key());
		assert_eq!(*server_secret, *client_secret);
	}
}
