//! Extended API: lets an application server register itself as a sentinel
//! for a verb namespace, then relays other clients' `EXTENDED_API_SEND_RECV`
//! requests to it and matches up the eventual `EXTENDED_API_SEND_RESP`
//! (spec.md §4.7).
//!
//! Sentinels are registered per [`VerbId`], not per entity: "a verb has at
//! most one sentinel at any time" (spec.md §4.7), and lookup for an incoming
//! `extended_api_sendrecv` is by the verb the caller named, not by which
//! entity currently holds it. A connection that registers for several verbs
//! still gets a single inbox — one receiver, cloned across every verb it
//! claimed — so the connection loop only has to poll one channel.
//!
//! The inbox is a bounded `mpsc` channel sized
//! [`vaultd_wire::MAX_PENDING_EXTENDED_API_REQUESTS`] — a slow or wedged
//! sentinel can only ever cause `EXTENDED_API_QUEUE_FULL`, never unbounded
//! memory growth.

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::CoreError;
use vaultd_wire::{EntityId, VerbId, MAX_PENDING_EXTENDED_API_REQUESTS};

/// A single relayed request, delivered to the sentinel's inbox.
#[derive(Debug)]
pub struct ExtendedApiRequest {
	pub request_id: Uuid,
	pub verb: VerbId,
	pub sender: EntityId,
	pub sender_encryption_public_key: [u8; 32],
	pub sender_signature_public_key: [u8; 32],
	pub payload: Bytes,
}

impl ExtendedApiRequest {
	/// Wire layout pushed to the sentinel's connection: `request_id(16) |
	/// sender(16) | verb(16) | sender_enc_pub(32) | sender_sign_pub(32) |
	/// payload`. The sentinel echoes `request_id` back in its
	/// `EXTENDED_API_SEND_RESP`, and gets the caller's public keys up front
	/// so it doesn't need its own capability to look the caller up.
	pub fn encode(&self) -> Bytes {
		let mut buf = Vec::with_capacity(112 + self.payload.len());
		buf.extend_from_slice(self.request_id.as_bytes());
		buf.extend_from_slice(&self.sender.to_bytes());
		buf.extend_from_slice(&self.verb.to_bytes());
		buf.extend_from_slice(&self.sender_encryption_public_key);
		buf.extend_from_slice(&self.sender_signature_public_key);
		buf.extend_from_slice(&self.payload);
		Bytes::from(buf)
	}
}

struct Pending {
	reply: oneshot::Sender<Bytes>,
}

#[derive(Debug, Default)]
pub struct ExtendedApiRegistry {
	sentinels: DashMap<VerbId, mpsc::Sender<ExtendedApiRequest>>,
	pending: DashMap<Uuid, Pending>,
}

impl ExtendedApiRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers one connection as the sentinel for every verb in `verbs`,
	/// sharing a single inbox across all of them. Fails without registering
	/// anything if any verb already has a sentinel (spec.md §4.7: "a verb
	/// has at most one sentinel at any time").
	pub fn register(&self, verbs: &[VerbId]) -> Result<mpsc::Receiver<ExtendedApiRequest>, CoreError> {
		for &verb in verbs {
			if self.sentinels.contains_key(&verb) {
				return Err(CoreError::ExtendedApiVerbTaken(verb));
			}
		}
		let (tx, rx) = mpsc::channel(MAX_PENDING_EXTENDED_API_REQUESTS);
		for &verb in verbs {
			self.sentinels.insert(verb, tx.clone());
		}
		Ok(rx)
	}

	pub fn unregister(&self, verbs: &[VerbId]) {
		for verb in verbs {
			self.sentinels.remove(verb);
		}
	}

	/// Relays a request for `verb` and returns a receiver that resolves once
	/// the matching `EXTENDED_API_SEND_RESP` arrives.
	pub async fn send(
		&self,
		target: EntityId,
		verb: VerbId,
		sender: EntityId,
		sender_encryption_public_key: [u8; 32],
		sender_signature_public_key: [u8; 32],
		payload: Bytes,
	) -> Result<oneshot::Receiver<Bytes>, CoreError> {
		let inbox = self
			.sentinels
			.get(&verb)
			.ok_or(CoreError::ExtendedApiUnknownEntity(target))?
			.clone();
		let request_id = Uuid::new_v4();
		let (reply_tx, reply_rx) = oneshot::channel();
		self.pending.insert(request_id, Pending { reply: reply_tx });
		let request = ExtendedApiRequest {
			request_id,
			verb,
			sender,
			sender_encryption_public_key,
			sender_signature_public_key,
			payload,
		};
		if inbox.try_send(request).is_err() {
			self.pending.remove(&request_id);
			return Err(CoreError::ExtendedApiQueueFull);
		}
		Ok(reply_rx)
	}

	/// Delivers a sentinel's `EXTENDED_API_SEND_RESP` back to the original
	/// caller. A response for an unknown or already-answered request id is
	/// silently dropped — the caller has either timed out or disconnected.
	pub fn respond(&self, request_id: Uuid, payload: Bytes) {
		if let Some((_, pending)) = self.pending.remove(&request_id) {
			let _ = pending.reply.send(payload);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn relays_request_and_matches_response() {
		let registry = ExtendedApiRegistry::new();
		let verb = VerbId::random();
		let sentinel = EntityId::random();
		let caller = EntityId::random();
		let mut inbox = registry.register(&[verb]).unwrap();

		let reply_rx = registry
			.send(sentinel, verb, caller, [1u8; 32], [2u8; 32], Bytes::from_static(b"ping"))
			.await
			.unwrap();

		let request = inbox.recv().await.unwrap();
		assert_eq!(request.sender, caller);
		registry.respond(request.request_id, Bytes::from_static(b"pong"));

		assert_eq!(reply_rx.await.unwrap(), Bytes::from_static(b"pong"));
	}

	#[tokio::test]
	async fn unregistered_verb_errors() {
		let registry = ExtendedApiRegistry::new();
		let err = registry
			.send(
				EntityId::random(),
				VerbId::random(),
				EntityId::random(),
				[0u8; 32],
				[0u8; 32],
				Bytes::new(),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, CoreError::ExtendedApiUnknownEntity(_)));
	}

	#[tokio::test]
	async fn second_registration_for_same_verb_is_rejected() {
		let registry = ExtendedApiRegistry::new();
		let verb = VerbId::random();
		let _inbox = registry.register(&[verb]).unwrap();
		let err = registry.register(&[verb]).unwrap_err();
		assert!(matches!(err, CoreError::ExtendedApiVerbTaken(v) if v == verb));
	}

	#[tokio::test]
	async fn full_inbox_is_rejected() {
		let registry = ExtendedApiRegistry::new();
		let verb = VerbId::random();
		let sentinel = EntityId::random();
		let _inbox = registry.register(&[verb]).unwrap();
		for _ in 0..MAX_PENDING_EXTENDED_API_REQUESTS {
			registry
				.send(sentinel, verb, EntityId::random(), [0u8; 32], [0u8; 32], Bytes::new())
				.await
				.unwrap();
		}
		let err = registry
			.send(sentinel, verb, EntityId::random(), [0u8; 32], [0u8; 32], Bytes::new())
			.await
			.unwrap_err();
		assert!(matches!(err, CoreError::ExtendedApiQueueFull));
	}

	#[tokio::test]
	async fn response_to_unknown_request_id_is_ignored() {
		let registry = ExtendedApiRegistry::new();
		registry.respond(Uuid::new_v4(), Bytes::new());
	}
}
