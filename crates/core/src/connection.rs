//! The per-connection async task: runs the handshake, then loops reading
//! command requests and writing responses until the peer disconnects or
//! sends `CLOSE`. Spec.md §9 explicitly sanctions replacing the original's
//! single-threaded callback state machine with one `tokio::select!`-driven
//! task per connection; each connection's ordering invariants are local to
//! it, so nothing has to serialize across connections.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::backend::notification_service::LatestBlockIdUpdate;
use crate::backend::NotificationServiceClient;
use crate::crypto_io::{decrypt_frame, encrypt_frame};
use crate::error::CoreError;
use crate::extended_api::{ExtendedApiRegistry, ExtendedApiRequest};
use crate::instance::Instance;
use crate::io_frame::{read_authed_frame, write_authed_frame};
use crate::{handshake, router};
use vaultd_wire::command::{CommandRequest, CommandResponse};
use vaultd_wire::verb::verb_uuid;
use vaultd_wire::{EntityId, ObjectId, RequestId, Status, VerbId};

/// Unregisters a connection's sentinel verbs when the connection's task
/// ends, on every path — normal close, protocol error, or panic unwind.
struct SentinelGuard<'a> {
	registry: &'a ExtendedApiRegistry,
	verbs: Vec<VerbId>,
}

impl Drop for SentinelGuard<'_> {
	fn drop(&mut self) {
		if !self.verbs.is_empty() {
			self.registry.unregister(&self.verbs);
		}
	}
}

/// Runs a single connection end to end. Errors are logged, not propagated:
/// the accept loop only cares that the task finished.
#[instrument(skip_all)]
pub async fn run<Io: AsyncRead + AsyncWrite + Unpin>(instance: Arc<Instance>, mut io: Io) {
	let outcome = match handshake::server_handshake(
		&mut io,
		instance.agent_id(),
		&instance.entities,
		instance.random_service.as_ref(),
	)
	.await
	{
		Ok(outcome) => outcome,
		Err(err) => {
			warn!("handshake failed: {err:?}");
			return;
		}
	};

	info!(peer = %outcome.peer_entity, "handshake complete");
	if let Err(err) = command_loop(
		&instance,
		&mut io,
		outcome.peer_entity,
		outcome.keys,
		outcome.next_iv,
	)
	.await
	{
		match err {
			CoreError::ConnectionClosed => info!("connection closed"),
			other => error!("connection terminated: {other:?}"),
		}
	}
}

async fn command_loop<Io: AsyncRead + AsyncWrite + Unpin>(
	instance: &Arc<Instance>,
	io: &mut Io,
	peer: EntityId,
	keys: vaultd_crypto::SessionKeys,
	start_iv: u64,
) -> Result<(), CoreError> {
	let mut recv_iv = start_iv;
	let mut send_iv = start_iv;
	let mut assertion: Option<mpsc::UnboundedReceiver<LatestBlockIdUpdate>> = None;
	let mut sentinel_inbox: Option<mpsc::Receiver<ExtendedApiRequest>> = None;
	let mut sentinel_guard = SentinelGuard {
		registry: &instance.extended_api,
		verbs: Vec::new(),
	};

	loop {
		tokio::select! {
			biased;

			frame = read_authed_frame(io) => {
				let frame = frame?;
				if frame.iv != recv_iv {
					return Err(CoreError::FrameAuthenticationFailed);
				}
				recv_iv += 1;
				let plaintext = decrypt_frame(&keys, &frame)?;
				let request = match CommandRequest::decode(plaintext) {
					Ok(request) => request,
					Err(err) => {
						send_decode_error(io, &keys, &mut send_iv, &err).await?;
						continue;
					}
				};

				match request.req_id {
					RequestId::Close => return Err(CoreError::ConnectionClosed),
					RequestId::AssertLatestBlockId => {
						assertion = Some(subscribe_assertion(instance));
						let response = CommandResponse {
							req_id: request.req_id,
							status: Status::Success,
							offset: request.offset,
							body: bytes::Bytes::new(),
						};
						send_response(io, &keys, &mut send_iv, response).await?;
					}
					RequestId::AssertLatestBlockIdCancel => {
						assertion = None;
						let response = CommandResponse {
							req_id: request.req_id,
							status: Status::Success,
							offset: request.offset,
							body: bytes::Bytes::new(),
						};
						send_response(io, &keys, &mut send_iv, response).await?;
					}
					RequestId::ExtendedApiEnable => {
						let response = enable_extended_api(
							instance,
							peer,
							request.offset,
							&mut sentinel_inbox,
							&mut sentinel_guard,
						);
						send_response(io, &keys, &mut send_iv, response).await?;
					}
					_ => {
						let response = router::dispatch(instance, peer, request).await;
						send_response(io, &keys, &mut send_iv, response).await?;
					}
				}
			}

			Some(update) = recv_assertion(&mut assertion) => {
				let mut body = Vec::with_capacity(24);
				body.extend_from_slice(update.block_id.as_bytes());
				body.extend_from_slice(&update.height.to_be_bytes());
				let response = CommandResponse {
					req_id: RequestId::AssertLatestBlockId,
					status: Status::Success,
					offset: 0,
					body: bytes::Bytes::from(body),
				};
				send_response(io, &keys, &mut send_iv, response).await?;
				assertion = None;
			}

			Some(relayed) = recv_sentinel(&mut sentinel_inbox) => {
				let response = CommandResponse {
					req_id: RequestId::ExtendedApiSendRecv,
					status: Status::Success,
					offset: 0,
					body: relayed.encode(),
				};
				send_response(io, &keys, &mut send_iv, response).await?;
			}
		}
	}
}

/// Checks the `sentinel_extend_api_enable` capability, computes which verbs
/// `peer` is now authorized to handle (every verb for which some other
/// entity has been granted a capability naming `peer` as object), and
/// registers the connection's inbox for all of them in one shot.
fn enable_extended_api(
	instance: &Instance,
	peer: EntityId,
	offset: u32,
	sentinel_inbox: &mut Option<mpsc::Receiver<ExtendedApiRequest>>,
	sentinel_guard: &mut SentinelGuard<'_>,
) -> CommandResponse {
	let object = router::agent_object(instance);
	if !instance
		.capabilities
		.check(peer, verb_uuid::sentinel_extend_api_enable(), object)
	{
		return CommandResponse::error(RequestId::ExtendedApiEnable, offset, Status::Unauthorized);
	}

	let verbs = instance
		.capabilities
		.verbs_granting_object(ObjectId::from_bytes(peer.to_bytes()));
	match instance.extended_api.register(&verbs) {
		Ok(rx) => {
			*sentinel_inbox = Some(rx);
			sentinel_guard.verbs = verbs;
			CommandResponse {
				req_id: RequestId::ExtendedApiEnable,
				status: Status::Success,
				offset,
				body: bytes::Bytes::new(),
			}
		}
		Err(err) => CommandResponse::error(RequestId::ExtendedApiEnable, offset, err.as_status()),
	}
}

/// Responds to a request envelope that didn't decode, without tearing down
/// the connection. An unrecognized `req_id` maps to UNAUTHORIZED, never
/// revealing whether the verb exists; a truncated or otherwise malformed
/// envelope maps to MALFORMED_REQUEST. `offset` is echoed when the decode
/// error carried one (it does whenever `req_id` itself read cleanly).
async fn send_decode_error<Io: AsyncWrite + Unpin>(
	io: &mut Io,
	keys: &vaultd_crypto::SessionKeys,
	send_iv: &mut u64,
	err: &vaultd_wire::command::CommandDecodeError,
) -> Result<(), CoreError> {
	use vaultd_wire::command::{encode_unknown_request_error, CommandDecodeError};
	let (raw_req_id, offset, status) = match err {
		CommandDecodeError::UnknownRequestId { raw, offset } => (*raw, *offset, Status::Unauthorized),
		CommandDecodeError::Truncated { .. } | CommandDecodeError::UnknownStatus(_) => {
			(0u32, 0u32, Status::MalformedRequest)
		}
	};
	let body = encode_unknown_request_error(raw_req_id, offset, status);
	let frame = encrypt_frame(keys, *send_iv, &body);
	*send_iv += 1;
	write_authed_frame(io, &frame).await
}

async fn send_response<Io: AsyncWrite + Unpin>(
	io: &mut Io,
	keys: &vaultd_crypto::SessionKeys,
	send_iv: &mut u64,
	response: CommandResponse,
) -> Result<(), CoreError> {
	let frame = encrypt_frame(keys, *send_iv, &response.encode());
	*send_iv += 1;
	write_authed_frame(io, &frame).await
}

fn subscribe_assertion(instance: &Arc<Instance>) -> mpsc::UnboundedReceiver<LatestBlockIdUpdate> {
	let mut broadcast_rx = instance.notification_service.subscribe();
	let (tx, rx) = mpsc::unbounded_channel();
	tokio::spawn(async move {
		while let Ok(update) = broadcast_rx.recv().await {
			if tx.send(update).is_err() {
				break;
			}
		}
	});
	rx
}

async fn recv_assertion(
	assertion: &mut Option<mpsc::UnboundedReceiver<LatestBlockIdUpdate>>,
) -> Option<LatestBlockIdUpdate> {
	match assertion {
		Some(rx) => rx.recv().await,
		None => std::future::pending().await,
	}
}

async fn recv_sentinel(
	inbox: &mut Option<mpsc::Receiver<ExtendedApiRequest>>,
) -> Option<ExtendedApiRequest> {
	match inbox {
		Some(rx) => rx.recv().await,
		None => std::future::pending().await,
	}
}
