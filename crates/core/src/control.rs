//! The control channel: administers entities, capabilities, and the
//! agent's private key over an unauthenticated (but locally-trusted)
//! connection (spec.md §4.8). Framed the same way the pre-handshake wire is
//! — plaintext frames — since there is no session to encrypt under yet.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, instrument, warn};

use crate::entity::AuthorizedEntity;
use crate::error::CoreError;
use crate::instance::Instance;
use crate::io_frame::{read_plaintext_frame, write_plaintext_frame};
use vaultd_wire::control::{
	AuthEntityAddBody, AuthEntityCapAddBody, ControlMethod, ControlRequest, ControlResponse,
	PrivateKeySetBody,
};
use vaultd_wire::frame::PlaintextFrame;
use vaultd_wire::Status;

#[instrument(skip_all)]
pub async fn run<Io: AsyncRead + AsyncWrite + Unpin>(instance: Arc<Instance>, mut io: Io) {
	loop {
		let frame = match read_plaintext_frame(&mut io).await {
			Ok(frame) => frame,
			Err(CoreError::ConnectionClosed) => return,
			Err(err) => {
				warn!("control channel read failed: {err:?}");
				return;
			}
		};

		let request = match ControlRequest::decode(frame.payload) {
			Ok(req) => req,
			Err(err) => {
				warn!("malformed control request: {err}");
				return;
			}
		};

		let (method, offset) = (request.method, request.offset);
		let status = handle(&instance, request).unwrap_or_else(|err| err.as_status());
		let response = ControlResponse::ack(method, offset, status);
		if let Err(err) = write_plaintext_frame(
			&mut io,
			&PlaintextFrame {
				payload: response.encode(),
			},
		)
		.await
		{
			warn!("control channel write failed: {err:?}");
			return;
		}
		info!(?method, ?status, "control request handled");
	}
}

fn handle(instance: &Instance, request: ControlRequest) -> Result<Status, CoreError> {
	match request.method {
		ControlMethod::AuthEntityAdd => {
			let body = AuthEntityAddBody::decode(&request.body)?;
			instance.entities.add(AuthorizedEntity {
				id: body.entity_id,
				public_encryption_key: body.public_encryption_key,
				public_signature_key: body.public_signature_key,
			})?;
			Ok(Status::Success)
		}
		ControlMethod::AuthEntityCapAdd => {
			let body = AuthEntityCapAddBody::decode(&request.body)?;
			instance.capabilities.add(body.capability);
			Ok(Status::Success)
		}
		ControlMethod::PrivateKeySet => {
			let body = PrivateKeySetBody::decode(&request.body)?;
			instance.set_identity(crate::instance::AgentIdentityInit {
				agent_id: body.agent_id,
				encryption_public_key: body.encryption_public_key,
				encryption_private_key: body.encryption_private_key,
				signature_public_key: body.signature_public_key,
				signature_private_key: body.signature_private_key,
			})?;
			Ok(Status::Success)
		}
	}
}
