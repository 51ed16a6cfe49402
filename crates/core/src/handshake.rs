//! Server side of the two-message authenticated key agreement (spec.md
//! §4.1). Runs once per connection, before the command loop starts.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::instrument;

use crate::backend::RandomServiceClient;
use crate::entity::EntityTable;
use crate::error::CoreError;
use crate::io_frame::{read_authed_frame, read_plaintext_frame, write_authed_frame, write_plaintext_frame};
use crate::{crypto_io, PROTOCOL_VERSION};
use rand_core::OsRng;
use vaultd_crypto::{
	check_suite_version, derive_session_keys, hmac_sha256, verify_hmac_sha256, EphemeralKeypair,
	PublicKey, SessionKeys,
};
use vaultd_wire::handshake::{Request1, Request2, Response1, Response2};
use vaultd_wire::{EntityId, Status};

/// IV used by the handshake's own authenticated frames. spec.md §4.2: "After
/// Response 2 both sides set IVs to 1" — Request2 and Response2 are
/// themselves sent at IV 1, so the command loop's first frame in each
/// direction must start at 2 to avoid reusing it.
const HANDSHAKE_FRAME_IV: u64 = 1;

pub struct HandshakeOutcome {
	pub peer_entity: EntityId,
	pub keys: SessionKeys,
	/// First IV the command loop may use in either direction.
	pub next_iv: u64,
}

#[instrument(skip_all)]
pub async fn server_handshake<Io: AsyncRead + AsyncWrite + Unpin>(
	io: &mut Io,
	agent_id: EntityId,
	entities: &EntityTable,
	random: &dyn RandomServiceClient,
) -> Result<HandshakeOutcome, CoreError> {
	let request1_frame = read_plaintext_frame(io).await?;
	let request1 = match Request1::decode(&request1_frame.payload) {
		Ok(request1) => request1,
		Err(err) => {
			write_error_response1(io, Status::MalformedRequest).await;
			return Err(err.into());
		}
	};
	if request1.protocol_version != PROTOCOL_VERSION {
		write_error_response1(io, Status::MalformedRequest).await;
		return Err(CoreError::UnsupportedProtocolVersion(request1.protocol_version));
	}
	if let Err(err) = check_suite_version(request1.crypto_suite_version) {
		write_error_response1(io, Status::MalformedRequest).await;
		return Err(err.into());
	}

	let peer = match entities.get(request1.entity_id) {
		Ok(peer) => peer,
		Err(err) => {
			write_error_response1(io, Status::Unauthorized).await;
			return Err(err);
		}
	};

	let ephemeral = EphemeralKeypair::generate(&mut OsRng);
	let server_public_key = ephemeral.public;
	let shared_secret = ephemeral.diffie_hellman(PublicKey::from_bytes(peer.public_encryption_key));

	let server_key_nonce = random.random_nonce().await;
	let server_challenge_nonce = random.random_nonce().await;
	let keys = derive_session_keys(&shared_secret, &request1.client_key_nonce, &server_key_nonce);

	let client_challenge_signature = hmac_sha256(&keys.mac_key, &request1.client_challenge_nonce);

	let response1 = Response1 {
		status: Status::Success,
		agent_id,
		server_public_key: server_public_key.to_bytes(),
		server_key_nonce,
		server_challenge_nonce,
		client_challenge_signature,
	};
	write_plaintext_frame(
		io,
		&vaultd_wire::frame::PlaintextFrame {
			payload: response1.encode(),
		},
	)
	.await?;

	let request2_frame = read_authed_frame(io).await?;
	if request2_frame.iv != HANDSHAKE_FRAME_IV {
		return Err(CoreError::FrameAuthenticationFailed);
	}
	let request2_plaintext = crypto_io::decrypt_frame(&keys, &request2_frame)?;
	let request2 = Request2::decode(&request2_plaintext)?;
	if !verify_hmac_sha256(
		&keys.mac_key,
		&server_challenge_nonce,
		&request2.server_challenge_signature,
	) {
		return Err(CoreError::ChallengeVerificationFailed);
	}

	let response2 = Response2 {
		status: Status::Success,
	};
	let response2_frame = crypto_io::encrypt_frame(&keys, HANDSHAKE_FRAME_IV, &response2.encode());
	write_authed_frame(io, &response2_frame).await?;

	Ok(HandshakeOutcome {
		peer_entity: peer.id,
		keys,
		next_iv: HANDSHAKE_FRAME_IV + 1,
	})
}

/// Best-effort plaintext error reply for failures before the shared secret
/// is established — there's no session key yet to authenticate a proper
/// error frame with, so this rides the same plaintext `Response1` framing as
/// a successful reply, with the crypto fields zeroed.
async fn write_error_response1<Io: AsyncWrite + Unpin>(io: &mut Io, status: Status) {
	let response1 = Response1 {
		status,
		agent_id: EntityId::from_bytes([0u8; 16]),
		server_public_key: [0u8; 32],
		server_key_nonce: [0u8; 32],
		server_challenge_nonce: [0u8; 32],
		client_challenge_signature: [0u8; 32],
	};
	let _ = write_plaintext_frame(
		io,
		&vaultd_wire::frame::PlaintextFrame {
			payload: response1.encode(),
		},
	)
	.await;
}
