use vaultd_wire::Status;

/// Errors that can terminate a connection's state machine or a single
/// request. Every variant maps to a [`Status`] so the router can always
/// produce a response instead of silently dropping the connection.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Frame(#[from] vaultd_wire::frame::FrameError),

	#[error(transparent)]
	HandshakeDecode(#[from] vaultd_wire::handshake::HandshakeDecodeError),

	#[error(transparent)]
	CommandDecode(#[from] vaultd_wire::command::CommandDecodeError),

	#[error(transparent)]
	ControlDecode(#[from] vaultd_wire::control::ControlDecodeError),

	#[error(transparent)]
	Suite(#[from] vaultd_crypto::SuiteError),

	#[error("protocol version {0} is not supported, expected {}", crate::PROTOCOL_VERSION)]
	UnsupportedProtocolVersion(u32),

	#[error("peer's challenge signature did not verify")]
	ChallengeVerificationFailed,

	#[error("frame MAC did not verify")]
	FrameAuthenticationFailed,

	#[error("connection closed by peer")]
	ConnectionClosed,

	#[error("entity {0} is not recognized")]
	UnknownEntity(vaultd_wire::EntityId),

	#[error("no such record")]
	NotFound,

	#[error("entity {0} already exists")]
	DuplicateEntity(vaultd_wire::EntityId),

	#[error("private key already installed")]
	PrivateKeyAlreadySet,

	#[error("subject lacks capability to invoke this verb on this object")]
	Unauthorized,

	#[error("submitted certificate exceeds the {0}-byte limit")]
	CertificateTooLarge(usize),

	#[error("data service: {0}")]
	DataService(#[from] crate::backend::data_service::DataServiceError),

	#[error("notification service: {0}")]
	Notification(#[from] crate::backend::notification_service::NotificationServiceError),

	#[error("no more extended-api requests can be queued for this sentinel")]
	ExtendedApiQueueFull,

	#[error("extended-api entity {0} is not registered as a sentinel")]
	ExtendedApiUnknownEntity(vaultd_wire::EntityId),

	#[error("verb {0} already has a registered sentinel")]
	ExtendedApiVerbTaken(vaultd_wire::VerbId),
}

/// Unrecognized `req_id`s map to UNAUTHORIZED rather than MALFORMED_REQUEST:
/// a well-formed request naming a verb we don't implement must look
/// identical, from the wire, to one naming a verb the caller lacks
/// capability for. Only a genuinely truncated or otherwise malformed
/// envelope gets MALFORMED_REQUEST.
fn command_decode_status(err: &vaultd_wire::command::CommandDecodeError) -> Status {
	use vaultd_wire::command::CommandDecodeError;
	match err {
		CommandDecodeError::UnknownRequestId { .. } => Status::Unauthorized,
		CommandDecodeError::Truncated { .. } | CommandDecodeError::UnknownStatus(_) => {
			Status::MalformedRequest
		}
	}
}

impl CoreError {
	/// Maps this error to the wire status the client or controller should
	/// see. Errors with no sensible client-facing status (io failures,
	/// connection teardown) are not meant to reach this path — callers
	/// should have already decided to close the connection instead.
	pub fn as_status(&self) -> Status {
		match self {
			CoreError::HandshakeDecode(_) | CoreError::ControlDecode(_) => Status::MalformedRequest,
			CoreError::CommandDecode(inner) => command_decode_status(inner),
			CoreError::Frame(_) => Status::RequestPacketBad,
			CoreError::ChallengeVerificationFailed | CoreError::FrameAuthenticationFailed => {
				Status::Unauthorized
			}
			// Unknown entity_id during the handshake must not distinguish itself
			// from "known entity, bad proof" — both are UNAUTHORIZED.
			CoreError::UnknownEntity(_) => Status::Unauthorized,
			CoreError::NotFound => Status::NotFound,
			CoreError::DuplicateEntity(_) => Status::DuplicateEntity,
			CoreError::PrivateKeyAlreadySet => Status::PrivateKeyAlreadySet,
			CoreError::Unauthorized => Status::Unauthorized,
			CoreError::CertificateTooLarge(_) => Status::TransactionVerification,
			CoreError::DataService(e) => e.as_status(),
			CoreError::Notification(_) => Status::IpcWriteDataFailure,
			CoreError::ExtendedApiQueueFull => Status::OutOfMemory,
			CoreError::ExtendedApiUnknownEntity(_) => Status::ExtendedApiUnknownEntity,
			CoreError::ExtendedApiVerbTaken(_) => Status::Unauthorized,
			CoreError::Suite(_) | CoreError::UnsupportedProtocolVersion(_) => {
				Status::MalformedRequest
			}
			CoreError::Io(_) | CoreError::ConnectionClosed => Status::IpcWriteDataFailure,
		}
	}
}
