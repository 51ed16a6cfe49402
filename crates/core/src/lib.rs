//! Core connection handling for the vaultd protocol service: the
//! authorization model, the handshake, the per-connection state machine, the
//! router, backend service clients, and the control channel. No wire types
//! live here (see `vaultd-wire`) and no transport-level listener setup lives
//! here either — that belongs to the `vaultd` binary.

pub mod backend;
pub mod bounded;
mod connection;
pub mod control;
pub mod crypto_io;
pub mod data_model;
pub mod entity;
pub mod extended_api;
mod handshake;
mod io_frame;
pub mod instance;
pub mod router;

use tracing::Instrument as _;

pub use connection::run as run_connection;
pub use instance::{Instance, InstanceConfig};

/// The only protocol version this implementation speaks. A client
/// advertising anything else is rejected during the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Accepts connections on `listener` forever, spawning one task per
/// connection, in the same "accept loop + `tokio::spawn` + instrumented
/// span" shape as `replicate-server`'s WebTransport accept loop.
#[tracing::instrument(skip_all)]
pub async fn serve_clients(
	instance: std::sync::Arc<Instance>,
	listener: tokio::net::TcpListener,
) -> std::io::Result<()> {
	let mut connection_id: u64 = 0;
	loop {
		let (socket, peer_addr) = listener.accept().await?;
		connection_id += 1;
		let instance = std::sync::Arc::clone(&instance);
		tokio::spawn(
			async move {
				tracing::info!(%peer_addr, "accepted connection");
				run_connection(instance, socket).await;
			}
			.instrument(tracing::info_span!("connection", id = connection_id)),
		);
	}
}

/// Accepts control-channel connections forever. Kept separate from
/// `serve_clients` because the control socket is privileged and should
/// usually be bound to a different, more restricted address (spec.md §4.8).
#[tracing::instrument(skip_all)]
pub async fn serve_control(
	instance: std::sync::Arc<Instance>,
	listener: tokio::net::TcpListener,
) -> std::io::Result<()> {
	let mut connection_id: u64 = 0;
	loop {
		let (socket, peer_addr) = listener.accept().await?;
		connection_id += 1;
		let instance = std::sync::Arc::clone(&instance);
		tokio::spawn(
			async move {
				tracing::info!(%peer_addr, "accepted control connection");
				control::run(instance, socket).await;
			}
			.instrument(tracing::info_span!("control", id = connection_id)),
		);
	}
}
