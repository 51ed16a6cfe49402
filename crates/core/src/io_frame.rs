//! Reads and writes the two frame shapes directly off an async byte stream.
//! The handshake needs to interleave a plaintext frame, then switch to
//! authenticated frames mid-stream, which doesn't fit a single
//! `tokio_util::codec::Framed` — so here we drive the wire by hand with
//! plain `AsyncRead`/`AsyncWrite`, and reserve `Framed` for the steady-state
//! command loop in [`crate::connection`].

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::CoreError;
use vaultd_wire::frame::{
	AuthedFrame, PlaintextFrame, AUTHED_FRAME_TYPE, MAC_SIZE, MAX_FRAME_PAYLOAD,
	PLAINTEXT_FRAME_TYPE,
};

pub async fn read_plaintext_frame<Io: AsyncRead + Unpin>(
	io: &mut Io,
) -> Result<PlaintextFrame, CoreError> {
	let frame_type = io.read_u8().await?;
	if frame_type != PLAINTEXT_FRAME_TYPE {
		return Err(vaultd_wire::frame::FrameError::WrongType(frame_type, PLAINTEXT_FRAME_TYPE).into());
	}
	let size = io.read_u32().await?;
	if size > MAX_FRAME_PAYLOAD {
		return Err(vaultd_wire::frame::FrameError::TooLarge(size).into());
	}
	let mut payload = vec![0u8; size as usize];
	io.read_exact(&mut payload).await?;
	Ok(PlaintextFrame {
		payload: payload.into(),
	})
}

pub async fn write_plaintext_frame<Io: AsyncWrite + Unpin>(
	io: &mut Io,
	frame: &PlaintextFrame,
) -> Result<(), CoreError> {
	io.write_u8(PLAINTEXT_FRAME_TYPE).await?;
	io.write_u32(frame.payload.len() as u32).await?;
	io.write_all(&frame.payload).await?;
	io.flush().await?;
	Ok(())
}

pub async fn read_authed_frame<Io: AsyncRead + Unpin>(
	io: &mut Io,
) -> Result<AuthedFrame, CoreError> {
	let frame_type = io.read_u8().await?;
	if frame_type != AUTHED_FRAME_TYPE {
		return Err(vaultd_wire::frame::FrameError::WrongType(frame_type, AUTHED_FRAME_TYPE).into());
	}
	let size = io.read_u32().await?;
	if size > MAX_FRAME_PAYLOAD {
		return Err(vaultd_wire::frame::FrameError::TooLarge(size).into());
	}
	let iv = io.read_u64().await?;
	let mut mac = [0u8; MAC_SIZE];
	io.read_exact(&mut mac).await?;
	let mut ciphertext = vec![0u8; size as usize];
	io.read_exact(&mut ciphertext).await?;
	Ok(AuthedFrame {
		iv,
		mac,
		ciphertext: ciphertext.into(),
	})
}

pub async fn write_authed_frame<Io: AsyncWrite + Unpin>(
	io: &mut Io,
	frame: &AuthedFrame,
) -> Result<(), CoreError> {
	io.write_u8(AUTHED_FRAME_TYPE).await?;
	io.write_u32(frame.ciphertext.len() as u32).await?;
	io.write_u64(frame.iv).await?;
	io.write_all(&frame.mac).await?;
	io.write_all(&frame.ciphertext).await?;
	io.flush().await?;
	Ok(())
}
