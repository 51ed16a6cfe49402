//! Dispatches an authenticated client request to its handler, after checking
//! the subject holds the capability to invoke that verb (spec.md §4.4).

use bytes::Bytes;
use tracing::instrument;

use crate::backend::DataServiceClient;
use crate::error::CoreError;
use crate::instance::Instance;
use vaultd_wire::verb::verb_uuid;
use vaultd_wire::{command::CommandRequest, command::CommandResponse, EntityId, ObjectId, RequestId, Status};

#[instrument(skip(instance, request), fields(req_id = ?request.req_id))]
pub async fn dispatch(
	instance: &Instance,
	subject: EntityId,
	request: CommandRequest,
) -> CommandResponse {
	let req_id = request.req_id;
	let offset = request.offset;
	match handle(instance, subject, &request).await {
		Ok(body) => CommandResponse {
			req_id,
			status: Status::Success,
			offset,
			body,
		},
		Err(err) => CommandResponse::error(req_id, offset, err.as_status()),
	}
}

/// The agent itself is the object every client-facing verb acts upon, except
/// extended-API sends which target another entity.
pub(crate) fn agent_object(instance: &Instance) -> ObjectId {
	ObjectId::from_bytes(instance.agent_id().to_bytes())
}

pub(crate) async fn require_capability(
	instance: &Instance,
	subject: EntityId,
	verb: vaultd_wire::VerbId,
	object: ObjectId,
) -> Result<(), CoreError> {
	if instance.capabilities.check(subject, verb, object) {
		Ok(())
	} else {
		Err(CoreError::Unauthorized)
	}
}

async fn handle(
	instance: &Instance,
	subject: EntityId,
	request: &CommandRequest,
) -> Result<Bytes, CoreError> {
	let object = agent_object(instance);
	match request.req_id {
		RequestId::Handshake => Err(CoreError::Unauthorized),

		RequestId::LatestBlockIdGet => {
			require_capability(instance, subject, verb_uuid::latest_block_id_get(), object).await?;
			let id = instance.data_service.latest_block_id_get().await?;
			Ok(Bytes::copy_from_slice(id.as_bytes()))
		}

		RequestId::BlockIdByHeightGet => {
			require_capability(instance, subject, verb_uuid::block_id_by_height_get(), object)
				.await?;
			let height = read_u64(&request.body)?;
			let id = instance.data_service.block_id_by_height_get(height).await?;
			Ok(Bytes::copy_from_slice(id.as_bytes()))
		}

		RequestId::BlockGet => {
			require_capability(instance, subject, verb_uuid::block_get(), object).await?;
			let id = read_uuid(&request.body)?;
			let block = instance.data_service.block_get(id).await?;
			Ok(block.certificate)
		}

		RequestId::BlockNextIdGet => {
			require_capability(instance, subject, verb_uuid::block_next_id_get(), object).await?;
			let id = read_uuid(&request.body)?;
			let next = instance.data_service.block_next_id_get(id).await?;
			Ok(Bytes::copy_from_slice(sentinel_to_not_found(next)?.as_bytes()))
		}

		RequestId::BlockPrevIdGet => {
			require_capability(instance, subject, verb_uuid::block_prev_id_get(), object).await?;
			let id = read_uuid(&request.body)?;
			let prev = instance.data_service.block_prev_id_get(id).await?;
			Ok(Bytes::copy_from_slice(sentinel_to_not_found(prev)?.as_bytes()))
		}

		RequestId::TransactionGet => {
			require_capability(instance, subject, verb_uuid::transaction_get(), object).await?;
			let id = read_uuid(&request.body)?;
			let txn = instance.data_service.transaction_get(id).await?;
			Ok(txn.certificate)
		}

		RequestId::TransactionNextIdGet => {
			require_capability(instance, subject, verb_uuid::transaction_next_id_get(), object)
				.await?;
			let id = read_uuid(&request.body)?;
			let next = instance.data_service.transaction_next_id_get(id).await?;
			Ok(Bytes::copy_from_slice(sentinel_to_not_found(next)?.as_bytes()))
		}

		RequestId::TransactionPrevIdGet => {
			require_capability(instance, subject, verb_uuid::transaction_prev_id_get(), object)
				.await?;
			let id = read_uuid(&request.body)?;
			let prev = instance.data_service.transaction_prev_id_get(id).await?;
			Ok(Bytes::copy_from_slice(sentinel_to_not_found(prev)?.as_bytes()))
		}

		RequestId::TransactionBlockIdGet => {
			require_capability(instance, subject, verb_uuid::transaction_block_id_get(), object)
				.await?;
			let id = read_uuid(&request.body)?;
			let block_id = instance.data_service.transaction_block_id_get(id).await?;
			Ok(Bytes::copy_from_slice(
				block_id.unwrap_or(crate::data_model::ID_NIL).as_bytes(),
			))
		}

		RequestId::TransactionSubmit => {
			require_capability(instance, subject, verb_uuid::transaction_submit(), object).await?;
			if request.body.len() > vaultd_wire::MAX_CERTIFICATE_SIZE {
				return Err(CoreError::CertificateTooLarge(vaultd_wire::MAX_CERTIFICATE_SIZE));
			}
			let txn = crate::data_model::Transaction {
				id: uuid::Uuid::new_v4(),
				artifact_id: uuid::Uuid::new_v4(),
				block_id: None,
				prev_txn_id: crate::data_model::ID_NIL,
				next_txn_id: crate::data_model::ID_MAX,
				state: crate::data_model::TransactionState::Pending,
				certificate: request.body.clone(),
			};
			instance.data_service.transaction_submit(txn).await?;
			Ok(Bytes::new())
		}

		RequestId::ArtifactFirstTxnIdGet => {
			require_capability(instance, subject, verb_uuid::artifact_first_txn_id_get(), object)
				.await?;
			let id = read_uuid(&request.body)?;
			let txn_id = instance.data_service.artifact_first_txn_id_get(id).await?;
			Ok(Bytes::copy_from_slice(txn_id.as_bytes()))
		}

		RequestId::ArtifactLastTxnIdGet => {
			require_capability(instance, subject, verb_uuid::artifact_last_txn_id_get(), object)
				.await?;
			let id = read_uuid(&request.body)?;
			let txn_id = instance.data_service.artifact_last_txn_id_get(id).await?;
			Ok(Bytes::copy_from_slice(txn_id.as_bytes()))
		}

		RequestId::StatusGet => {
			require_capability(instance, subject, verb_uuid::status_get(), object).await?;
			let status = instance.data_service.status_get().await?;
			let mut body = Vec::with_capacity(24);
			body.extend_from_slice(status.latest_block_id.as_bytes());
			body.extend_from_slice(&status.latest_block_height.to_be_bytes());
			Ok(Bytes::from(body))
		}

		RequestId::Close => Err(CoreError::ConnectionClosed),

		RequestId::AssertLatestBlockId | RequestId::AssertLatestBlockIdCancel => {
			require_capability(instance, subject, verb_uuid::assert_latest_block_id(), object)
				.await?;
			// Handled by the connection loop directly (it owns the subscription
			// lifetime); reaching here means it was invoked out of sequence.
			Err(CoreError::Unauthorized)
		}

		RequestId::ExtendedApiEnable => {
			// Handled by the connection loop directly (it owns the inbox
			// receiver's lifetime); reaching here means it was invoked out
			// of sequence.
			Err(CoreError::Unauthorized)
		}

		RequestId::ExtendedApiSendRecv => {
			let (target, verb, payload) = decode_extended_api_send(&request.body)?;
			require_capability(instance, subject, verb, ObjectId::from_bytes(target.to_bytes()))
				.await?;
			let caller = instance.entities.get(subject)?;
			let reply = instance
				.extended_api
				.send(
					target,
					verb,
					subject,
					caller.public_encryption_key,
					caller.public_signature_key,
					payload,
				)
				.await?;
			let response = reply.await.map_err(|_| CoreError::ExtendedApiQueueFull)?;
			Ok(response)
		}

		RequestId::ExtendedApiSendResp => {
			let (request_id, payload) = decode_extended_api_resp(&request.body)?;
			instance.extended_api.respond(request_id, payload);
			Ok(Bytes::new())
		}
	}
}

/// `ID_NIL`/`ID_MAX` are internal sentinels meaning "no such neighbor", never
/// meant to reach a client as a real id — every next/prev traversal maps
/// them to `NOT_FOUND` the same way.
fn sentinel_to_not_found(id: uuid::Uuid) -> Result<uuid::Uuid, CoreError> {
	if id == crate::data_model::ID_NIL || id == crate::data_model::ID_MAX {
		Err(CoreError::NotFound)
	} else {
		Ok(id)
	}
}

fn read_u64(body: &[u8]) -> Result<u64, CoreError> {
	body.get(..8)
		.and_then(|b| b.try_into().ok())
		.map(u64::from_be_bytes)
		.ok_or_else(|| CoreError::CommandDecode(vaultd_wire::command::CommandDecodeError::Truncated {
			need: 8,
			have: body.len(),
		}))
}

fn read_uuid(body: &[u8]) -> Result<uuid::Uuid, CoreError> {
	body.get(..16)
		.and_then(|b| b.try_into().ok())
		.map(uuid::Uuid::from_bytes)
		.ok_or_else(|| CoreError::CommandDecode(vaultd_wire::command::CommandDecodeError::Truncated {
			need: 16,
			have: body.len(),
		}))
}

fn decode_extended_api_send(
	body: &Bytes,
) -> Result<(EntityId, vaultd_wire::VerbId, Bytes), CoreError> {
	if body.len() < 32 {
		return Err(CoreError::CommandDecode(
			vaultd_wire::command::CommandDecodeError::Truncated {
				need: 32,
				have: body.len(),
			},
		));
	}
	let target = EntityId::from_bytes(body[0..16].try_into().unwrap());
	let verb = vaultd_wire::VerbId::from_bytes(body[16..32].try_into().unwrap());
	let payload = body.slice(32..);
	Ok((target, verb, payload))
}

fn decode_extended_api_resp(body: &Bytes) -> Result<(uuid::Uuid, Bytes), CoreError> {
	if body.len() < 16 {
		return Err(CoreError::CommandDecode(
			vaultd_wire::command::CommandDecodeError::Truncated {
				need: 16,
				have: body.len(),
			},
		));
	}
	let request_id = uuid::Uuid::from_bytes(body[0..16].try_into().unwrap());
	let payload = body.slice(16..);
	Ok((request_id, payload))
}
