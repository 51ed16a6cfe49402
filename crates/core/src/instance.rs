//! `Instance`: all state shared across every connection an agent process
//! serves, playing the role `InstanceManager`/`ServerCtx` play in the
//! teacher's WebTransport server — except here there is exactly one
//! instance per running process, not one per logical session.

use std::sync::Arc;
use std::sync::RwLock;

use tracing::instrument;

use crate::backend::{DataServiceClient, NotificationServiceClient, RandomServiceClient};
use crate::bounded::BoundedDataService;
use crate::entity::{CapabilityTable, EntityTable};
use crate::error::CoreError;
use crate::extended_api::ExtendedApiRegistry;
use vaultd_crypto::{Sensitive, StaticPrivateKey};
use vaultd_wire::EntityId;

/// The agent's own identity: entity id plus both long-term keypairs,
/// installed in one shot by `PRIVATE_KEY_SET` (spec.md §4.8). Nothing reads
/// `agent_id` as a plain field before that call succeeds — it comes from the
/// supervisor, not the command line, since the supervisor is the source of
/// truth for which entity this process speaks for.
struct AgentIdentity {
	agent_id: EntityId,
	encryption_public_key: [u8; 32],
	encryption_private_key: StaticPrivateKey,
	signature_public_key: [u8; 32],
	signature_private_key: Sensitive<[u8; 32]>,
}

/// Installed via the control channel's `PRIVATE_KEY_SET`.
pub struct AgentIdentityInit {
	pub agent_id: EntityId,
	pub encryption_public_key: [u8; 32],
	pub encryption_private_key: [u8; 32],
	pub signature_public_key: [u8; 32],
	pub signature_private_key: [u8; 32],
}

pub struct Instance {
	pub entities: EntityTable,
	pub capabilities: CapabilityTable,
	pub extended_api: ExtendedApiRegistry,
	pub data_service: Arc<dyn DataServiceClient>,
	pub notification_service: Arc<dyn NotificationServiceClient>,
	pub random_service: Arc<dyn RandomServiceClient>,
	identity: RwLock<Option<AgentIdentity>>,
	/// Used as `agent_id` for every handshake and capability check until
	/// `PRIVATE_KEY_SET` installs a real identity — lets the process accept
	/// handshakes (and reject them for lack of a matching entity) before the
	/// supervisor has configured it, rather than panicking.
	bootstrap_agent_id: EntityId,
}

pub struct InstanceConfig {
	/// Placeholder agent id used only until `PRIVATE_KEY_SET` installs the
	/// real one.
	pub agent_id: EntityId,
	pub data_service: Arc<dyn DataServiceClient>,
	pub notification_service: Arc<dyn NotificationServiceClient>,
	pub random_service: Arc<dyn RandomServiceClient>,
}

impl Instance {
	pub fn new(config: InstanceConfig) -> Arc<Self> {
		Arc::new(Self {
			entities: EntityTable::new(),
			capabilities: CapabilityTable::new(),
			extended_api: ExtendedApiRegistry::new(),
			data_service: Arc::new(BoundedDataService::new(config.data_service)),
			notification_service: config.notification_service,
			random_service: config.random_service,
			identity: RwLock::new(None),
			bootstrap_agent_id: config.agent_id,
		})
	}

	/// The entity id this instance presents in handshakes and capability
	/// checks: the installed identity if `PRIVATE_KEY_SET` has run, else the
	/// bootstrap placeholder.
	pub fn agent_id(&self) -> EntityId {
		match &*self.identity.read().expect("poisoned") {
			Some(identity) => identity.agent_id,
			None => self.bootstrap_agent_id,
		}
	}

	/// Installs the agent's identity: entity id plus both long-term
	/// keypairs. May only succeed once (spec.md §4.8): a second call returns
	/// `PrivateKeyAlreadySet` and leaves the stored identity bit-exact.
	#[instrument(skip_all)]
	pub fn set_identity(&self, init: AgentIdentityInit) -> Result<(), CoreError> {
		let mut slot = self.identity.write().expect("poisoned");
		if slot.is_some() {
			return Err(CoreError::PrivateKeyAlreadySet);
		}
		*slot = Some(AgentIdentity {
			agent_id: init.agent_id,
			encryption_public_key: init.encryption_public_key,
			encryption_private_key: StaticPrivateKey::from_bytes(init.encryption_private_key),
			signature_public_key: init.signature_public_key,
			signature_private_key: Sensitive::new(init.signature_private_key),
		});
		Ok(())
	}

	pub fn has_private_key(&self) -> bool {
		self.identity.read().expect("poisoned").is_some()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backend::data_service::MockDataService;
	use crate::backend::notification_service::MockNotificationService;
	use crate::backend::random_service::OsRandomService;

	fn test_instance() -> Arc<Instance> {
		Instance::new(InstanceConfig {
			agent_id: EntityId::random(),
			data_service: Arc::new(MockDataService::new()),
			notification_service: Arc::new(MockNotificationService::new()),
			random_service: Arc::new(OsRandomService),
		})
	}

	fn identity(agent_id: EntityId) -> AgentIdentityInit {
		AgentIdentityInit {
			agent_id,
			encryption_public_key: [1u8; 32],
			encryption_private_key: [2u8; 32],
			signature_public_key: [3u8; 32],
			signature_private_key: [4u8; 32],
		}
	}

	#[test]
	fn private_key_can_only_be_set_once() {
		let instance = test_instance();
		let agent_id = EntityId::random();
		instance.set_identity(identity(agent_id)).unwrap();
		assert!(instance.has_private_key());
		assert_eq!(instance.agent_id(), agent_id);
		let err = instance.set_identity(identity(EntityId::random())).unwrap_err();
		assert!(matches!(err, CoreError::PrivateKeyAlreadySet));
		assert_eq!(instance.agent_id(), agent_id);
	}

	#[test]
	fn agent_id_falls_back_to_bootstrap_before_identity_is_set() {
		let bootstrap = EntityId::random();
		let instance = Instance::new(InstanceConfig {
			agent_id: bootstrap,
			data_service: Arc::new(MockDataService::new()),
			notification_service: Arc::new(MockNotificationService::new()),
			random_service: Arc::new(OsRandomService),
		});
		assert_eq!(instance.agent_id(), bootstrap);
		assert!(!instance.has_private_key());
	}
}
