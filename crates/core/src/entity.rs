//! The entity table and capability table: the authorization model described
//! in spec.md §3. Both are instance-wide, concurrently shared state, kept in
//! `DashMap`s rather than the original's intrusive linked lists under a
//! single lock (see the `DashMap<InstanceId, _>` pattern in
//! `replicate-server`'s `InstanceManager`).

use dashmap::DashMap;

use crate::error::CoreError;
use vaultd_wire::{Capability, EntityId};

#[derive(Debug, Clone)]
pub struct AuthorizedEntity {
	pub id: EntityId,
	pub public_encryption_key: [u8; 32],
	pub public_signature_key: [u8; 32],
}

/// All entities authorized to connect to this instance.
#[derive(Debug, Default)]
pub struct EntityTable {
	entities: DashMap<EntityId, AuthorizedEntity>,
}

impl EntityTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a new entity. Rejects a second registration of the same id
	/// with [`CoreError::DuplicateEntity`] rather than silently overwriting
	/// its key material.
	pub fn add(&self, entity: AuthorizedEntity) -> Result<(), CoreError> {
		match self.entities.entry(entity.id) {
			dashmap::mapref::entry::Entry::Occupied(_) => {
				Err(CoreError::DuplicateEntity(entity.id))
			}
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				slot.insert(entity);
				Ok(())
			}
		}
	}

	pub fn get(&self, id: EntityId) -> Result<AuthorizedEntity, CoreError> {
		self.entities
			.get(&id)
			.map(|entry| entry.value().clone())
			.ok_or(CoreError::UnknownEntity(id))
	}

	pub fn contains(&self, id: EntityId) -> bool {
		self.entities.contains_key(&id)
	}
}

/// All capability grants, keyed by the full `(subject, verb, object)` tuple
/// so lookup is O(1) regardless of how many grants exist.
#[derive(Debug, Default)]
pub struct CapabilityTable {
	grants: DashMap<Capability, ()>,
}

impl CapabilityTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&self, capability: Capability) {
		self.grants.insert(capability, ());
	}

	/// A subject may invoke `verb` on `object` if it holds that exact grant,
	/// or if the instance-wide blanket grant (`subject == EntityId::NIL`)
	/// exists for that verb/object pair.
	pub fn check(
		&self,
		subject: EntityId,
		verb: vaultd_wire::VerbId,
		object: vaultd_wire::ObjectId,
	) -> bool {
		let exact = Capability::new(subject, verb, object);
		let blanket = Capability::blanket(verb, object);
		self.grants.contains_key(&exact) || self.grants.contains_key(&blanket)
	}

	/// Every distinct verb some subject has been granted against `object`,
	/// regardless of which subject. Used by extended-API registration
	/// (spec.md §4.7): a sentinel becomes the handler for every verb other
	/// entities are authorized to address it through.
	pub fn verbs_granting_object(&self, object: vaultd_wire::ObjectId) -> Vec<vaultd_wire::VerbId> {
		let mut verbs: Vec<vaultd_wire::VerbId> = self
			.grants
			.iter()
			.filter(|entry| entry.key().object == object)
			.map(|entry| entry.key().verb)
			.collect();
		verbs.sort_by_key(|v| v.to_bytes());
		verbs.dedup();
		verbs
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use vaultd_wire::{ObjectId, VerbId};

	#[test]
	fn duplicate_add_is_rejected() {
		let table = EntityTable::new();
		let entity = AuthorizedEntity {
			id: EntityId::random(),
			public_encryption_key: [1u8; 32],
			public_signature_key: [2u8; 32],
		};
		table.add(entity.clone()).unwrap();
		let err = table.add(entity.clone()).unwrap_err();
		assert!(matches!(err, CoreError::DuplicateEntity(id) if id == entity.id));
	}

	#[test]
	fn unknown_entity_errors() {
		let table = EntityTable::new();
		assert!(matches!(
			table.get(EntityId::random()),
			Err(CoreError::UnknownEntity(_))
		));
	}

	#[test]
	fn blanket_grant_covers_any_subject() {
		let table = CapabilityTable::new();
		let verb = VerbId::random();
		let object = ObjectId::random();
		table.add(Capability::blanket(verb, object));
		assert!(table.check(EntityId::random(), verb, object));
	}

	#[test]
	fn exact_grant_does_not_cover_other_subjects() {
		let table = CapabilityTable::new();
		let subject = EntityId::random();
		let verb = VerbId::random();
		let object = ObjectId::random();
		table.add(Capability::new(subject, verb, object));
		assert!(table.check(subject, verb, object));
		assert!(!table.check(EntityId::random(), verb, object));
	}

	#[test]
	fn verbs_granting_object_collects_distinct_verbs_from_any_subject() {
		let table = CapabilityTable::new();
		let object = ObjectId::random();
		let verb_a = VerbId::random();
		let verb_b = VerbId::random();
		table.add(Capability::new(EntityId::random(), verb_a, object));
		table.add(Capability::new(EntityId::random(), verb_b, object));
		table.add(Capability::new(EntityId::random(), verb_a, ObjectId::random()));

		let mut verbs = table.verbs_granting_object(object);
		let mut expected = vec![verb_a, verb_b];
		verbs.sort_by_key(|v| v.to_bytes());
		expected.sort_by_key(|v| v.to_bytes());
		assert_eq!(verbs, expected);
	}
}
