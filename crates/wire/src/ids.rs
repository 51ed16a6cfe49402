//! 16-byte identifiers used throughout the protocol: entities, verbs
//! (extended-API only), and objects. All three share the same
//! representation (a UUID), so we generate them from one macro, following
//! the teacher's `make_uuid!` convention.

use uuid::Uuid;

macro_rules! make_id {
    {$(
        $(#[$meta:meta])*
        $vis:vis struct $ident:ident;
    )*} => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
        $vis struct $ident(Uuid);

        impl $ident {
            /// The all-zero id. Used by the capability model as "any subject"
            /// and by the router as the "before the beginning" sentinel.
            pub const NIL: Self = Self(Uuid::nil());

            /// The all-ones id. Used by the router as the "past the end"
            /// sentinel for next/prev traversal.
            pub const MAX: Self = Self(Uuid::max());

            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            pub fn to_bytes(self) -> [u8; 16] {
                *self.0.as_bytes()
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn is_max(&self) -> bool {
                self.0 == Uuid::max()
            }
        }

        impl Default for $ident {
            fn default() -> Self {
                Self::NIL
            }
        }

        impl std::fmt::Display for $ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $ident {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    )*}
}

make_id! {
	/// Identifies an [`AuthorizedEntity`](crate) or the agent itself. Globally unique.
	pub struct EntityId;

	/// Identifies a verb for extended-API routing purposes. Unlike the outer
	/// 32-bit [`RequestId`](crate::verb::RequestId), this is a full UUID so
	/// that application servers can mint their own verb namespaces.
	pub struct VerbId;

	/// The object half of a capability tuple, e.g. the agent id or an
	/// application-defined target.
	pub struct ObjectId;
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn nil_and_max_roundtrip() {
		assert!(EntityId::NIL.is_nil());
		assert!(EntityId::MAX.is_max());
		assert_eq!(EntityId::from_bytes([0; 16]), EntityId::NIL);
		assert_eq!(EntityId::from_bytes([0xff; 16]), EntityId::MAX);
	}

	#[test]
	fn bytes_roundtrip() {
		let id = EntityId::random();
		assert_eq!(EntityId::from_bytes(id.to_bytes()), id);
	}
}
