//! Wire-level types for the vaultd protocol service: ids, capability tuples,
//! status codes, verb ids, and the two frame codecs (pre-handshake plaintext,
//! post-handshake authenticated). No I/O and no cryptography live here —
//! see `vaultd-crypto` and `vaultd-core` for that.

pub mod capability;
pub mod command;
pub mod control;
pub mod frame;
pub mod handshake;
pub mod ids;
pub mod status;
pub mod verb;

pub use capability::Capability;
pub use ids::{EntityId, ObjectId, VerbId};
pub use status::Status;
pub use verb::RequestId;

/// Hard cap on a submitted certificate's size (transaction/block payloads).
/// See spec.md §4.4 point 4.
pub const MAX_CERTIFICATE_SIZE: usize = 32 * 1024;

/// Maximum number of simultaneous data-service child contexts. The source
/// carries this as a fixed-size array; we keep the same capacity invariant.
pub const MAX_CHILD_CONTEXTS: usize = 1024;

/// Bound on a sentinel's outstanding extended-API request queue (see
/// SPEC_FULL.md §4.7).
pub const MAX_PENDING_EXTENDED_API_REQUESTS: usize = 256;
