//! Trait-based clients for the three external backend services vaultd
//! depends on. Each has a mock (in-process) and a production implementation,
//! so `Instance` can be built identically in tests and in the real binary.

pub mod data_service;
pub mod notification_service;
pub mod random_service;

pub use data_service::DataServiceClient;
pub use notification_service::NotificationServiceClient;
pub use random_service::RandomServiceClient;
