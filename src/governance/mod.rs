//! Description governance
//!
//! Records, their storage, and the two workflow steps that move them:
//! reviewer decisions and the apply pass that writes approved text back to
//! the catalog.

pub mod models;
pub mod postgres;
pub mod reconciler;
pub mod review;
pub mod store;

pub use postgres::PostgresGovernanceStore;
pub use reconciler::{ApplyReconciler, ApplySummary};
pub use review::ReviewGateway;
pub use store::{GovernanceStore, InMemoryGovernanceStore, SharedStore};
