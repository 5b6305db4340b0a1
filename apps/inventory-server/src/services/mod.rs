//! Business services behind the HTTP handlers.
//!
//! Handlers stay thin: they extract the caller and request body, call into a
//! service, and shape the response. Services own validation and talk to the
//! store.

pub mod auth_session;
pub mod catalog;
pub mod ledger;
pub mod users;
pub mod validation;

pub use auth_session::AuthSession;
pub use catalog::CatalogGraph;
pub use ledger::InventoryLedger;
pub use users::UserAdmin;
