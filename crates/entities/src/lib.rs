//! Core entity definitions for the inventory back office.
//!
//! Products, categories and stock transactions form the catalog; users,
//! signup codes, API tokens and activity entries cover access control and
//! auditing. Back-references (category → products, product → transactions)
//! are not stored on the entities; stores compute them from the foreign keys.

mod activity;
mod api_token;
mod category;
mod product;
mod signup_code;
mod transaction;
mod user;

pub use activity::*;
pub use api_token::*;
pub use category::*;
pub use product::*;
pub use signup_code::*;
pub use transaction::*;
pub use user::*;
