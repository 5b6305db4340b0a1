//! HTTP API definitions for the inventory back office.
//!
//! Every JSON endpoint takes a request struct from [`requests`] and answers
//! with a response struct from [`responses`]. Failures use [`ErrorBody`] with
//! one of the codes in [`error_codes`].

mod error;
pub mod requests;
pub mod responses;
mod types;

pub use error::*;
pub use requests::*;
pub use responses::*;
pub use types::*;
