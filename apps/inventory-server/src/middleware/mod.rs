//! Request middleware: principal resolution, role gates and activity logging.

mod activity;
mod principal;
mod role_gate;

pub use activity::*;
pub use principal::*;
pub use role_gate::*;
