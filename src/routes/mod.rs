//! HTTP handlers grouped by site area.

mod accounts;
mod catalog;
mod interactions;
mod pages;
mod profile;

pub use accounts::accounts_router;
pub use catalog::catalog_router;
pub use interactions::{interactions_router, ProgressReply};
pub use pages::{about, contact, home};
pub use profile::profile_router;
