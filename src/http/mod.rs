//! Request plumbing shared by every handler.

pub mod context;
pub mod session;
pub mod tracing;

pub use context::{client_ip, PageContext};
pub use session::{flash, CurrentUser, FlashLevel, FlashMessage, SessionUser};
