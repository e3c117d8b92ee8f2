pub mod catalog;
pub mod content;
pub mod interactions;
pub mod users;

pub use catalog::*;
pub use content::*;
pub use interactions::*;
pub use users::*;
