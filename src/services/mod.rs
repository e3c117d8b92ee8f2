pub mod accounts;
pub mod ads;
pub mod catalog;
pub mod detail;
pub mod interactions;
pub mod pagination;
pub mod profile;
pub mod records;
