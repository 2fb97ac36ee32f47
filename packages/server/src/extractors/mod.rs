pub mod auth;
pub mod context;
pub mod json;
pub mod query;
