pub mod auth;
pub mod client;
pub mod scopes;
pub mod tokens;
