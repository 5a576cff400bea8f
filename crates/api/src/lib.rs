pub mod auth;
pub mod pipeline;
pub mod schema;
