pub mod agent;
pub mod api;
pub mod session;
