pub mod auth;
pub mod core;
pub mod search;
pub mod seats;
pub mod sessions;
