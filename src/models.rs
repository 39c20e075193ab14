pub mod auth;
pub mod catalog;
pub mod exchange_rate;
