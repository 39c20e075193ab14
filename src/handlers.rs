pub mod auth;
pub mod categories;
pub mod dishes;
pub mod exchange_rate;
pub mod menu;
