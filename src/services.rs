pub mod auth;
pub mod catalog_service;
pub mod document_service;
pub mod image_cleanup;
pub mod login_attempts;
pub mod menu_subscription;
pub mod pricing_service;
