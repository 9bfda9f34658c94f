pub mod admin;
pub mod assist;
pub mod auth;
pub mod health;
