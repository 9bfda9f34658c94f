pub mod assist;
pub mod user;
