pub mod check;
pub mod composite;
pub mod config;
pub mod layout;
pub mod produce;
