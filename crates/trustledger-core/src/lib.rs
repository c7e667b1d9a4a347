pub mod config;
pub mod conversation;
pub mod database;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;
