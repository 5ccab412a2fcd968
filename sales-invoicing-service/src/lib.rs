pub mod config;
pub mod dtos;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;
