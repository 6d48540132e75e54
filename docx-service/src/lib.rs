pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod package;
pub mod services;
pub mod startup;
pub mod workers;
