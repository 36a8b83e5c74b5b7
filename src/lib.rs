pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod model;
pub mod reports;
pub mod routes;
pub mod seed;
pub mod services;
pub mod utils;
