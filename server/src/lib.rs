pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod kv;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod telemetry;
pub mod ton;
pub mod websocket;
