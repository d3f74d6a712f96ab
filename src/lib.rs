pub mod api;
pub mod auth;
pub mod backup;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod model;
pub mod models;
pub mod routes;
pub mod service;
pub mod storage;
pub mod utils;
