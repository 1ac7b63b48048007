pub mod auth;
pub mod authz;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod state;
pub mod storage;
pub mod utils;
