pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod models;
pub mod policy;
pub mod repository;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod services;
pub mod state;
pub mod storage;
pub mod summaries;
