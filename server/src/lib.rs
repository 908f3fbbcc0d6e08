// server/src/lib.rs

pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod seed;
pub mod services;
pub mod state;
pub mod web;
