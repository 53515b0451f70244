pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod models;
pub mod proto;
pub mod services;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::{AppError, AppResult};
