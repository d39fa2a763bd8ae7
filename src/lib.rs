pub mod config;
pub mod dashboard;
pub mod explain;
pub mod image;
pub mod inference;
pub mod models;
pub mod render;
pub mod utils;
pub mod web;

pub use config::Config;
pub use dashboard::{Pipeline, RunReport};
pub use utils::error::DashError;

pub type Result<T> = std::result::Result<T, DashError>;
