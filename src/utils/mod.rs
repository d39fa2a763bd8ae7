pub mod error;

pub use error::DashError;
