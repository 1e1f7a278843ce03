pub mod arn;
pub mod auth;
pub mod config;
pub mod error;
pub mod region;

// Re-export everything for easy access
pub use arn::*;
pub use auth::*;
pub use error::*;
pub use region::*;
