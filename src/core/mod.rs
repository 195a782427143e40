//! Shared value types, the dataset trait and the crate error

pub mod error;
pub mod traits;
pub mod types;

pub use self::error::*;
pub use self::traits::*;
pub use self::types::*;
