pub mod config;
pub mod error;
pub mod error_utils;
pub mod naming;
pub mod score;
pub mod table;
pub mod types;

pub use config::*;
pub use error::*;
pub use error_utils::*;
pub use naming::Entity;
pub use score::*;
pub use table::Table;
pub use types::*;
