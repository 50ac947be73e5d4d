pub mod context;
pub mod error_record;
pub mod outcome;

pub use context::*;
pub use error_record::*;
pub use outcome::*;
