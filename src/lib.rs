pub mod app;
pub mod error;
pub mod pipeline;

pub use error::Error;
pub use error::Result;
