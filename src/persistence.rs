mod error;
mod models;
mod mysql;
mod persister;

pub use error::{Error, Result};
pub use models::{AdaptorRow, SampleRow, UuidColumn};
pub use mysql::{MySqlSamplePersister, connect};
pub use persister::SamplePersister;
