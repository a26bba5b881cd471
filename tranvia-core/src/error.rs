use thiserror::Error;

use crate::fares::FareError;
use crate::modification::ModificationError;
use crate::routing::SearchError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Search error: {0}")]
    Search(#[from] SearchError),
    #[error("Fare error: {0}")]
    Fare(#[from] FareError),
    #[error("Modification error: {0}")]
    Modification(#[from] ModificationError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Bundle was written by build {found}, this build is {expected}")]
    IncompatibleBundle { found: String, expected: String },
}
