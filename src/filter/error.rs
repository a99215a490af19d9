use thiserror::Error;

use crate::database::StoreError;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),
}

/// Failures of a list query run through the pipeline
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("This page does not exist")]
    PageOutOfRange,

    #[error(transparent)]
    Store(#[from] StoreError),
}
