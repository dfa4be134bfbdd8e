// Crate-wide error type.
//
// Each layer keeps its own enum so callers can match the class they care
// about; `Error` is the union for code that drives several layers.

use std::io;

use crate::bsdiff::BsDiffError;
use crate::deflate::{DeflateError, MatchError};
use crate::generator::GenerateError;
use crate::plan::PlanError;
use crate::storage::StorageError;
use crate::zip::ZipError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error(transparent)]
    Deflate(#[from] DeflateError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    BsDiff(#[from] BsDiffError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
