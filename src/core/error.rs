//! Error types for the cell map

use glam::IVec3;
use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("Coordinate {0} out of range (each axis must satisfy |v| < 2^20)")]
    OutOfRange(IVec3),

    #[error("Item id {0} does not fit in 16 bits")]
    InvalidItem(i32),

    #[error("Orientation index {0} is not one of the 24 axis-aligned rotations")]
    InvalidOrientation(u8),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record stream error: {0}")]
    Record(String),
}
