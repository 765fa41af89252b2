//! Core type aliases and re-exports

pub use glam::{
    Vec3,
    Mat3, Mat4,
    IVec3,
};

/// Standard Result type for the map
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;
