//! Grid coordinates and octant keys.

use glam::IVec3;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::morton;

/// Exclusive magnitude bound on each coordinate axis (2^20)
pub const COORD_LIMIT: i32 = 1 << 20;

/// Packed, validated cell coordinate.
///
/// Stored as a Morton code so cell and octant maps stay flat
/// integer-keyed tables. Ordering follows the Z-order curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey(u64);

impl IndexKey {
    /// Validate and pack a coordinate.
    pub fn new(coord: IVec3) -> Result<Self> {
        if !Self::in_range(coord) {
            return Err(Error::OutOfRange(coord));
        }
        Ok(Self(morton::encode_signed(coord)))
    }

    /// Check the `|v| < 2^20` bound on every axis.
    pub fn in_range(coord: IVec3) -> bool {
        coord.cmpgt(IVec3::splat(-COORD_LIMIT)).all() && coord.cmplt(IVec3::splat(COORD_LIMIT)).all()
    }

    /// Unpacked coordinate
    pub fn coord(self) -> IVec3 {
        morton::decode_signed(self.0)
    }

    /// Raw packed value
    pub fn packed(self) -> u64 {
        self.0
    }

    /// Octant containing this cell
    pub fn octant(self, octant_size: u32) -> OctantKey {
        OctantKey::containing(self.coord(), octant_size)
    }
}

impl TryFrom<IVec3> for IndexKey {
    type Error = Error;

    fn try_from(coord: IVec3) -> Result<Self> {
        Self::new(coord)
    }
}

/// Coordinate of a cubic octant: `floor(cell / octant_size)` per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OctantKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl OctantKey {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Octant containing `coord`. `octant_size` must be non-zero.
    pub fn containing(coord: IVec3, octant_size: u32) -> Self {
        // Any size past i32::MAX already exceeds every valid coordinate
        let size = i32::try_from(octant_size).unwrap_or(i32::MAX);
        Self {
            x: coord.x.div_euclid(size),
            y: coord.y.div_euclid(size),
            z: coord.z.div_euclid(size),
        }
    }

    /// First cell coordinate inside this octant
    pub fn origin(self, octant_size: u32) -> IVec3 {
        let size = i32::try_from(octant_size).unwrap_or(i32::MAX);
        IVec3::new(self.x, self.y, self.z).saturating_mul(IVec3::splat(size))
    }
}
