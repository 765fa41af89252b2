//! The 24 axis-aligned cell rotations.

use glam::{Mat3, Vec3};

use crate::core::error::Error;

/// Number of distinct orientations
pub const ORIENTATION_COUNT: u8 = 24;

// Even permutations first, then odd ones. Combined with a sign set of matching
// parity every entry is a proper rotation (determinant +1).
const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [1, 2, 0],
    [2, 0, 1],
    [0, 2, 1],
    [2, 1, 0],
    [1, 0, 2],
];
const EVEN_SIGNS: [[f32; 3]; 4] = [
    [1.0, 1.0, 1.0],
    [1.0, -1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
];
const ODD_SIGNS: [[f32; 3]; 4] = [
    [-1.0, -1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, -1.0],
];

const SNAP_TOLERANCE: f32 = 1e-3;

/// One of 24 rotations mapping grid axes onto grid axes.
///
/// Index 0 is the identity. Index `p * 4 + s` sends basis column `j`
/// to `sign[s][j] * axis[perm[p][j]]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Orientation(u8);

impl Orientation {
    pub const IDENTITY: Orientation = Orientation(0);

    /// Create from an index in `0..24`.
    pub fn new(index: u8) -> Option<Self> {
        (index < ORIENTATION_COUNT).then_some(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// All orientations in index order
    pub fn all() -> impl Iterator<Item = Orientation> {
        (0..ORIENTATION_COUNT).map(Orientation)
    }

    /// Rotation basis for this orientation.
    pub fn to_basis(self) -> Mat3 {
        let perm_index = (self.0 / 4) as usize;
        let sign_index = (self.0 % 4) as usize;
        let perm = PERMUTATIONS[perm_index];
        let signs = if perm_index < 3 { EVEN_SIGNS[sign_index] } else { ODD_SIGNS[sign_index] };

        let column = |j: usize| Vec3::AXES[perm[j]] * signs[j];
        Mat3::from_cols(column(0), column(1), column(2))
    }

    /// Snap a basis to its orientation.
    ///
    /// Columns are normalized first so scaled bases are accepted. Returns
    /// `None` when the basis is not an axis-aligned rotation.
    pub fn from_basis(basis: Mat3) -> Option<Self> {
        let cols = [
            basis.x_axis.normalize_or_zero(),
            basis.y_axis.normalize_or_zero(),
            basis.z_axis.normalize_or_zero(),
        ];
        let mut snapped = [Vec3::ZERO; 3];
        for (out, col) in snapped.iter_mut().zip(cols) {
            let rounded = col.round();
            if (col - rounded).abs().max_element() > SNAP_TOLERANCE {
                return None;
            }
            *out = rounded;
        }
        let target = Mat3::from_cols(snapped[0], snapped[1], snapped[2]);
        Self::all().find(|o| o.to_basis() == target)
    }
}

impl TryFrom<u8> for Orientation {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self, Error> {
        Self::new(index).ok_or(Error::InvalidOrientation(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert_eq!(Orientation::IDENTITY.to_basis(), Mat3::IDENTITY);
    }

    #[test]
    fn test_all_are_distinct_rotations() {
        let bases: Vec<Mat3> = Orientation::all().map(|o| o.to_basis()).collect();
        assert_eq!(bases.len(), 24);
        for (i, a) in bases.iter().enumerate() {
            assert!((a.determinant() - 1.0).abs() < 1e-6, "orientation {} is not proper", i);
            for b in &bases[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_from_basis_snaps_each() {
        for o in Orientation::all() {
            assert_eq!(Orientation::from_basis(o.to_basis()), Some(o));
            assert_eq!(Orientation::from_basis(o.to_basis() * 2.5), Some(o));
        }
    }

    #[test]
    fn test_from_basis_quarter_turn() {
        let basis = Mat3::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let o = Orientation::from_basis(basis).expect("quarter turn should snap");
        let v = o.to_basis() * Vec3::X;
        assert!((v - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_from_basis_rejects_oblique() {
        let basis = Mat3::from_rotation_y(0.3);
        assert_eq!(Orientation::from_basis(basis), None);
    }

    #[test]
    fn test_try_from_index() {
        assert!(Orientation::try_from(23).is_ok());
        assert!(matches!(Orientation::try_from(24), Err(Error::InvalidOrientation(24))));
    }
}
