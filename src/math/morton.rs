//! Morton (Z-order) packing of bounded signed grid coordinates

use glam::IVec3;

/// Bits per axis in a packed key
pub const AXIS_BITS: u32 = 21;

/// Bias added to each signed axis so `-2^20 < v < 2^20` maps into 21 unsigned bits
pub const AXIS_BIAS: i32 = 1 << (AXIS_BITS - 1);

fn spread_bits(x: u32) -> u64 {
    let mut x = x as u64 & 0x1fffff;
    x = (x | (x << 32)) & 0x1f00000000ffff;
    x = (x | (x << 16)) & 0x1f0000ff0000ff;
    x = (x | (x << 8)) & 0x100f00f00f00f00f;
    x = (x | (x << 4)) & 0x10c30c30c30c30c3;
    x = (x | (x << 2)) & 0x1249249249249249;
    x
}

fn compact_bits(x: u64) -> u32 {
    let mut x = x & 0x1249249249249249;
    x = (x | (x >> 2)) & 0x10c30c30c30c30c3;
    x = (x | (x >> 4)) & 0x100f00f00f00f00f;
    x = (x | (x >> 8)) & 0x1f0000ff0000ff;
    x = (x | (x >> 16)) & 0x1f00000000ffff;
    x = (x | (x >> 32)) & 0x1fffff;
    x as u32
}

/// Interleave three 21-bit values into one code
pub fn encode_morton_3d(x: u32, y: u32, z: u32) -> u64 {
    spread_bits(x) | (spread_bits(y) << 1) | (spread_bits(z) << 2)
}

/// Inverse of [`encode_morton_3d`]
pub fn decode_morton_3d(code: u64) -> (u32, u32, u32) {
    (
        compact_bits(code),
        compact_bits(code >> 1),
        compact_bits(code >> 2),
    )
}

/// Pack a signed coordinate. Caller guarantees every axis is within the bias range.
pub fn encode_signed(v: IVec3) -> u64 {
    let b = v + IVec3::splat(AXIS_BIAS);
    encode_morton_3d(b.x as u32, b.y as u32, b.z as u32)
}

/// Unpack a code produced by [`encode_signed`]
pub fn decode_signed(code: u64) -> IVec3 {
    let (x, y, z) = decode_morton_3d(code);
    IVec3::new(x as i32, y as i32, z as i32) - IVec3::splat(AXIS_BIAS)
}
