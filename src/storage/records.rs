//! Flat cell record stream.
//!
//! Layout (little-endian): `u32` record count, then per record
//! `i16 x, i16 y, i16 z, u16 item, u8 orientation, f32 ox, f32 oy, f32 oz`.
//! Compressed files add a header and wrap the stream in LZ4.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::{IVec3, Vec3};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::grid::cell::{Cell, ItemId};
use crate::grid::orientation::Orientation;

/// Bytes per serialized record
pub const RECORD_SIZE: usize = 21;

const MAGIC: &[u8; 4] = b"TXCM";
const VERSION: u32 = 1;

/// One stored cell with its coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellRecord {
    pub coord: IVec3,
    pub item: ItemId,
    pub orientation: Orientation,
    pub offset: Vec3,
}

impl CellRecord {
    pub fn new(coord: IVec3, cell: Cell) -> Self {
        Self {
            coord,
            item: cell.item,
            orientation: cell.orientation,
            offset: cell.offset,
        }
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.item, self.orientation, self.offset)
    }
}

/// Write a count-prefixed record stream.
///
/// Fails with `Error::Record` if any coordinate does not fit in `i16`.
pub fn write_records(writer: &mut impl Write, records: &[CellRecord]) -> Result<()> {
    let count = u32::try_from(records.len())
        .map_err(|_| Error::Record(format!("Too many records: {}", records.len())))?;
    writer.write_all(&count.to_le_bytes())?;

    for record in records {
        write_record(writer, record)?;
    }
    Ok(())
}

/// Read a count-prefixed record stream.
pub fn read_records(reader: &mut impl Read) -> Result<Vec<CellRecord>> {
    let mut buf4 = [0u8; 4];
    reader.read_exact(&mut buf4).map_err(truncated)?;
    let count = u32::from_le_bytes(buf4) as usize;

    // The count is untrusted; let the vector grow past this
    let mut records = Vec::with_capacity(count.min(1 << 16));
    for i in 0..count {
        let record = read_record(reader).map_err(|e| match e {
            Error::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                Error::Record(format!("Stream ended after {} of {} records", i, count))
            }
            other => other,
        })?;
        records.push(record);
    }
    Ok(records)
}

fn truncated(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Record("Stream too short for record count".into())
    } else {
        Error::Io(e)
    }
}

fn write_record(writer: &mut impl Write, record: &CellRecord) -> Result<()> {
    for axis in record.coord.to_array() {
        let v = i16::try_from(axis).map_err(|_| {
            Error::Record(format!("Coordinate {} does not fit in 16 bits", record.coord))
        })?;
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.write_all(&record.item.0.to_le_bytes())?;
    writer.write_all(&[record.orientation.index()])?;
    for component in record.offset.to_array() {
        writer.write_all(&component.to_le_bytes())?;
    }
    Ok(())
}

fn read_record(reader: &mut impl Read) -> Result<CellRecord> {
    let mut buf = [0u8; RECORD_SIZE];
    reader.read_exact(&mut buf)?;

    let i16_at = |i: usize| i16::from_le_bytes([buf[i], buf[i + 1]]) as i32;
    let f32_at = |i: usize| f32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);

    let coord = IVec3::new(i16_at(0), i16_at(2), i16_at(4));
    let item = ItemId(u16::from_le_bytes([buf[6], buf[7]]));
    let orientation = Orientation::try_from(buf[8])?;
    let offset = Vec3::new(f32_at(9), f32_at(13), f32_at(17));

    Ok(CellRecord { coord, item, orientation, offset })
}

/// Save records to an LZ4-compressed file.
pub fn save_compressed(path: impl AsRef<Path>, records: &[CellRecord]) -> Result<()> {
    let mut stream = Vec::with_capacity(4 + records.len() * RECORD_SIZE);
    write_records(&mut stream, records)?;
    let compressed = lz4_flex::compress_prepend_size(&stream);

    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&compressed)?;
    writer.flush()?;

    log::info!(
        "Saved {} records to {:?} ({} -> {} bytes)",
        records.len(),
        path.as_ref(),
        stream.len(),
        compressed.len()
    );
    Ok(())
}

/// Load records from a file written by [`save_compressed`].
pub fn load_compressed(path: impl AsRef<Path>) -> Result<Vec<CellRecord>> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(truncated)?;
    if &magic != MAGIC {
        return Err(Error::Record("Invalid magic bytes".into()));
    }

    let mut version_bytes = [0u8; 4];
    reader.read_exact(&mut version_bytes).map_err(truncated)?;
    let version = u32::from_le_bytes(version_bytes);
    if version != VERSION {
        return Err(Error::Record(format!("Unsupported version: {}", version)));
    }

    let mut compressed = Vec::new();
    reader.read_to_end(&mut compressed)?;
    let stream = lz4_flex::decompress_size_prepended(&compressed)
        .map_err(|e| Error::Record(format!("LZ4 decompression failed: {}", e)))?;

    let records = read_records(&mut stream.as_slice())?;
    log::info!("Loaded {} records from {:?}", records.len(), path.as_ref());
    Ok(records)
}
