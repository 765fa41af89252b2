//! Persistence of cell map contents

pub mod records;

pub use records::{load_compressed, read_records, save_compressed, write_records, CellRecord, RECORD_SIZE};
