//! Binary storage for the recipe vector index.
//!
//! File format: `<name>.bin`
//!
//! Header (47 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated, rows dense from 0):
//! - row: u64 (little-endian)
//! - embedding: [f32; dimensions] (little-endian)

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::semantic::index::VectorIndex;

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes: version(1) + model_id(32) + dimensions(2) + entry_count(8) + checksum(4)
const HEADER_SIZE: usize = 47;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: index was built with a different embedding model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// File header structure.
#[derive(Debug)]
struct Header {
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
}

pub struct VectorStorage {
    path: PathBuf,
}

impl VectorStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the vector index from storage.
    ///
    /// # Arguments
    /// * `expected_model_id` - SHA256 hash of the query-side model name
    /// * `expected_dimensions` - Required dimensions, if the caller knows them
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: Option<usize>,
    ) -> Result<VectorIndex, VectorStorageError> {
        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let header = read_header(&mut reader)?;

        if header.model_id != *expected_model_id {
            return Err(VectorStorageError::ModelMismatch);
        }

        let dimensions = header.dimensions as usize;
        if let Some(expected) = expected_dimensions {
            if expected != dimensions {
                return Err(VectorStorageError::DimensionMismatch {
                    expected,
                    got: dimensions,
                });
            }
        }

        let expected_len = entry_size(dimensions)
            .checked_mul(header.entry_count)
            .and_then(|body| body.checked_add(HEADER_SIZE as u64));
        if expected_len != Some(file_len) {
            return Err(VectorStorageError::InvalidFormat(format!(
                "header claims {} entries of {dimensions} dims but file is {file_len} bytes",
                header.entry_count
            )));
        }

        let count = usize::try_from(header.entry_count).map_err(|_| {
            VectorStorageError::InvalidFormat(format!(
                "entry count {} too large",
                header.entry_count
            ))
        })?;

        let mut index = VectorIndex::with_capacity(dimensions, count);

        for expected_row in 0..count {
            let (row, embedding) = read_entry(&mut reader, dimensions)?;
            if row != expected_row as u64 {
                return Err(VectorStorageError::InvalidFormat(format!(
                    "expected row {expected_row}, found row {row}"
                )));
            }

            index.push(embedding).map_err(|e| {
                VectorStorageError::InvalidFormat(format!("row {row}: {e}"))
            })?;
        }

        Ok(index)
    }

    /// Save the vector index to storage.
    ///
    /// Uses atomic write: temp file -> fsync -> rename
    pub fn save(&self, index: &VectorIndex, model_id: &[u8; 32]) -> Result<(), VectorStorageError> {
        let dimensions = u16::try_from(index.dimensions()).map_err(|_| {
            VectorStorageError::InvalidFormat(format!(
                "{} dimensions exceed the format limit",
                index.dimensions()
            ))
        })?;

        let temp_path = self.path.with_extension("tmp");

        let result = write_to_file(&temp_path, index, model_id, dimensions);

        if result.is_err() {
            // Clean up temp file on error
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }
}

fn write_to_file(
    path: &Path,
    index: &VectorIndex,
    model_id: &[u8; 32],
    dimensions: u16,
) -> Result<(), VectorStorageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let header = Header {
        model_id: *model_id,
        dimensions,
        entry_count: index.len() as u64,
    };
    write_header(&mut writer, &header)?;

    for (row, embedding) in index.iter() {
        writer.write_all(&(row as u64).to_le_bytes())?;
        for &value in embedding {
            writer.write_all(&value.to_le_bytes())?;
        }
    }

    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    Ok(())
}

fn read_header(reader: &mut impl Read) -> Result<Header, VectorStorageError> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_bytes)?;

    let version = header_bytes[0];

    // Version check first
    if version > FORMAT_VERSION {
        return Err(VectorStorageError::VersionMismatch(version, FORMAT_VERSION));
    }

    let mut model_id = [0u8; 32];
    model_id.copy_from_slice(&header_bytes[1..33]);

    let dimensions = u16::from_le_bytes([header_bytes[33], header_bytes[34]]);

    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header_bytes[35..43]);
    let entry_count = u64::from_le_bytes(count_bytes);

    let mut checksum_bytes = [0u8; 4];
    checksum_bytes.copy_from_slice(&header_bytes[43..47]);
    let stored_checksum = u32::from_le_bytes(checksum_bytes);

    if stored_checksum != crc32fast::hash(&header_bytes[0..43]) {
        return Err(VectorStorageError::ChecksumMismatch);
    }

    Ok(Header {
        model_id,
        dimensions,
        entry_count,
    })
}

fn write_header(writer: &mut impl Write, header: &Header) -> Result<(), VectorStorageError> {
    let mut header_bytes = [0u8; HEADER_SIZE];

    header_bytes[0] = FORMAT_VERSION;
    header_bytes[1..33].copy_from_slice(&header.model_id);
    header_bytes[33..35].copy_from_slice(&header.dimensions.to_le_bytes());
    header_bytes[35..43].copy_from_slice(&header.entry_count.to_le_bytes());

    let checksum = crc32fast::hash(&header_bytes[0..43]);
    header_bytes[43..47].copy_from_slice(&checksum.to_le_bytes());

    writer.write_all(&header_bytes)?;
    Ok(())
}

/// On-disk bytes per entry: row id plus the vector.
fn entry_size(dimensions: usize) -> u64 {
    8 + 4 * dimensions as u64
}

fn read_entry(
    reader: &mut impl Read,
    dimensions: usize,
) -> Result<(u64, Vec<f32>), VectorStorageError> {
    let mut row_bytes = [0u8; 8];
    reader.read_exact(&mut row_bytes)?;
    let row = u64::from_le_bytes(row_bytes);

    let mut embedding = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        let mut float_bytes = [0u8; 4];
        reader.read_exact(&mut float_bytes)?;
        embedding.push(f32::from_le_bytes(float_bytes));
    }

    Ok((row, embedding))
}
