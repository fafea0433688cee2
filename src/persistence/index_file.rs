//! Single-file on-disk format for a built forest index.
//!
//! Layout: [magic: 8][version: u32][metric: u8][pad: 3][dimension: u32][crc32: u32][len: u64][payload]
//! The payload is bincode(IndexSnapshot). All integers are little-endian.

use crate::distance::DistanceMetric;
use crate::error::{BreedSearchError, Result};
use crate::forest::ForestIndex;
use crate::persistence::atomic::StagedFile;
use crate::persistence::serialization::{self, IndexSnapshot};
use std::fs::File;
use std::path::Path;

const MAGIC: &[u8; 8] = b"BREEDIDX";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 32;

/// Fixed-size header at the start of an index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub metric: DistanceMetric,
    pub dimension: usize,
    pub checksum: u32,
    pub payload_len: u64,
}

impl IndexHeader {
    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(MAGIC);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12] = self.metric.tag();
        buf[16..20].copy_from_slice(&(self.dimension as u32).to_le_bytes());
        buf[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        buf[24..32].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(BreedSearchError::CorruptIndex(
                "file too small for header".to_string(),
            ));
        }
        if &data[0..8] != MAGIC {
            return Err(BreedSearchError::CorruptIndex("bad magic".to_string()));
        }

        let u32_at = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&data[at..at + 4]);
            u32::from_le_bytes(b)
        };
        let version = u32_at(8);
        if version != FORMAT_VERSION {
            return Err(BreedSearchError::CorruptIndex(format!(
                "unsupported format version {}",
                version
            )));
        }
        let metric = match data[12] {
            0 => DistanceMetric::Angular,
            1 => DistanceMetric::Euclidean,
            other => {
                return Err(BreedSearchError::CorruptIndex(format!(
                    "unknown metric tag {}",
                    other
                )))
            }
        };
        let mut len = [0u8; 8];
        len.copy_from_slice(&data[24..32]);

        Ok(Self {
            version,
            metric,
            dimension: u32_at(16) as usize,
            checksum: u32_at(20),
            payload_len: u64::from_le_bytes(len),
        })
    }
}

/// Serialize a built index into the framed file format.
fn encode_index(index: &ForestIndex) -> Result<Vec<u8>> {
    use crate::index::Index;

    let payload = serialization::to_bincode(&IndexSnapshot::capture(index)?)?;
    let header = IndexHeader {
        version: FORMAT_VERSION,
        metric: index.metric(),
        dimension: index.dimension(),
        checksum: crc32fast::hash(&payload),
        payload_len: payload.len() as u64,
    };

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&header.encode());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Validate and decode a whole index file held in memory.
fn decode_index(
    data: &[u8],
    dimension: usize,
    metric: DistanceMetric,
) -> Result<(ForestIndex, IndexHeader)> {
    let header = IndexHeader::decode(data)?;

    if header.metric != metric {
        return Err(BreedSearchError::MetricMismatch {
            expected: metric,
            actual: header.metric,
        });
    }
    if header.dimension != dimension {
        return Err(BreedSearchError::DimensionMismatch {
            expected: dimension,
            actual: header.dimension,
        });
    }

    let payload = &data[HEADER_SIZE..];
    if payload.len() as u64 != header.payload_len {
        return Err(BreedSearchError::CorruptIndex(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        )));
    }
    if crc32fast::hash(payload) != header.checksum {
        return Err(BreedSearchError::CorruptIndex("checksum mismatch".to_string()));
    }

    let snapshot: IndexSnapshot = serialization::from_bincode(payload)
        .map_err(|e| BreedSearchError::CorruptIndex(e.to_string()))?;
    if snapshot.metric != header.metric || snapshot.dimension != header.dimension {
        return Err(BreedSearchError::CorruptIndex(
            "payload disagrees with header".to_string(),
        ));
    }
    Ok((snapshot.restore()?, header))
}

/// Encode `index` and stage it next to `path` without replacing anything yet.
/// Returns the staged file and the payload checksum written to its header.
pub(crate) fn stage_index(index: &ForestIndex, path: &Path) -> Result<(StagedFile, u32)> {
    let bytes = encode_index(index)?;
    let header = IndexHeader::decode(&bytes)?;
    Ok((StagedFile::stage(path, &bytes)?, header.checksum))
}

/// Load an index together with its validated header.
pub(crate) fn load_with_header(
    path: &Path,
    dimension: usize,
    metric: DistanceMetric,
) -> Result<(ForestIndex, IndexHeader)> {
    let file = File::open(path)?;
    // Best-effort memory map; fall back to a plain read.
    match unsafe { memmap2::Mmap::map(&file) } {
        Ok(mmap) => decode_index(&mmap, dimension, metric),
        Err(e) => {
            log::debug!("mmap unavailable ({}), reading index into memory", e);
            let data = std::fs::read(path)?;
            decode_index(&data, dimension, metric)
        }
    }
}

/// Read only the header of an index file.
pub fn read_header(path: impl AsRef<Path>) -> Result<IndexHeader> {
    use std::io::Read;

    let mut file = File::open(path)?;
    let mut buf = [0u8; HEADER_SIZE];
    file.read_exact(&mut buf).map_err(|_| {
        BreedSearchError::CorruptIndex("file too small for header".to_string())
    })?;
    IndexHeader::decode(&buf)
}

impl ForestIndex {
    /// Persist the built index to `path`, replacing any existing file atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let (staged, _) = stage_index(self, path.as_ref())?;
        staged.commit()
    }

    /// Load an index, failing if it was built for another dimension or metric.
    pub fn load(
        path: impl AsRef<Path>,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<ForestIndex> {
        load_with_header(path.as_ref(), dimension, metric).map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;
    use crate::vector::Vector;
    use tempfile::TempDir;

    fn small_index() -> ForestIndex {
        let mut index = ForestIndex::new(3, DistanceMetric::Angular);
        for i in 0..50 {
            let f = i as f32;
            index
                .add(i, Vector::new(vec![f.sin() + 1.5, f.cos() + 1.5, (f * 0.3).sin()]))
                .unwrap();
        }
        index.build(5).unwrap();
        index
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dog_index.ann");
        let index = small_index();
        index.save(&path).unwrap();

        let loaded = ForestIndex::load(&path, 3, DistanceMetric::Angular).unwrap();
        assert_eq!(loaded.len(), 50);
        assert_eq!(loaded.n_trees(), 5);

        let q = Vector::new(vec![0.2, 0.9, 0.1]);
        assert_eq!(loaded.query(&q, 10).unwrap(), index.query(&q, 10).unwrap());

        let header = read_header(&path).unwrap();
        assert_eq!(header.dimension, 3);
        assert_eq!(header.metric, DistanceMetric::Angular);
    }

    #[test]
    fn test_save_unbuilt_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx.ann");
        let index = ForestIndex::new(3, DistanceMetric::Angular);
        assert!(matches!(index.save(&path), Err(BreedSearchError::IndexNotBuilt)));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx.ann");
        small_index().save(&path).unwrap();
        assert!(matches!(
            ForestIndex::load(&path, 512, DistanceMetric::Angular),
            Err(BreedSearchError::DimensionMismatch { expected: 512, actual: 3 })
        ));
    }

    #[test]
    fn test_load_metric_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx.ann");
        small_index().save(&path).unwrap();
        assert!(matches!(
            ForestIndex::load(&path, 3, DistanceMetric::Euclidean),
            Err(BreedSearchError::MetricMismatch { .. })
        ));
    }

    #[test]
    fn test_load_detects_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idx.ann");
        small_index().save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            ForestIndex::load(&path, 3, DistanceMetric::Angular),
            Err(BreedSearchError::CorruptIndex(_))
        ));

        std::fs::write(&path, b"short").unwrap();
        assert!(matches!(
            ForestIndex::load(&path, 3, DistanceMetric::Angular),
            Err(BreedSearchError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ForestIndex::load(dir.path().join("nope.ann"), 3, DistanceMetric::Angular),
            Err(BreedSearchError::IoError(_))
        ));
    }
}
