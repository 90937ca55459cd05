use std::fs;
use std::iter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::{Mutex, RwLock};

use anyhow::Result;
use bio::io::fasta;
use lru_time_cache::LruCache;

use crate::errors::Error;

/// Filler for positions a provider cannot resolve.
pub const UNKNOWN_BASE: u8 = b'N';

/// A contiguous run of reference bases returned by a [`SequenceProvider`].
#[derive(new, Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct SeqChunk {
    /// Absolute start coordinate of the chunk on its contig.
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get = "pub")]
    seq: Vec<u8>,
}

/// Source of literal reference sequence, resolved per contig.
pub trait SequenceProvider {
    /// Contig names and lengths, in provider order.
    fn contigs(&self) -> Vec<(String, u64)>;

    /// Bases of the half-open interval `[start, end)` on `contig`. The result may be
    /// split into multiple chunks when the interval spans provider-internal
    /// boundaries; chunks are returned in ascending coordinate order and do not
    /// overlap.
    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<Vec<SeqChunk>>;

    /// Like [`fetch`](Self::fetch), but concatenated into a single sequence with every
    /// position not covered by a chunk filled with [`UNKNOWN_BASE`]. Gaps are never
    /// dropped.
    fn fetch_filled(&self, contig: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let mut seq = Vec::with_capacity((end - start) as usize);
        let mut cursor = start;
        for chunk in self.fetch(contig, start, end)? {
            if chunk.start() > cursor {
                seq.extend(iter::repeat(UNKNOWN_BASE).take((chunk.start() - cursor) as usize));
            }
            cursor = chunk.start() + chunk.seq().len() as u64;
            seq.extend_from_slice(chunk.seq());
        }
        if cursor < end {
            seq.extend(iter::repeat(UNKNOWN_BASE).take((end - cursor) as usize));
        }
        Ok(seq)
    }
}

impl<P: SequenceProvider> SequenceProvider for Arc<P> {
    fn contigs(&self) -> Vec<(String, u64)> {
        (**self).contigs()
    }

    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<Vec<SeqChunk>> {
        (**self).fetch(contig, start, end)
    }
}

/// A lazy buffer for reference sequences, backed by an indexed FASTA file.
pub struct Buffer {
    reader: RwLock<fasta::IndexedReader<fs::File>>,
    sequences: Mutex<LruCache<String, Arc<Vec<u8>>>>,
    reference_path: Option<PathBuf>,
}

impl Buffer {
    pub fn from_path<P: AsRef<Path> + std::fmt::Debug>(path: P, capacity: usize) -> Result<Self> {
        let fasta: fasta::IndexedReader<fs::File> = fasta::IndexedReader::from_file(&path)?;
        Ok(Buffer {
            reader: RwLock::new(fasta),
            sequences: Mutex::new(LruCache::with_capacity(capacity)),
            reference_path: Some(path.as_ref().to_path_buf()),
        })
    }

    pub fn reference_path(&self) -> Option<&PathBuf> {
        self.reference_path.as_ref()
    }

    /// Load given contig and return it as a slice. This is O(1) if the contig was
    /// loaded before.
    fn seq(&self, contig: &str) -> Result<Arc<Vec<u8>>> {
        let mut sequences = self.sequences.lock().unwrap();

        if !sequences.contains_key(contig) {
            let mut sequence = Arc::new(Vec::new());
            {
                let mut reader = self.reader.write().unwrap();
                reader.fetch_all(contig)?;
                reader.read(Arc::get_mut(&mut sequence).unwrap())?;
            }

            sequences.insert(contig.to_owned(), Arc::clone(&sequence));
            Ok(sequence)
        } else {
            Ok(Arc::clone(sequences.get(contig).unwrap()))
        }
    }
}

impl SequenceProvider for Buffer {
    fn contigs(&self) -> Vec<(String, u64)> {
        self.reader
            .read()
            .unwrap()
            .index
            .sequences()
            .iter()
            .map(|seq| (seq.name.clone(), seq.len))
            .collect()
    }

    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<Vec<SeqChunk>> {
        let seq = self.seq(contig)?;
        if start > end || end > seq.len() as u64 {
            return Err(Error::PositionOutOfBounds {
                contig: contig.to_owned(),
                pos: end,
                len: seq.len() as u64,
            }
            .into());
        }
        Ok(vec![SeqChunk::new(
            start,
            seq[start as usize..end as usize].to_vec(),
        )])
    }
}

/// Provider over sequences held in memory, for small working regions.
#[derive(Debug, Default)]
pub struct InMemoryReference {
    sequences: Vec<(String, Vec<u8>)>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, name: &str, seq: &[u8]) {
        self.sequences.push((name.to_owned(), seq.to_owned()));
    }

    fn get(&self, contig: &str) -> Result<&Vec<u8>> {
        self.sequences
            .iter()
            .find(|(name, _)| name == contig)
            .map(|(_, seq)| seq)
            .ok_or_else(|| {
                Error::UnknownContig {
                    name: contig.to_owned(),
                }
                .into()
            })
    }
}

impl SequenceProvider for InMemoryReference {
    fn contigs(&self) -> Vec<(String, u64)> {
        self.sequences
            .iter()
            .map(|(name, seq)| (name.clone(), seq.len() as u64))
            .collect()
    }

    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<Vec<SeqChunk>> {
        let seq = self.get(contig)?;
        if start > end || end > seq.len() as u64 {
            return Err(Error::PositionOutOfBounds {
                contig: contig.to_owned(),
                pos: end,
                len: seq.len() as u64,
            }
            .into());
        }
        Ok(vec![SeqChunk::new(
            start,
            seq[start as usize..end as usize].to_vec(),
        )])
    }
}
