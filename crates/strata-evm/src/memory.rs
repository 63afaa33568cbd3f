//! Frame memory

use crate::word::Word;

/// `size` bytes of `source` from `offset`, zero-filled where the source
/// runs out. `None` stands for an offset beyond addressable range.
pub fn padded_slice(source: &[u8], offset: Option<usize>, size: usize) -> Vec<u8> {
    let mut chunk = vec![0u8; size];
    if let Some(start) = offset.filter(|start| *start < source.len()) {
        let end = start.saturating_add(size).min(source.len());
        chunk[..end - start].copy_from_slice(&source[start..end]);
    }
    chunk
}

/// Byte-addressed memory, grown in 32-byte words
#[derive(Clone, Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Create new empty memory
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Current size in bytes (always a multiple of 32)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Current size in words
    pub fn words(&self) -> u64 {
        (self.data.len() / 32) as u64
    }

    /// Grow to cover `offset..offset + size`; size 0 is a no-op.
    ///
    /// Returns the new size if memory grew.
    pub fn extend(&mut self, offset: usize, size: usize) -> Option<usize> {
        if size == 0 {
            return None;
        }
        let end = offset.saturating_add(size);
        if end <= self.data.len() {
            return None;
        }
        let aligned = end.div_ceil(32) * 32;
        self.data.resize(aligned, 0);
        Some(aligned)
    }

    /// Read `size` bytes, zero past the end
    pub fn read(&self, offset: usize, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size];
        if offset < self.data.len() {
            let end = offset.saturating_add(size).min(self.data.len());
            out[..end - offset].copy_from_slice(&self.data[offset..end]);
        }
        out
    }

    /// Read a 32-byte word
    pub fn read_word(&self, offset: usize) -> Word {
        Word::from_be_slice(&self.read(offset, 32))
    }

    /// Write bytes, growing as needed
    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.extend(offset, bytes.len());
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Raw contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
