//! Random-access archive reader.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use super::format::{ArchiveHeader, FrameIndex, decode_grid, decompress};
use crate::compute::Grid;
use crate::history::HistoryEntry;

/// Reads frames back from an archive written by
/// [`ArchiveWriter`](super::ArchiveWriter).
pub struct ArchiveReader {
    reader: BufReader<File>,
    header: ArchiveHeader,
    frame_indices: Vec<FrameIndex>,
}

impl ArchiveReader {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let header = ArchiveHeader::read_from(&mut reader)?;
        if !header.flags.compression.is_supported() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!(
                    "{:?} compression is not available in this build",
                    header.flags.compression
                ),
            ));
        }

        let index_size = header
            .frame_count
            .checked_mul(FrameIndex::SIZE as u64)
            .ok_or_else(|| truncated("frame count overflows"))?;
        let file_len = reader.seek(SeekFrom::End(0))?;
        let index_start = file_len
            .checked_sub(index_size)
            .filter(|&start| start >= ArchiveHeader::SIZE as u64)
            .ok_or_else(|| truncated("index table is missing"))?;

        reader.seek(SeekFrom::Start(index_start))?;
        let frame_indices = (0..header.frame_count)
            .map(|_| FrameIndex::read_from(&mut reader))
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self {
            reader,
            header,
            frame_indices,
        })
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    pub fn frame_count(&self) -> u64 {
        self.header.frame_count
    }

    /// `(rows, cols)` of every stored grid.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.header.rows as usize, self.header.cols as usize)
    }

    /// Step indices of the stored frames, in order.
    pub fn steps(&self) -> impl Iterator<Item = u64> + '_ {
        self.frame_indices.iter().map(|i| i.step)
    }

    /// Read the frame at position `frame` in the archive.
    pub fn read_frame(&mut self, frame: u64) -> io::Result<HistoryEntry> {
        let index = usize::try_from(frame)
            .ok()
            .and_then(|i| self.frame_indices.get(i))
            .copied()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "Frame {} out of range ({} frames)",
                        frame, self.header.frame_count
                    ),
                )
            })?;

        let max_size = self
            .header
            .flags
            .compression
            .max_stored_size(self.header.frame_size());
        if index.size > max_size as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Frame {} claims {} stored bytes, at most {} expected",
                    frame, index.size, max_size
                ),
            ));
        }

        self.reader.seek(SeekFrom::Start(index.offset))?;
        let mut data = vec![0u8; index.size as usize];
        self.reader.read_exact(&mut data)?;
        let raw = decompress(self.header.flags.compression, data)?;
        if raw.len() != self.header.frame_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Frame {} holds {} bytes, expected {}",
                    frame,
                    raw.len(),
                    self.header.frame_size()
                ),
            ));
        }

        let (inhibitor_bytes, activator_bytes) = raw.split_at(self.header.grid_len() * 4);
        let inhibitor = self.grid(inhibitor_bytes)?;
        let activator = if self.header.flags.has_activator {
            Some(Arc::new(self.grid(activator_bytes)?))
        } else {
            None
        };

        Ok(HistoryEntry {
            step: index.step,
            activator,
            inhibitor: Arc::new(inhibitor),
        })
    }

    /// Read the frame recorded at history step `step`, if archived.
    pub fn read_step(&mut self, step: u64) -> io::Result<Option<HistoryEntry>> {
        match self.frame_indices.binary_search_by_key(&step, |i| i.step) {
            Ok(frame) => self.read_frame(frame as u64).map(Some),
            Err(_) => Ok(None),
        }
    }

    pub fn frames(&mut self) -> FrameIterator<'_> {
        FrameIterator {
            reader: self,
            current: 0,
        }
    }

    fn grid(&self, bytes: &[u8]) -> io::Result<Grid> {
        let (rows, cols) = self.dimensions();
        Grid::from_vec(rows, cols, decode_grid(bytes)?)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Grid size mismatch"))
    }
}

fn truncated(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("Truncated archive: {what}"),
    )
}

/// Iterator over every archived frame.
pub struct FrameIterator<'a> {
    reader: &'a mut ArchiveReader,
    current: u64,
}

impl<'a> Iterator for FrameIterator<'a> {
    type Item = io::Result<HistoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.reader.frame_count() {
            return None;
        }
        let result = self.reader.read_frame(self.current);
        self.current += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.reader.frame_count() - self.current) as usize;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for FrameIterator<'a> {}
