//! Streaming archive writer.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use super::format::{
    ArchiveFlags, ArchiveHeader, CompressionType, FrameIndex, compress, encode_grid,
};
use crate::history::HistoryEntry;

/// Options for a new archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub compression: CompressionType,
    /// Store the activator grid too. Every written entry must then carry one.
    pub include_activator: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression: CompressionType::None,
            include_activator: true,
        }
    }
}

/// Writes history entries to an archive file.
///
/// ```ignore
/// let mut writer = ArchiveWriter::create("run.gsha", 256, 256, 1.0, Default::default())?;
/// for entry in session.history().iter() {
///     writer.write_entry(entry)?;
/// }
/// let stats = writer.finish()?;
/// ```
pub struct ArchiveWriter {
    writer: BufWriter<File>,
    header: ArchiveHeader,
    frame_indices: Vec<FrameIndex>,
    /// Reused payload buffer.
    encode_buffer: Vec<u8>,
}

impl ArchiveWriter {
    pub fn create<P: AsRef<Path>>(
        path: P,
        rows: usize,
        cols: usize,
        dt: f32,
        options: ArchiveOptions,
    ) -> io::Result<Self> {
        if !options.compression.is_supported() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{:?} compression is not available in this build", options.compression),
            ));
        }
        let (rows, cols) = match (u32::try_from(rows), u32::try_from(cols)) {
            (Ok(r), Ok(c)) if r > 0 && c > 0 => (r, c),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Cannot archive a {rows}x{cols} grid"),
                ));
            }
        };

        let mut writer = BufWriter::new(File::create(path)?);
        let header = ArchiveHeader {
            rows,
            cols,
            // Rewritten by finish.
            frame_count: 0,
            dt,
            flags: ArchiveFlags {
                compression: options.compression,
                has_activator: options.include_activator,
            },
        };
        header.write_to(&mut writer)?;

        let frame_size = header.frame_size();
        Ok(Self {
            writer,
            header,
            frame_indices: Vec::new(),
            encode_buffer: Vec::with_capacity(frame_size),
        })
    }

    /// Append one entry. Steps must be strictly increasing.
    pub fn write_entry(&mut self, entry: &HistoryEntry) -> io::Result<()> {
        let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidInput, msg);

        if let Some(last) = self.frame_indices.last() {
            if entry.step <= last.step {
                return Err(invalid(format!(
                    "Step {} does not follow step {}",
                    entry.step, last.step
                )));
            }
        }
        let shape = (self.header.rows as usize, self.header.cols as usize);
        if entry.inhibitor.shape() != shape {
            return Err(invalid(format!(
                "Grid shape {:?} does not match archive shape {:?}",
                entry.inhibitor.shape(),
                shape
            )));
        }

        self.encode_buffer.clear();
        encode_grid(entry.inhibitor.as_slice(), &mut self.encode_buffer);
        if self.header.flags.has_activator {
            let activator = entry.activator.as_ref().ok_or_else(|| {
                invalid(format!("Step {} has no activator grid to archive", entry.step))
            })?;
            encode_grid(activator.as_slice(), &mut self.encode_buffer);
        }

        let offset = self.writer.stream_position()?;
        let payload = compress(
            self.header.flags.compression,
            std::mem::take(&mut self.encode_buffer),
        )?;
        self.writer.write_all(&payload)?;
        self.frame_indices.push(FrameIndex {
            step: entry.step,
            offset,
            size: payload.len() as u64,
        });

        if self.header.flags.compression == CompressionType::None {
            self.encode_buffer = payload;
        }
        Ok(())
    }

    /// Write every entry from `entries`.
    pub fn write_all<'a>(
        &mut self,
        entries: impl IntoIterator<Item = &'a HistoryEntry>,
    ) -> io::Result<()> {
        entries.into_iter().try_for_each(|e| self.write_entry(e))
    }

    pub fn frames_written(&self) -> u64 {
        self.frame_indices.len() as u64
    }

    /// Write the index table and final header.
    pub fn finish(mut self) -> io::Result<ArchiveStats> {
        let index_offset = self.writer.stream_position()?;
        for index in &self.frame_indices {
            index.write_to(&mut self.writer)?;
        }

        self.header.frame_count = self.frame_indices.len() as u64;
        self.writer.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut self.writer)?;
        self.writer.flush()?;

        let frame_count = self.header.frame_count;
        let payload_bytes = index_offset.saturating_sub(ArchiveHeader::SIZE as u64);
        let stats = ArchiveStats {
            frame_count,
            total_bytes: index_offset + frame_count * FrameIndex::SIZE as u64,
            average_frame_size: payload_bytes.checked_div(frame_count).unwrap_or(0),
            compression: self.header.flags.compression,
        };
        log::info!("history archive written: {stats}");
        Ok(stats)
    }
}

/// Summary of a finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveStats {
    pub frame_count: u64,
    pub total_bytes: u64,
    pub average_frame_size: u64,
    pub compression: CompressionType,
}

impl std::fmt::Display for ArchiveStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes total, {} bytes/frame avg ({:?} compression)",
            self.frame_count, self.total_bytes, self.average_frame_size, self.compression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Field;
    use std::fs;
    use tempfile::tempdir;

    fn entry(step: u64, fill: f32) -> HistoryEntry {
        HistoryEntry::from_field(step, &Field::uniform(4, 6, 1.0 - fill, fill), true)
    }

    #[test]
    fn test_writer_sizes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.gsha");

        let mut writer = ArchiveWriter::create(&path, 4, 6, 1.0, Default::default()).unwrap();
        for step in 0..5 {
            writer.write_entry(&entry(step, step as f32 * 0.1)).unwrap();
        }
        assert_eq!(writer.frames_written(), 5);
        let stats = writer.finish().unwrap();

        let frame_size = 4 * 6 * 2 * 4;
        assert_eq!(stats.frame_count, 5);
        assert_eq!(stats.average_frame_size, frame_size);
        assert_eq!(
            fs::metadata(&path).unwrap().len(),
            ArchiveHeader::SIZE as u64 + 5 * (frame_size + FrameIndex::SIZE as u64)
        );
        assert_eq!(stats.total_bytes, fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_writer_rejects_bad_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.gsha");
        let mut writer = ArchiveWriter::create(&path, 4, 6, 1.0, Default::default()).unwrap();

        writer.write_entry(&entry(3, 0.5)).unwrap();
        let err = writer.write_entry(&entry(3, 0.5)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let wrong_shape = HistoryEntry::from_field(4, &Field::uniform(2, 2, 1.0, 0.0), true);
        assert!(writer.write_entry(&wrong_shape).is_err());

        let no_activator = HistoryEntry::from_field(5, &Field::uniform(4, 6, 1.0, 0.0), false);
        assert!(writer.write_entry(&no_activator).is_err());

        assert_eq!(writer.finish().unwrap().frame_count, 1);
    }

    #[test]
    fn test_writer_rejects_empty_grid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.gsha");
        assert!(ArchiveWriter::create(&path, 0, 6, 1.0, Default::default()).is_err());
    }

    #[cfg(not(feature = "lz4"))]
    #[test]
    fn test_lz4_requires_feature() {
        let dir = tempdir().unwrap();
        let options = ArchiveOptions {
            compression: CompressionType::Lz4,
            ..Default::default()
        };
        let err = ArchiveWriter::create(dir.path().join("lz4.gsha"), 4, 4, 1.0, options)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
