//! History export to a compact binary archive.
//!
//! An archive is an explicit, one-way export of a session's history for
//! offline playback or analysis. It is not used to restore sessions.
//!
//! # File Format
//!
//! ```text
//! Header (44 bytes):
//!   Magic: "GSHA" (4 bytes)
//!   Version: u16
//!   Flags: u16 (compression in bits 0-3, has_activator in bit 4)
//!   Rows: u32
//!   Cols: u32
//!   Frame count: u64
//!   dt: f32
//!   Reserved: 16 bytes
//!
//! Frame data (variable):
//!   Inhibitor grid, then the activator grid when present,
//!   rows * cols little-endian f32 each, optionally LZ4 compressed
//!
//! Frame index table (frame_count * 24 bytes, at the end of the file):
//!   Step: u64
//!   Offset: u64
//!   Stored size: u64
//! ```

mod format;
mod reader;
mod writer;

pub use format::{
    ARCHIVE_MAGIC, ARCHIVE_VERSION, ArchiveFlags, ArchiveHeader, CompressionType, FrameIndex,
};
pub use reader::{ArchiveReader, FrameIterator};
pub use writer::{ArchiveOptions, ArchiveStats, ArchiveWriter};

use crate::session::SessionError;

/// Failure while exporting a live session.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
