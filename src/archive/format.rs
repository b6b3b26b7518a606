//! Binary layout of history archives.

use std::io::{self, Read, Write};

/// Magic bytes identifying a Gray-Scott history archive.
pub const ARCHIVE_MAGIC: &[u8; 4] = b"GSHA";

/// Current format version.
pub const ARCHIVE_VERSION: u16 = 1;

/// Compression applied to frame payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    #[default]
    None = 0,
    /// LZ4 block compression (requires the `lz4` feature).
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }

    /// Whether this build can read and write the compression type.
    pub fn is_supported(self) -> bool {
        match self {
            CompressionType::None => true,
            CompressionType::Lz4 => cfg!(feature = "lz4"),
        }
    }

    /// Largest stored payload that can decode to `raw_len` bytes.
    pub fn max_stored_size(self, raw_len: usize) -> usize {
        match self {
            CompressionType::None => raw_len,
            #[cfg(feature = "lz4")]
            CompressionType::Lz4 => 4 + lz4_flex::block::get_maximum_output_size(raw_len),
            #[cfg(not(feature = "lz4"))]
            CompressionType::Lz4 => raw_len,
        }
    }
}

/// Header flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveFlags {
    /// Lower 4 bits.
    pub compression: CompressionType,
    /// Frames carry the activator grid after the inhibitor grid.
    pub has_activator: bool,
}

impl ArchiveFlags {
    const HAS_ACTIVATOR: u16 = 1 << 4;

    pub fn to_u16(self) -> u16 {
        let mut flags = self.compression as u16;
        if self.has_activator {
            flags |= Self::HAS_ACTIVATOR;
        }
        flags
    }

    pub fn from_u16(v: u16) -> io::Result<Self> {
        let compression = CompressionType::from_u8((v & 0x0F) as u8).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown compression type {}", v & 0x0F),
            )
        })?;
        Ok(Self {
            compression,
            has_activator: v & Self::HAS_ACTIVATOR != 0,
        })
    }
}

/// Archive file header.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveHeader {
    pub rows: u32,
    pub cols: u32,
    /// Number of frames in the index table.
    pub frame_count: u64,
    /// Time step the history was computed with when export started.
    pub dt: f32,
    pub flags: ArchiveFlags,
}

impl ArchiveHeader {
    /// Magic(4) + Version(2) + Flags(2) + Rows(4) + Cols(4) + FrameCount(8) +
    /// dt(4) + Reserved(16) = 44
    pub const SIZE: usize = 44;

    pub fn grid_len(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Grids stored per frame.
    pub fn grids_per_frame(&self) -> usize {
        if self.flags.has_activator { 2 } else { 1 }
    }

    /// Uncompressed frame payload size in bytes.
    pub fn frame_size(&self) -> usize {
        self.grid_len() * self.grids_per_frame() * 4
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(ARCHIVE_MAGIC)?;
        w.write_all(&ARCHIVE_VERSION.to_le_bytes())?;
        w.write_all(&self.flags.to_u16().to_le_bytes())?;
        w.write_all(&self.rows.to_le_bytes())?;
        w.write_all(&self.cols.to_le_bytes())?;
        w.write_all(&self.frame_count.to_le_bytes())?;
        w.write_all(&self.dt.to_le_bytes())?;
        w.write_all(&[0u8; 16])?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != ARCHIVE_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid GSHA magic bytes",
            ));
        }

        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf2)?;
        let version = u16::from_le_bytes(buf2);
        if version != ARCHIVE_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported GSHA version: {}", version),
            ));
        }

        r.read_exact(&mut buf2)?;
        let flags = ArchiveFlags::from_u16(u16::from_le_bytes(buf2))?;

        r.read_exact(&mut buf4)?;
        let rows = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let cols = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf8)?;
        let frame_count = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf4)?;
        let dt = f32::from_le_bytes(buf4);

        let mut reserved = [0u8; 16];
        r.read_exact(&mut reserved)?;

        Ok(Self {
            rows,
            cols,
            frame_count,
            dt,
            flags,
        })
    }
}

/// Index table entry for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndex {
    /// History step the frame was recorded at.
    pub step: u64,
    /// Byte offset from the start of the file.
    pub offset: u64,
    /// Stored payload size in bytes.
    pub size: u64,
}

impl FrameIndex {
    pub const SIZE: usize = 24;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.step.to_le_bytes())?;
        w.write_all(&self.offset.to_le_bytes())?;
        w.write_all(&self.size.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf8)?;
        let step = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf8)?;
        let offset = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf8)?;
        let size = u64::from_le_bytes(buf8);

        Ok(Self { step, offset, size })
    }
}

/// Append `data` to `out` as little-endian f32.
pub fn encode_grid(data: &[f32], out: &mut Vec<u8>) {
    out.reserve(data.len() * 4);
    for &v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Decode little-endian f32 bytes.
pub fn decode_grid(bytes: &[u8]) -> io::Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Grid payload of {} bytes is not whole f32s", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(feature = "lz4")]
pub fn compress(compression: CompressionType, data: Vec<u8>) -> io::Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data),
        CompressionType::Lz4 => Ok(lz4_flex::compress_prepend_size(&data)),
    }
}

#[cfg(feature = "lz4")]
pub fn decompress(compression: CompressionType, data: Vec<u8>) -> io::Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data),
        CompressionType::Lz4 => lz4_flex::decompress_size_prepended(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
    }
}

#[cfg(not(feature = "lz4"))]
pub fn compress(compression: CompressionType, data: Vec<u8>) -> io::Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data),
        CompressionType::Lz4 => Err(lz4_unsupported()),
    }
}

#[cfg(not(feature = "lz4"))]
pub fn decompress(compression: CompressionType, data: Vec<u8>) -> io::Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data),
        CompressionType::Lz4 => Err(lz4_unsupported()),
    }
}

#[cfg(not(feature = "lz4"))]
fn lz4_unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "LZ4 archives require the `lz4` feature",
    )
}
