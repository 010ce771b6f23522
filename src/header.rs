//! Fixed-size bundle header.
//!
//! Six little-endian `u32` fields, no padding:
//!
//! ```text
//! offset 0:  magic            0x21505041 ("APP!")
//! offset 4:  header_version   1
//! offset 8:  header_len       24
//! offset 12: json_len
//! offset 16: icon_len
//! offset 20: binary_len
//! ```
//!
//! The three sections follow the header back to back, in that order.
//! `header_len` lets a reader skip trailing header fields it does not know.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

pub const MAGIC: u32 = 0x2150_5041;
pub const VERSION: u32 = 1;
/// On-disk size of a version 1 header.
pub const HEADER_SIZE: usize = 24;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Invalid magic number: {0:#010x}")]
    InvalidMagic(u32),
    #[error("Unsupported header version: {0}")]
    UnsupportedVersion(u32),
    #[error("Header length {0} is smaller than the 24-byte minimum")]
    HeaderTooShort(u32),
    #[error("Bundle is {actual} bytes but its header describes {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleHeader {
    pub magic:          u32,
    pub header_version: u32,
    pub header_len:     u32,
    pub json_len:       u32,
    pub icon_len:       u32,
    pub binary_len:     u32,
}

impl BundleHeader {
    pub fn new(json_len: u32, icon_len: u32, binary_len: u32) -> Self {
        Self {
            magic:          MAGIC,
            header_version: VERSION,
            header_len:     HEADER_SIZE as u32,
            json_len,
            icon_len,
            binary_len,
        }
    }

    /// Build a header describing the given section buffers.
    ///
    /// Fails with `InvalidInput` if any section does not fit a `u32` length.
    pub fn for_sections(json: &[u8], icons: &[u8], binary: &[u8]) -> io::Result<Self> {
        Ok(Self::new(
            section_len("json", json)?,
            section_len("icon", icons)?,
            section_len("binary", binary)?,
        ))
    }

    /// Byte offset of the JSON section.
    pub fn json_offset(&self) -> u64 {
        u64::from(self.header_len)
    }

    pub fn icon_offset(&self) -> u64 {
        self.json_offset() + u64::from(self.json_len)
    }

    pub fn binary_offset(&self) -> u64 {
        self.icon_offset() + u64::from(self.icon_len)
    }

    /// Size of the whole bundle this header describes.
    pub fn total_len(&self) -> u64 {
        self.binary_offset() + u64::from(self.binary_len)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.magic)?;
        writer.write_u32::<LittleEndian>(self.header_version)?;
        writer.write_u32::<LittleEndian>(self.header_len)?;
        writer.write_u32::<LittleEndian>(self.json_len)?;
        writer.write_u32::<LittleEndian>(self.icon_len)?;
        writer.write_u32::<LittleEndian>(self.binary_len)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        // A fixed-size slice cannot run short.
        let _ = self.write(&mut buf[..]);
        buf
    }

    /// Read and validate a header, leaving `reader` positioned at the start
    /// of the JSON section. Extra header bytes beyond the known fields are
    /// skipped.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagic(magic));
        }
        let header_version = reader.read_u32::<LittleEndian>()?;
        if header_version != VERSION {
            return Err(HeaderError::UnsupportedVersion(header_version));
        }
        let header_len = reader.read_u32::<LittleEndian>()?;
        if (header_len as usize) < HEADER_SIZE {
            return Err(HeaderError::HeaderTooShort(header_len));
        }
        let json_len = reader.read_u32::<LittleEndian>()?;
        let icon_len = reader.read_u32::<LittleEndian>()?;
        let binary_len = reader.read_u32::<LittleEndian>()?;

        let extra = u64::from(header_len) - HEADER_SIZE as u64;
        if extra > 0 {
            let skipped = io::copy(&mut (&mut reader).take(extra), &mut io::sink())?;
            if skipped != extra {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
        }

        Ok(Self {
            magic,
            header_version,
            header_len,
            json_len,
            icon_len,
            binary_len,
        })
    }
}

fn section_len(name: &str, section: &[u8]) -> io::Result<u32> {
    u32::try_from(section.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{name} section is {} bytes, larger than a u32 length", section.len()),
        )
    })
}
