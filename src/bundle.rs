//! Bundle assembly and inspection.
//!
//! ```no_run
//! use appbundle::bundle::{assemble, BundleReader};
//!
//! // Write
//! let summary = assemble("app.bin", "app.json", "firmware.bin", "icons/")?;
//! println!("{} icons", summary.icon_count);
//!
//! // Read
//! let bundle = BundleReader::open("app.bin")?;
//! let descriptor = bundle.descriptor()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Every input is read into memory before the output is touched, and the
//! output is written to a temporary file next to the destination and renamed
//! into place. A failure at any stage leaves no bundle behind.
//!
//! The bundle gets the mode a plain file create would give it (`0666` minus
//! the umask), or keeps the mode of the file it replaces.

use image::DynamicImage;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

use crate::descriptor;
use crate::error::{read_input, BundleError, Stage};
use crate::header::{BundleHeader, HeaderError};
use crate::icon::{discover_icons, encode_icon, encode_image};

// ── BundleSummary ─────────────────────────────────────────────────────────────

/// What [`BundleWriter::finalize`] wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleSummary {
    pub header:     BundleHeader,
    pub icon_count: usize,
}

// ── BundleWriter ──────────────────────────────────────────────────────────────

/// Collects the three sections in memory, then emits the bundle.
#[derive(Debug, Default)]
pub struct BundleWriter {
    descriptor: Vec<u8>,
    icons:      Vec<u8>,
    icon_count: usize,
    binary:     Vec<u8>,
}

impl BundleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Sections ──────────────────────────────────────────────────────────────

    /// Canonicalize the JSON descriptor at `path`.
    pub fn load_descriptor(&mut self, path: &Path) -> Result<(), BundleError> {
        self.descriptor = descriptor::load(path)?;
        debug!(path = %path.display(), bytes = self.descriptor.len(), "loaded descriptor");
        Ok(())
    }

    /// Canonicalize an in-memory JSON descriptor.
    pub fn set_descriptor(&mut self, json: &[u8]) -> Result<(), BundleError> {
        self.descriptor = descriptor::canonicalize(json)
            .map_err(|source| BundleError::Format { path: None, source })?;
        Ok(())
    }

    /// Encode every icon found in `dir`, in index order.
    ///
    /// A missing `icon_0.png` yields an empty icon section. An icon that
    /// exists but fails to decode aborts the whole load.
    pub fn load_icons(&mut self, dir: &Path) -> Result<usize, BundleError> {
        let paths = discover_icons(dir);
        for path in &paths {
            let encoded = encode_icon(path)?;
            self.push_icon_bytes(&encoded);
        }
        debug!(dir = %dir.display(), count = paths.len(), "loaded icons");
        Ok(paths.len())
    }

    pub fn add_icon(&mut self, image: &DynamicImage) {
        let encoded = encode_image(image);
        self.push_icon_bytes(&encoded);
    }

    fn push_icon_bytes(&mut self, encoded: &[u8]) {
        self.icons.extend_from_slice(encoded);
        self.icon_count += 1;
    }

    pub fn load_binary(&mut self, path: &Path) -> Result<(), BundleError> {
        self.binary = read_input(Stage::Binary, path)?;
        debug!(path = %path.display(), bytes = self.binary.len(), "loaded binary payload");
        Ok(())
    }

    pub fn set_binary(&mut self, binary: Vec<u8>) {
        self.binary = binary;
    }

    // ── Output ────────────────────────────────────────────────────────────────

    pub fn icon_count(&self) -> usize {
        self.icon_count
    }

    pub fn header(&self) -> io::Result<BundleHeader> {
        BundleHeader::for_sections(&self.descriptor, &self.icons, &self.binary)
    }

    /// Write header and sections to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<BundleHeader> {
        let header = self.header()?;
        header.write(&mut writer)?;
        writer.write_all(&self.descriptor)?;
        writer.write_all(&self.icons)?;
        writer.write_all(&self.binary)?;
        writer.flush()?;
        Ok(header)
    }

    /// Write the bundle to `output`, replacing any existing file only once
    /// the new one is complete.
    pub fn finalize<P: AsRef<Path>>(&self, output: P) -> Result<BundleSummary, BundleError> {
        let output = output.as_ref();
        let out_err = |e: io::Error| BundleError::io(Stage::Output, output, e);

        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let existing = fs::metadata(output).ok().map(|m| m.permissions());

        let mut tmp = create_temp(dir).map_err(out_err)?;
        let header = self.write_to(BufWriter::new(tmp.as_file_mut())).map_err(out_err)?;
        tmp.as_file().sync_all().map_err(out_err)?;
        if let Some(perms) = existing {
            tmp.as_file().set_permissions(perms).map_err(out_err)?;
        }
        tmp.persist(output).map_err(|e| out_err(e.error))?;

        info!(
            output = %output.display(),
            json_len = header.json_len,
            icon_len = header.icon_len,
            binary_len = header.binary_len,
            icons = self.icon_count,
            "wrote bundle"
        );
        Ok(BundleSummary { header, icon_count: self.icon_count })
    }
}

/// Temporary file in `dir` created with the default file mode rather than
/// tempfile's owner-only one. The kernel applies the umask.
fn create_temp(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix(".appbundle");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

/// Build a bundle from files: JSON descriptor, binary payload and the icon
/// directory, read in that order.
pub fn assemble<O, J, B, I>(output: O, json: J, binary: B, icon_dir: I) -> Result<BundleSummary, BundleError>
where
    O: AsRef<Path>,
    J: AsRef<Path>,
    B: AsRef<Path>,
    I: AsRef<Path>,
{
    let mut writer = BundleWriter::new();
    writer.load_descriptor(json.as_ref())?;
    writer.load_icons(icon_dir.as_ref())?;
    writer.load_binary(binary.as_ref())?;
    writer.finalize(output)
}

// ── BundleReader ──────────────────────────────────────────────────────────────

/// A bundle loaded into memory with its header validated.
#[derive(Debug, Clone)]
pub struct BundleReader {
    header: BundleHeader,
    bytes:  Vec<u8>,
}

impl BundleReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BundleError> {
        let path: PathBuf = path.as_ref().to_owned();
        let bytes = read_input(Stage::Bundle, &path)?;
        Self::from_bytes(bytes).map_err(|source| BundleError::Header { path, source })
    }

    /// Validate `bytes` as a complete bundle.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, HeaderError> {
        let header = BundleHeader::read(&bytes[..])?;
        let actual = bytes.len() as u64;
        if header.total_len() != actual {
            return Err(HeaderError::SizeMismatch { expected: header.total_len(), actual });
        }
        Ok(Self { header, bytes })
    }

    pub fn header(&self) -> &BundleHeader {
        &self.header
    }

    fn section(&self, offset: u64, len: u32) -> &[u8] {
        // Offsets were checked against the buffer length in `from_bytes`.
        let start = offset as usize;
        &self.bytes[start..start + len as usize]
    }

    /// Raw compact JSON section.
    pub fn json(&self) -> &[u8] {
        self.section(self.header.json_offset(), self.header.json_len)
    }

    pub fn descriptor(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(self.json())
    }

    /// Concatenated RGB565 icon streams. Per-icon boundaries are not
    /// recorded in the bundle.
    pub fn icons(&self) -> &[u8] {
        self.section(self.header.icon_offset(), self.header.icon_len)
    }

    pub fn binary(&self) -> &[u8] {
        self.section(self.header.binary_offset(), self.header.binary_len)
    }
}
