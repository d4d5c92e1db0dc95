//! # monitorail-parser
//!
//! Schedule ingestion for monitorail.
//!
//! This crate provides:
//! - MSPDI-style XML reading with fallback task container discovery
//! - Converter JSON reading (the MPP conversion service's answer format)
//! - A blocking client for the remote MPP conversion service
//! - Format detection by extension and content
//!
//! ## Example
//!
//! ```rust
//! use monitorail_parser::{ingest, FileFormat};
//!
//! let xml = br#"<Project xmlns="http://schemas.microsoft.com/project">
//!   <Name>Lotto 2</Name>
//!   <Tasks>
//!     <Task><UID>1</UID><Name>Scavo</Name><PercentComplete>40</PercentComplete></Task>
//!     <Task><UID>2</UID><Name>Posa</Name><PredecessorLink><PredecessorUID>1</PredecessorUID></PredecessorLink></Task>
//!   </Tasks>
//! </Project>"#;
//!
//! let ingested = ingest(xml, FileFormat::Xml, "lotto2.xml").unwrap();
//! assert_eq!(ingested.schedule.project_name, "Lotto 2");
//! assert_eq!(ingested.schedule.len(), 2);
//! assert_eq!(ingested.log[0].message, "total activities read: 2");
//! ```

mod assemble;
pub mod fields;
mod json;
pub mod remote;
pub mod values;
pub mod xml;

pub use remote::{ConversionClient, RemoteServiceError, ServiceConfig};
pub use xml::ContainerStrategy;

use std::path::Path;

use monitorail_core::{Diagnostic, Schedule};
use thiserror::Error;
use tracing::info;

/// Compound File Binary (OLE2) signature used by `.mpp` files
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Ingestion error
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unreadable or corrupt file: {0}")]
    Unreadable(String),

    #[error("no activities found; check export format")]
    NoActivities,

    #[error("MPP files cannot be read directly: re-export as XML or configure the conversion service")]
    MppRequiresConversion,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// MSPDI-style XML export
    Xml,
    /// Converter JSON
    Json,
    /// Binary Microsoft Project file
    Mpp,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Xml => "xml",
            FileFormat::Json => "json",
            FileFormat::Mpp => "mpp",
        }
    }
}

/// A schedule plus the log written while reading it
#[derive(Clone, Debug, PartialEq)]
pub struct Ingested {
    pub schedule: Schedule,
    pub log: Vec<Diagnostic>,
}

/// Detect the format from the extension, then from the content
pub fn detect_format(path: &Path, bytes: &[u8]) -> Result<FileFormat, FormatError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("xml") => return Ok(FileFormat::Xml),
        Some("json") => return Ok(FileFormat::Json),
        Some("mpp") => return Ok(FileFormat::Mpp),
        _ => {}
    }

    if bytes.starts_with(OLE2_MAGIC) {
        return Ok(FileFormat::Mpp);
    }
    let content = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match content.iter().copied().find(|b| !b.is_ascii_whitespace()) {
        Some(b'<') => Ok(FileFormat::Xml),
        Some(b'{') => Ok(FileFormat::Json),
        _ => Err(FormatError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Read a schedule from bytes.
///
/// `Mpp` is rejected with [`FormatError::MppRequiresConversion`]; route it
/// through [`ConversionClient`] instead.
pub fn ingest(
    bytes: &[u8],
    format: FileFormat,
    source_name: &str,
) -> Result<Ingested, FormatError> {
    info!(source = source_name, format = format.as_str(), "ingesting schedule");
    let raw = match format {
        FileFormat::Xml => xml::read_xml(bytes)?,
        FileFormat::Json => json::read_json(bytes)?,
        FileFormat::Mpp => return Err(FormatError::MppRequiresConversion),
    };
    assemble::assemble(raw, source_name)
}

/// Read a schedule file, detecting its format
pub fn ingest_file(path: &Path) -> Result<Ingested, FormatError> {
    let bytes = std::fs::read(path)?;
    let format = detect_format(path, &bytes)?;
    ingest(&bytes, format, &source_name(path))
}

/// File name used as the schedule's source label
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or_else(|| path.display().to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_extension() {
        assert_eq!(detect_format(Path::new("a.XML"), b"").unwrap(), FileFormat::Xml);
        assert_eq!(detect_format(Path::new("a.json"), b"").unwrap(), FileFormat::Json);
        assert_eq!(detect_format(Path::new("a.mpp"), b"").unwrap(), FileFormat::Mpp);
    }

    #[test]
    fn detect_by_content() {
        assert_eq!(
            detect_format(Path::new("export"), b"\xEF\xBB\xBF  <?xml version=\"1.0\"?>").unwrap(),
            FileFormat::Xml
        );
        assert_eq!(
            detect_format(Path::new("export.txt"), b"\n{\"tasks\":[]}").unwrap(),
            FileFormat::Json
        );
        let mut ole = OLE2_MAGIC.to_vec();
        ole.extend_from_slice(&[0; 16]);
        assert_eq!(detect_format(Path::new("export.bin"), &ole).unwrap(), FileFormat::Mpp);
    }

    #[test]
    fn detect_unknown() {
        assert!(matches!(
            detect_format(Path::new("notes.txt"), b"hello"),
            Err(FormatError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn mpp_requires_conversion() {
        let err = ingest(b"\xD0\xCF\x11\xE0", FileFormat::Mpp, "x.mpp").unwrap_err();
        assert!(matches!(err, FormatError::MppRequiresConversion));
        assert!(err.to_string().contains("re-export as XML"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ingest_file(Path::new("/nonexistent/dir/plan.xml")).unwrap_err();
        assert!(matches!(err, FormatError::Io(_)));
    }

    #[test]
    fn ingest_file_uses_file_name_as_source() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::with_suffix(".xml").unwrap();
        write!(file, "<Project><Tasks><Task><UID>1</UID><Name>A</Name></Task></Tasks></Project>")
            .unwrap();

        let ingested = ingest_file(file.path()).unwrap();
        let expected = source_name(file.path());
        assert_eq!(ingested.schedule.source.as_deref(), Some(expected.as_str()));
    }
}
