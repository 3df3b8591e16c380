//! Multipart request bodies
//!
//! Mutating operations send `multipart/form-data`. Parts built from a reader are spooled
//! to a temporary file so the body can be re-read by the HTTP engine; the transport
//! releases those files once the exchange is over, whatever its outcome.

use bytes::Bytes;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Payload of a single part
#[derive(Debug)]
pub enum PartContent {
    /// Plain form field
    Text(String),
    /// In-memory file part
    Bytes(Bytes),
    /// File part spooled to disk
    Spooled { file: NamedTempFile, len: u64 },
}

/// One named part of a multipart body
#[derive(Debug)]
pub struct Part {
    name: String,
    content: PartContent,
}

impl Part {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &PartContent {
        &self.content
    }

    /// File parts are sent with a file name, plain fields are not
    pub fn is_file(&self) -> bool {
        !matches!(self.content, PartContent::Text(_))
    }

    pub fn len(&self) -> u64 {
        match &self.content {
            PartContent::Text(value) => value.len() as u64,
            PartContent::Bytes(bytes) => bytes.len() as u64,
            PartContent::Spooled { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the whole part into memory
    pub fn to_bytes(&self) -> io::Result<Bytes> {
        match &self.content {
            PartContent::Text(value) => Ok(Bytes::from(value.clone())),
            PartContent::Bytes(bytes) => Ok(bytes.clone()),
            PartContent::Spooled { file, .. } => {
                let mut reader = file.reopen()?;
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// An ordered multipart body
#[derive(Debug, Default)]
pub struct MultipartBody {
    parts: Vec<Part>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain form field
    pub fn add_text(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parts.push(Part {
            name: name.into(),
            content: PartContent::Text(value.into()),
        });
        self
    }

    /// Add a file part held in memory
    pub fn add_bytes(&mut self, name: impl Into<String>, bytes: impl Into<Bytes>) -> &mut Self {
        self.parts.push(Part {
            name: name.into(),
            content: PartContent::Bytes(bytes.into()),
        });
        self
    }

    /// Add a file part by spooling `reader` into a temporary file
    pub fn add_reader<R: Read>(&mut self, name: impl Into<String>, mut reader: R) -> io::Result<&mut Self> {
        let mut file = NamedTempFile::new()?;
        let len = io::copy(&mut reader, file.as_file_mut())?;
        file.as_file_mut().seek(SeekFrom::Start(0))?;
        self.parts.push(Part {
            name: name.into(),
            content: PartContent::Spooled { file, len },
        });
        Ok(self)
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Paths of temporary files backing spooled parts
    pub fn spooled_paths(&self) -> Vec<PathBuf> {
        self.parts
            .iter()
            .filter_map(|p| match &p.content {
                PartContent::Spooled { file, .. } => Some(file.path().to_path_buf()),
                _ => None,
            })
            .collect()
    }

    /// Short description used in request diagnostics, e.g. `pid=5B, object=[file 120B]`
    pub fn summary(&self) -> String {
        self.parts
            .iter()
            .map(|p| {
                if p.is_file() {
                    format!("{}=[file {}B]", p.name, p.len())
                } else {
                    format!("{}={}B", p.name, p.len())
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Delete every spooled temporary file.
    pub fn release(self) {
        for part in self.parts {
            if let PartContent::Spooled { file, .. } = part.content {
                let path = file.path().to_path_buf();
                if let Err(e) = file.close() {
                    log::warn!("Failed to remove spooled multipart file {}: {}", path.display(), e);
                }
            }
        }
    }
}

impl fmt::Display for MultipartBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_and_lookup() {
        let mut body = MultipartBody::new();
        body.add_text("pid", "abc").add_bytes("object", vec![0u8; 10]);

        assert_eq!(body.summary(), "pid=3B, object=[file 10B]");
        assert!(body.part("object").unwrap().is_file());
        assert!(!body.part("pid").unwrap().is_file());
        assert!(body.part("missing").is_none());
    }

    #[test]
    fn test_spooled_part_is_readable_and_released() {
        let mut body = MultipartBody::new();
        body.add_reader("sysmeta", &b"<systemMetadata/>"[..]).unwrap();

        let paths = body.spooled_paths();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].exists());
        assert_eq!(body.part("sysmeta").unwrap().len(), 17);
        assert_eq!(&body.part("sysmeta").unwrap().to_bytes().unwrap()[..], b"<systemMetadata/>");

        body.release();
        assert!(!paths[0].exists());
    }
}
