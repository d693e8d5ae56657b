//! ZIP archive reader.
//!
//! Members are decoded one at a time straight from the compressed stream, so
//! only the member being parsed is ever held in memory.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use quote_core::config::IngestionConfig;
use quote_core::{Error, QuoteTick, Result, SessionIdentity};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::member::{decode_member_name, has_extension};
use crate::rows::decode_rows;

/// A CSV member decoded into identity and rows.
#[derive(Debug, Clone)]
pub struct ParsedMember {
    /// Member name inside the archive.
    pub name: String,
    /// Broker, symbol and session id from the name.
    pub identity: SessionIdentity,
    /// Valid rows in file order.
    pub quotes: Vec<QuoteTick>,
    /// Rows dropped by the decoder.
    pub rejected_rows: u64,
}

/// What reading one archive entry produced.
#[derive(Debug, Clone)]
pub enum MemberOutcome {
    /// Directory or non-CSV entry.
    Ignored,
    /// CSV member whose name or header could not be decoded.
    Rejected { name: String, reason: String },
    /// CSV member decoded; `quotes` may be empty.
    Parsed(ParsedMember),
}

/// Reader over one ZIP archive.
pub struct ArchiveReader {
    archive: ZipArchive<BufReader<File>>,
    archive_name: String,
    config: IngestionConfig,
}

impl ArchiveReader {
    /// Open an archive. Fails with `NotFound` or `Archive` errors.
    pub fn open(path: &Path, config: &IngestionConfig) -> Result<Self> {
        if !path.exists() {
            return Err(Error::not_found(path));
        }
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| Error::archive(format!("{}: {e}", path.display())))?;

        let archive_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(archive = %archive_name, entries = archive.len(), "Opened archive");

        Ok(Self {
            archive,
            archive_name,
            config: config.clone(),
        })
    }

    /// Archive identifier (file name without extension).
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Number of entries in the archive, CSV or not.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Whether the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Decode the entry at `index`, in the archive's internal order.
    ///
    /// Problems confined to the member come back as [`MemberOutcome::Rejected`];
    /// an `Err` means the container itself is unreadable.
    pub fn read_member(&mut self, index: usize) -> Result<MemberOutcome> {
        let file = self
            .archive
            .by_index(index)
            .map_err(|e| Error::archive(format!("{}: entry {index}: {e}", self.archive_name)))?;

        let name = file.name().to_string();
        if file.is_dir() || !has_extension(Path::new(&name), &self.config.csv_extension) {
            debug!(archive = %self.archive_name, member = %name, "Ignoring non-CSV entry");
            return Ok(MemberOutcome::Ignored);
        }

        info!(archive = %self.archive_name, member = %name, "Processing CSV");

        let identity = match decode_member_name(&name) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(archive = %self.archive_name, member = %name, error = %e, "Rejecting member");
                return Ok(MemberOutcome::Rejected { name, reason: e.to_string() });
            }
        };

        let rows = match decode_rows(file, &name, &self.config) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(archive = %self.archive_name, member = %name, error = %e, "Rejecting member");
                return Ok(MemberOutcome::Rejected { name, reason: e.to_string() });
            }
        };

        if rows.quotes.is_empty() {
            warn!(archive = %self.archive_name, member = %name, "No quotes parsed from file");
        } else {
            info!(
                session_id = %identity.session_id,
                quotes = rows.quotes.len(),
                rejected = rows.rejected,
                "Parsed quotes"
            );
        }

        Ok(MemberOutcome::Parsed(ParsedMember {
            name,
            identity,
            quotes: rows.quotes,
            rejected_rows: rows.rejected,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(dir: &TempDir, name: &str, members: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (member, body) in members {
            writer.start_file(*member, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_reads_members_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            &dir,
            "broker1_EURUSD_s1.zip",
            &[
                ("broker1_EURUSD_s1.csv", "Ts,Bid,Ask\n1000,1.1,1.2\n2000,1.15,1.25\n"),
                ("notes.txt", "hello"),
                ("bad.csv", "Ts,Bid,Ask\n1,1,1\n"),
            ],
        );

        let mut reader = ArchiveReader::open(&path, &IngestionConfig::default()).unwrap();
        assert_eq!(reader.archive_name(), "broker1_EURUSD_s1");
        assert_eq!(reader.len(), 3);

        match reader.read_member(0).unwrap() {
            MemberOutcome::Parsed(member) => {
                assert_eq!(member.identity.session_id, "s1");
                assert_eq!(member.quotes.len(), 2);
                assert_eq!(member.rejected_rows, 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(matches!(reader.read_member(1).unwrap(), MemberOutcome::Ignored));
        assert!(matches!(reader.read_member(2).unwrap(), MemberOutcome::Rejected { .. }));
    }

    #[test]
    fn test_missing_archive() {
        let err = ArchiveReader::open(Path::new("/no/such/archive.zip"), &IngestionConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.zip");
        std::fs::write(&path, b"this is not a zip file").unwrap();

        let err = ArchiveReader::open(&path, &IngestionConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Archive(_)));
    }
}
