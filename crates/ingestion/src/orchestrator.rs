//! Ingestion orchestrator.
//!
//! Drives the archive reader into the store, one archive per unit of work.
//! Row and member problems are absorbed and counted; archive and storage
//! problems end the archive with a failed status. Nothing is rolled back:
//! members stored before a failure stay committed.

use std::fs;
use std::path::Path;

use quote_core::config::IngestionConfig;
use quote_core::{
    ArchiveOutcome, Error, FolderIngestResponse, IngestRequest, IngestResponse, IngestSummary,
    Result, Session,
};
use quote_storage::{Database, QuoteStore};
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveReader, MemberOutcome, ParsedMember};
use crate::member::has_extension;

const MSG_SUCCESS: &str = "Archive ingested successfully.";
const MSG_NOT_FOUND: &str = "ZIP archive not found.";

/// Ingests archives into one quote store.
#[derive(Debug, Clone)]
pub struct Ingestor {
    database: Database,
    config: IngestionConfig,
}

impl Ingestor {
    /// Ingestor writing into `database`.
    pub fn new(database: Database, config: IngestionConfig) -> Self {
        Self { database, config }
    }

    /// Ingest one archive with a freshly acquired store handle.
    ///
    /// Never returns an error: every failure becomes a failed response.
    pub fn ingest_one(&self, request: &IngestRequest) -> IngestResponse {
        let path = request.archive_path.as_path();
        if !path.exists() {
            warn!(path = %path.display(), "Archive not found");
            return IngestResponse::failed(MSG_NOT_FOUND, IngestSummary::default());
        }

        let mut store = match self.database.acquire() {
            Ok(store) => store,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Cannot acquire store");
                return IngestResponse::failed(format!("Ingestion error: {e}"), IngestSummary::default());
            }
        };

        self.ingest_with_store(&mut store, path)
    }

    /// Ingest one archive through an existing handle.
    pub fn ingest_with_store(&self, store: &mut QuoteStore, path: &Path) -> IngestResponse {
        let mut summary = IngestSummary::default();
        match self.run(store, path, &mut summary) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    sessions_created = summary.sessions_created,
                    sessions_existing = summary.sessions_existing,
                    quotes = summary.quotes_upserted,
                    skipped = summary.members_skipped,
                    "Archive ingested"
                );
                IngestResponse::success(MSG_SUCCESS, summary)
            }
            Err(Error::NotFound(_)) => IngestResponse::failed(MSG_NOT_FOUND, summary),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Ingestion failed");
                IngestResponse::failed(format!("Ingestion error: {e}"), summary)
            }
        }
    }

    /// Ingest every archive directly inside `folder`, in listing order.
    ///
    /// Individual archive failures are logged and reported; they never stop
    /// the folder run. Fails only if the folder itself cannot be listed.
    pub fn ingest_folder(&self, folder: &Path) -> Result<FolderIngestResponse> {
        if !folder.is_dir() {
            return Err(Error::not_found(folder));
        }

        let mut outcome = FolderIngestResponse::default();
        for entry in fs::read_dir(folder)? {
            let path = entry?.path();
            if !path.is_file() || !has_extension(&path, &self.config.archive_extension) {
                continue;
            }

            info!(path = %path.display(), "Processing archive");
            let request = IngestRequest { archive_path: path };
            let response = self.ingest_one(&request);
            if !response.is_success() {
                error!(
                    path = %request.archive_path.display(),
                    message = %response.message,
                    "Archive failed; continuing with folder"
                );
            }
            outcome.archives.push(ArchiveOutcome {
                archive_path: request.archive_path,
                response,
            });
        }

        info!(
            folder = %folder.display(),
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            "Folder ingestion complete"
        );
        Ok(outcome)
    }

    fn run(&self, store: &mut QuoteStore, path: &Path, summary: &mut IngestSummary) -> Result<()> {
        let mut reader = ArchiveReader::open(path, &self.config)?;

        for index in 0..reader.len() {
            match reader.read_member(index)? {
                MemberOutcome::Ignored => {}
                MemberOutcome::Rejected { .. } => {
                    summary.csv_members += 1;
                    summary.members_skipped += 1;
                }
                MemberOutcome::Parsed(member) => {
                    summary.csv_members += 1;
                    summary.rows_rejected += member.rejected_rows;
                    store_member(store, reader.archive_name(), &member, summary)?;
                }
            }
        }
        Ok(())
    }
}

fn store_member(
    store: &mut QuoteStore,
    archive_name: &str,
    member: &ParsedMember,
    summary: &mut IngestSummary,
) -> Result<()> {
    let Some(session) = Session::from_quotes(&member.identity, archive_name, &member.quotes) else {
        debug!(member = %member.name, "Skipping member without quotes");
        summary.members_skipped += 1;
        return Ok(());
    };

    if store.session_exists(&session.session_id)? {
        info!(session_id = %session.session_id, "Session already exists; refreshing quotes");
        summary.sessions_existing += 1;
    } else {
        store.insert_session(&session)?;
        summary.sessions_created += 1;
    }

    match store.insert_quotes_bulk(&session.session_id, &member.quotes) {
        Ok(written) => summary.quotes_upserted += written as u64,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            error!(session_id = %session.session_id, error = %e, "Quote batch rejected");
            summary.members_failed += 1;
        }
    }
    Ok(())
}
