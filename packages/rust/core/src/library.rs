//! Library registration and the version-gated bibliography refresh.
//!
//! A stored library is only re-downloaded when its remote version moved or
//! the local snapshot disappeared. A library that has never been synced is
//! always downloaded in full.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, instrument};

use profsite_shared::{Library, LibraryTarget, ProfsiteError, RecordId, Result};
use profsite_storage::Storage;
use profsite_zotero::{BibliographySource, SyncOutcome};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for long-running network phases.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the refresh completes.
    fn done(&self, outcome: &RefreshOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _outcome: &RefreshOutcome) {}
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

/// Result of [`refresh_library`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Remote version matched and the snapshot is on disk; nothing fetched.
    Unchanged,
    /// A full download ran and its result was persisted.
    Synced { version: i64, bib_file: String },
}

/// Bring the local bibliography of `library` up to date.
///
/// With no stored version this always performs a full sync. Otherwise the
/// remote version is checked first and the item download is skipped when it
/// equals the stored one and `<media_root>/<bib_file>` exists.
#[instrument(skip_all, fields(library = %library.id, name = %library.name))]
pub async fn refresh_library<S: BibliographySource>(
    source: &S,
    storage: &Storage,
    library: &Library,
    media_root: &Path,
    progress: &dyn ProgressReporter,
) -> Result<RefreshOutcome> {
    if let Some(stored) = library.version {
        progress.phase("Checking remote version");
        let remote = source.current_remote_version(&library.target).await?;
        let on_disk = snapshot_exists(media_root, &library.bib_file);

        if remote == stored && on_disk {
            info!(version = stored, "bibliography up to date");
            let outcome = RefreshOutcome::Unchanged;
            progress.done(&outcome);
            return Ok(outcome);
        }
        debug!(stored, remote, on_disk, "bibliography is stale");
    }

    progress.phase("Downloading bibliography");
    let SyncOutcome {
        version,
        bib_file,
        entries,
    } = source.sync(&library.target).await?;

    storage
        .record_library_sync(&library.id, version, &bib_file)
        .await?;
    debug!(version, entries, "library record updated");

    let outcome = RefreshOutcome::Synced { version, bib_file };
    progress.done(&outcome);
    Ok(outcome)
}

fn snapshot_exists(media_root: &Path, bib_file: &str) -> bool {
    !bib_file.is_empty() && media_root.join(bib_file).is_file()
}

/// Store a new, never-synced library record.
pub async fn register_library(
    storage: &Storage,
    name: &str,
    target: LibraryTarget,
) -> Result<Library> {
    if name.trim().is_empty() {
        return Err(ProfsiteError::validation("library name must not be empty"));
    }
    target.validate()?;

    let now = Utc::now();
    let library = Library {
        id: RecordId::new().to_string(),
        name: name.trim().to_string(),
        target,
        version: None,
        bib_file: String::new(),
        created_at: now,
        updated_at: now,
    };
    storage.insert_library(&library).await?;
    info!(id = %library.id, "library registered");
    Ok(library)
}
