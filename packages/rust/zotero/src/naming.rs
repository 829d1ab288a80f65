//! Deterministic naming of mirrored bibliography files.
//!
//! A target maps to exactly one file under `bibs/`:
//! - whole library: `bibs/library_{libraryId}.bib`
//! - collection: `bibs/collection_{libraryId}_{collectionKey}.bib`

use profsite_shared::LibraryTarget;

/// Subdirectory of the media root holding mirrored bibliographies.
pub const BIBS_DIR: &str = "bibs";

/// File name (without directory) for a target.
pub fn bib_file_name(target: &LibraryTarget) -> String {
    match target.collection_key() {
        Some(key) => format!("collection_{}_{key}.bib", target.library_id),
        None => format!("library_{}.bib", target.library_id),
    }
}

/// Path relative to the media root, always `/`-separated.
pub fn bib_rel_path(target: &LibraryTarget) -> String {
    format!("{BIBS_DIR}/{}", bib_file_name(target))
}
