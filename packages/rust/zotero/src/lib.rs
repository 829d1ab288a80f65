//! Zotero bibliography syncer.
//!
//! Mirrors a remote Zotero library (or one of its collections) into a local
//! BibTeX file under `<media_root>/bibs/`, and exposes the remote version
//! counter so callers can skip redundant fetches.

mod naming;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use profsite_shared::{LibraryTarget, ProfsiteError, Result, SyncConfig};
use regex::Regex;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, instrument};

pub use naming::{BIBS_DIR, bib_file_name, bib_rel_path};

/// Zotero Web API version we speak.
const API_VERSION: &str = "3";

/// Upper bound the API accepts for `limit`.
const MAX_PAGE_SIZE: u32 = 100;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("profsite/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of a completed sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Remote version the file reflects.
    pub version: i64,
    /// Path of the written file, relative to the media root.
    pub bib_file: String,
    /// Number of BibTeX entries written.
    pub entries: usize,
}

/// Something that can report a remote bibliography version and mirror it to disk.
///
/// [`ZoteroSyncer`] is the production implementation; the library refresh
/// policy is written against this trait.
pub trait BibliographySource {
    /// Current remote version counter for `target`.
    fn current_remote_version(
        &self,
        target: &LibraryTarget,
    ) -> impl Future<Output = Result<i64>>;

    /// Fetch every entry of `target` and overwrite its local file.
    fn sync(&self, target: &LibraryTarget) -> impl Future<Output = Result<SyncOutcome>>;
}

// ---------------------------------------------------------------------------
// API client
// ---------------------------------------------------------------------------

/// Only the field we read from collection and item objects.
#[derive(Debug, Deserialize)]
struct Versioned {
    version: i64,
}

/// Thin client over the read-only endpoints we need.
#[derive(Debug, Clone)]
pub struct ZoteroClient {
    client: Client,
    api_base: String,
    api_key: String,
    page_size: u32,
}

impl ZoteroClient {
    /// Build a client from resolved sync settings.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProfsiteError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }

    /// `<base>/users/<id>` or `<base>/groups/<id>`.
    fn library_url(&self, target: &LibraryTarget) -> String {
        format!(
            "{}/{}/{}",
            self.api_base,
            target.kind.api_segment(),
            target.library_id
        )
    }

    /// Item listing endpoint for the target (whole library or one collection).
    fn items_url(&self, target: &LibraryTarget) -> String {
        match target.collection_key() {
            Some(key) => format!("{}/collections/{key}/items", self.library_url(target)),
            None => format!("{}/items", self.library_url(target)),
        }
    }

    /// Version counter of the collection, or of the most recently modified item.
    #[instrument(skip_all, fields(library = target.library_id, kind = %target.kind))]
    pub async fn current_version(&self, target: &LibraryTarget) -> Result<i64> {
        let version = match target.collection_key() {
            Some(key) => {
                let url = format!("{}/collections/{key}", self.library_url(target));
                let response = self.get(&url, &[]).await?;
                let collection: Versioned = parse_json(&url, response).await?;
                collection.version
            }
            None => {
                let url = self.items_url(target);
                let response = self
                    .get(
                        &url,
                        &[
                            ("limit", "1".to_string()),
                            ("sort", "dateModified".to_string()),
                            ("direction", "desc".to_string()),
                        ],
                    )
                    .await?;
                let items: Vec<Versioned> = parse_json(&url, response).await?;
                // An empty library has never been modified.
                items.first().map_or(0, |item| item.version)
            }
        };

        debug!(version, "remote version");
        Ok(version)
    }

    /// Fetch every entry of the target as BibTeX, following pagination to the end.
    ///
    /// Pages are requested with `start`/`limit`; the `Total-Results` header
    /// bounds the loop. Without that header, an empty page ends it.
    #[instrument(skip_all, fields(library = target.library_id, kind = %target.kind))]
    pub async fn fetch_bibtex(&self, target: &LibraryTarget) -> Result<String> {
        let url = self.items_url(target);
        let mut start: u64 = 0;
        let mut pages = Vec::new();

        loop {
            let response = self
                .get(
                    &url,
                    &[
                        ("format", "bibtex".to_string()),
                        ("start", start.to_string()),
                        ("limit", self.page_size.to_string()),
                    ],
                )
                .await?;

            let total = total_results(&response);
            let body = response
                .text()
                .await
                .map_err(|e| ProfsiteError::Network(format!("{url}: failed to read body: {e}")))?;

            let page = body.trim();
            debug!(start, total, bytes = page.len(), "fetched bibtex page");

            if page.is_empty() {
                break;
            }
            pages.push(page.to_string());

            start += u64::from(self.page_size);
            match total {
                Some(total) if start >= total => break,
                _ => {}
            }
        }

        let mut bibtex = pages.join("\n\n");
        if !bibtex.is_empty() {
            bibtex.push('\n');
        }
        Ok(bibtex)
    }

    /// Authenticated GET; non-success statuses become [`ProfsiteError::Remote`].
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header("Zotero-API-Key", &self.api_key)
            .header("Zotero-API-Version", API_VERSION)
            .query(query)
            .send()
            .await
            .map_err(|e| ProfsiteError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfsiteError::Remote {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

/// Parse the `Total-Results` header, if present and numeric.
fn total_results(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("Total-Results")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

async fn parse_json<T: serde::de::DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ProfsiteError::parse(format!("{url}: unexpected response body: {e}")))
}

/// Count BibTeX entries (`@type{` at the start of a line).
pub fn count_entries(bibtex: &str) -> usize {
    static ENTRY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^\s*@[A-Za-z]+\s*\{").expect("valid regex"));

    ENTRY_RE.find_iter(bibtex).count()
}

// ---------------------------------------------------------------------------
// Syncer
// ---------------------------------------------------------------------------

/// Mirrors Zotero targets into `<media_root>/bibs/`.
#[derive(Debug, Clone)]
pub struct ZoteroSyncer {
    client: ZoteroClient,
    media_root: PathBuf,
}

impl ZoteroSyncer {
    /// Create a syncer from resolved sync settings.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        Ok(Self {
            client: ZoteroClient::new(config)?,
            media_root: config.media_root.clone(),
        })
    }

    /// Media root files are written under.
    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Access the underlying API client.
    pub fn client(&self) -> &ZoteroClient {
        &self.client
    }
}

impl BibliographySource for ZoteroSyncer {
    async fn current_remote_version(&self, target: &LibraryTarget) -> Result<i64> {
        self.client.current_version(target).await
    }

    /// Writes the file in place. A crash mid-write leaves a truncated file,
    /// and concurrent syncs of one target race on the same path.
    #[instrument(skip_all, fields(library = target.library_id, collection = ?target.collection_key()))]
    async fn sync(&self, target: &LibraryTarget) -> Result<SyncOutcome> {
        target.validate()?;
        let version = self.client.current_version(target).await?;
        let bibtex = self.client.fetch_bibtex(target).await?;

        let bibs_dir = self.media_root.join(BIBS_DIR);
        std::fs::create_dir_all(&bibs_dir).map_err(|e| ProfsiteError::io(&bibs_dir, e))?;

        let path = bibs_dir.join(bib_file_name(target));
        std::fs::write(&path, &bibtex).map_err(|e| ProfsiteError::io(&path, e))?;

        let entries = count_entries(&bibtex);
        let bib_file = bib_rel_path(target);
        info!(version, entries, %bib_file, "bibliography synced");

        Ok(SyncOutcome {
            version,
            bib_file,
            entries,
        })
    }
}
