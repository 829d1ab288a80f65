//! Site-wide rendering context resolved from the effective settings row.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use profsite_shared::{Person, ProfsiteError, Result, SiteSettings};
use profsite_storage::Storage;

/// Paths and identity used when rendering any page of the site.
///
/// A `None` path means citation processing is off for that render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteContext {
    pub csl_path: Option<PathBuf>,
    pub bib_path: Option<PathBuf>,
    pub main_person: Option<Person>,
}

impl SiteContext {
    /// Whether both the style and the bibliography are available.
    pub fn citations_enabled(&self) -> bool {
        self.csl_path.is_some() && self.bib_path.is_some()
    }
}

/// Load the newest settings row and resolve its style, library and main
/// person. Paths are made absolute under `media_root`.
///
/// Settings reference existing rows (foreign keys are enforced); a library
/// that was never synced has no bibliography yet and resolves to `None`.
#[instrument(skip(storage))]
pub async fn resolve_site(storage: &Storage, media_root: &Path) -> Result<SiteContext> {
    let Some(settings) = storage.latest_site_settings().await? else {
        debug!("no site settings stored");
        return Ok(SiteContext::default());
    };

    let csl_path = match settings.citation_style_id.as_deref() {
        Some(id) => storage
            .get_style(id)
            .await?
            .map(|style| media_root.join(style.file)),
        None => None,
    };

    let bib_path = match settings.library_id.as_deref() {
        Some(id) => storage
            .get_library(id)
            .await?
            .filter(|lib| !lib.bib_file.is_empty())
            .map(|lib| media_root.join(lib.bib_file)),
        None => None,
    };
    if settings.library_id.is_some() && bib_path.is_none() {
        debug!("configured library has not been synced yet");
    }

    let main_person = match settings.main_person_id.as_deref() {
        Some(id) => storage.get_person(id).await?,
        None => None,
    };

    Ok(SiteContext {
        csl_path,
        bib_path,
        main_person,
    })
}

/// Fields to change in the effective settings; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub citation_style_id: Option<String>,
    pub library_id: Option<String>,
    pub main_person_id: Option<String>,
}

/// Append a settings row combining the effective settings with `update`.
///
/// Referenced styles, libraries and people must exist.
#[instrument(skip(storage))]
pub async fn update_settings(storage: &Storage, update: SettingsUpdate) -> Result<SiteSettings> {
    if let Some(id) = update.citation_style_id.as_deref() {
        if storage.get_style(id).await?.is_none() {
            return Err(ProfsiteError::not_found("citation style", id));
        }
    }
    if let Some(id) = update.library_id.as_deref() {
        if storage.get_library(id).await?.is_none() {
            return Err(ProfsiteError::not_found("library", id));
        }
    }
    if let Some(id) = update.main_person_id.as_deref() {
        if storage.get_person(id).await?.is_none() {
            return Err(ProfsiteError::not_found("person", id));
        }
    }

    let current = storage.latest_site_settings().await?.unwrap_or_default();
    let settings = SiteSettings {
        citation_style_id: update.citation_style_id.or(current.citation_style_id),
        library_id: update.library_id.or(current.library_id),
        main_person_id: update.main_person_id.or(current.main_person_id),
    };
    storage.insert_site_settings(&settings).await?;
    Ok(settings)
}
