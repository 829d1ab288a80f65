//! Domain workflows for profsite.
//!
//! This crate ties together the Zotero syncer, the markdown renderer,
//! geocoding, and storage into the operations the CLI exposes (e.g.,
//! `refresh_library`, `render_post`).

pub mod institutions;
pub mod library;
pub mod people;
pub mod posts;
pub mod site;
pub mod styles;

pub use library::{
    ProgressReporter, RefreshOutcome, SilentProgress, refresh_library, register_library,
};
pub use site::{SettingsUpdate, SiteContext, resolve_site, update_settings};
