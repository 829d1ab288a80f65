//! Shared types, error model, and configuration for profsite.
//!
//! This crate is the foundation depended on by all other profsite crates.
//! It provides:
//! - [`ProfsiteError`], the unified error type
//! - Domain types ([`Library`], [`LibraryTarget`], [`Person`], [`Post`], [`Institution`], [`RecordId`])
//! - Configuration ([`AppConfig`], [`SyncConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, OpenCageConfig, PandocConfig, SiteConfig, SyncConfig, ZoteroConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    validate_api_base,
};
pub use error::{ProfsiteError, Result};
pub use types::{
    CitationStyle, Institution, Library, LibraryKind, LibraryTarget, Person, Point, Post,
    RecordId, SiteSettings,
};
