//! Core domain types for profsite records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProfsiteError;

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for stored record identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Generate a new time-sortable record identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Zotero library addressing
// ---------------------------------------------------------------------------

/// Ownership kind of a Zotero library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    User,
    Group,
}

impl LibraryKind {
    /// Stored/displayed form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }

    /// URL path prefix used by the Zotero Web API.
    pub fn api_segment(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Group => "groups",
        }
    }
}

impl std::fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LibraryKind {
    type Err = ProfsiteError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            other => Err(ProfsiteError::validation(format!(
                "unknown library kind '{other}': expected 'user' or 'group'"
            ))),
        }
    }
}

/// Addresses one remote bibliography: a whole library or one of its collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryTarget {
    /// Numeric Zotero library id.
    pub library_id: u64,
    /// Ownership kind.
    pub kind: LibraryKind,
    /// Optional collection key within the library.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl LibraryTarget {
    /// Collection key, treating an empty string as "no collection".
    pub fn collection_key(&self) -> Option<&str> {
        self.collection.as_deref().filter(|c| !c.is_empty())
    }

    /// Reject collection keys that are not plain ASCII alphanumerics.
    ///
    /// The key becomes part of a file name under `bibs/`.
    pub fn validate(&self) -> Result<(), ProfsiteError> {
        if let Some(key) = self.collection_key() {
            let ok = key.len() <= MAX_COLLECTION_KEY_LEN
                && key.chars().all(|c| c.is_ascii_alphanumeric());
            if !ok {
                return Err(ProfsiteError::validation(format!(
                    "invalid collection key '{key}': expected up to {MAX_COLLECTION_KEY_LEN} ASCII letters or digits"
                )));
            }
        }
        Ok(())
    }
}

/// Longest collection key accepted (Zotero issues 8-character keys).
const MAX_COLLECTION_KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// A Zotero library whose bibliography is mirrored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: String,
    /// Human-readable name.
    pub name: String,
    pub target: LibraryTarget,
    /// Remote version at last successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Bibliography path relative to the media root (empty before first sync).
    pub bib_file: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An uploaded CSL style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationStyle {
    pub id: String,
    pub name: String,
    /// Style path relative to the media root (`citestyles/...`).
    pub file: String,
    pub created_at: DateTime<Utc>,
}

/// One row of site-wide settings; the newest row wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_style_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_id: Option<String>,
    /// Person the site is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_person_id: Option<String>,
}

/// A person featured on the site: the site owner, coauthors, students.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub first: String,
    #[serde(default)]
    pub middle: String,
    pub last: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    /// ORCID iD, `0000-0000-0000-000X` form.
    #[serde(default)]
    pub orcid: String,
    /// Markdown biography.
    #[serde(default)]
    pub bio: String,
    pub slug: String,
}

impl Person {
    /// "First Middle Last", skipping an empty middle name.
    pub fn full_name(&self) -> String {
        [&self.first, &self.middle, &self.last]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A blog post whose markdown may cite entries of the site bibliography.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub display_datetime: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// WGS84 point, longitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lng: f64,
    pub lat: f64,
}

/// An institution with an optional geocoded location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Institution {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub postal: String,
    pub country: String,
    #[serde(default)]
    pub website: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Point>,
}

impl Institution {
    /// Geocoding query: the non-empty address parts joined by commas.
    pub fn address_query(&self) -> String {
        [
            &self.address,
            &self.city,
            &self.state,
            &self.postal,
            &self.country,
        ]
        .into_iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_roundtrip() {
        let id = RecordId::new();
        let s = id.to_string();
        let parsed: RecordId = s.parse().expect("parse RecordId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn library_kind_parsing() {
        assert_eq!("user".parse::<LibraryKind>().unwrap(), LibraryKind::User);
        assert_eq!("group".parse::<LibraryKind>().unwrap(), LibraryKind::Group);
        assert!("org".parse::<LibraryKind>().is_err());
        assert_eq!(LibraryKind::Group.api_segment(), "groups");
    }

    #[test]
    fn empty_collection_is_no_collection() {
        let target = LibraryTarget {
            library_id: 7,
            kind: LibraryKind::User,
            collection: Some(String::new()),
        };
        assert_eq!(target.collection_key(), None);
    }

    #[test]
    fn collection_keys_must_be_plain_alphanumerics() {
        let with = |key: &str| LibraryTarget {
            library_id: 1,
            kind: LibraryKind::Group,
            collection: Some(key.into()),
        };
        assert!(with("ABCD2345").validate().is_ok());
        assert!(with("").validate().is_ok());
        for bad in ["../etc", "a/b", "..", "AB CD", "ключ"] {
            let err = with(bad).validate().unwrap_err();
            assert!(matches!(err, ProfsiteError::Validation { .. }), "{bad}");
        }
        assert!(with(&"A".repeat(33)).validate().is_err());
    }

    #[test]
    fn full_name_skips_empty_middle() {
        let person = Person {
            first: "Ada".into(),
            last: "Lovelace".into(),
            ..Default::default()
        };
        assert_eq!(person.full_name(), "Ada Lovelace");
        let person = Person {
            middle: "King".into(),
            ..person
        };
        assert_eq!(person.full_name(), "Ada King Lovelace");
    }

    #[test]
    fn institution_query_skips_blank_parts() {
        let inst = Institution {
            name: "DUSP".into(),
            address: "77 Massachusetts Ave".into(),
            city: "Cambridge".into(),
            state: "MA".into(),
            postal: String::new(),
            country: "USA".into(),
            ..Default::default()
        };
        assert_eq!(
            inst.address_query(),
            "77 Massachusetts Ave,Cambridge,MA,USA"
        );
    }

    #[test]
    fn target_serialization_omits_missing_collection() {
        let target = LibraryTarget {
            library_id: 123,
            kind: LibraryKind::Group,
            collection: None,
        };
        let json = serde_json::to_string(&target).expect("serialize");
        assert_eq!(json, r#"{"library_id":123,"kind":"group"}"#);
    }
}
