//! SQL migration definitions for the profsite database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements; the batch records its own
//! version in `schema_migrations`.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Bibliography schema: libraries, citation_styles, people, site_settings",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Mirrored Zotero libraries
CREATE TABLE IF NOT EXISTS libraries (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    zotero_id   INTEGER NOT NULL,
    kind        TEXT NOT NULL CHECK (kind IN ('user', 'group')),
    collection  TEXT,
    version     INTEGER,
    bib_file    TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Uploaded CSL styles
CREATE TABLE IF NOT EXISTS citation_styles (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    file       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- People featured on the site
CREATE TABLE IF NOT EXISTS people (
    id         TEXT PRIMARY KEY,
    first      TEXT NOT NULL,
    middle     TEXT NOT NULL DEFAULT '',
    last       TEXT NOT NULL,
    email      TEXT NOT NULL DEFAULT '',
    website    TEXT NOT NULL DEFAULT '',
    orcid      TEXT NOT NULL DEFAULT '',
    bio        TEXT NOT NULL DEFAULT '',
    slug       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Site-wide settings; the newest row is effective
CREATE TABLE IF NOT EXISTS site_settings (
    id                TEXT PRIMARY KEY,
    citation_style_id TEXT REFERENCES citation_styles(id) ON DELETE SET NULL,
    library_id        TEXT REFERENCES libraries(id) ON DELETE SET NULL,
    main_person_id    TEXT REFERENCES people(id) ON DELETE SET NULL,
    created_at        TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Content schema: posts, institutions",
            sql: r#"
CREATE TABLE IF NOT EXISTS posts (
    id               TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    slug             TEXT NOT NULL UNIQUE,
    content          TEXT NOT NULL,
    display_datetime TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_display ON posts(display_datetime);

CREATE TABLE IF NOT EXISTS institutions (
    id        TEXT PRIMARY KEY,
    name      TEXT NOT NULL,
    address   TEXT NOT NULL DEFAULT '',
    city      TEXT NOT NULL,
    state     TEXT NOT NULL,
    postal    TEXT NOT NULL DEFAULT '',
    country   TEXT NOT NULL,
    website   TEXT NOT NULL DEFAULT '',
    parent_id TEXT REFERENCES institutions(id) ON DELETE SET NULL,
    longitude REAL,
    latitude  REAL
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_ascending() {
        let versions: Vec<u32> = all_migrations().iter().map(|m| m.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(versions.first(), Some(&1));
    }

    #[test]
    fn each_migration_records_its_version() {
        for m in all_migrations() {
            let marker = format!("INSERT INTO schema_migrations (version) VALUES ({});", m.version);
            assert!(m.sql.contains(&marker), "migration {} missing marker", m.version);
        }
    }
}
