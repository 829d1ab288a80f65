//! libSQL storage layer for site records.
//!
//! The [`Storage`] struct wraps a local libSQL database holding mirrored
//! libraries, citation styles, site settings, posts and institutions.
//!
//! **Access rules:**
//! - commands that mutate records open read-write via [`Storage::open`]
//! - rendering and listing open via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Row, params};
use uuid::Uuid;

use profsite_shared::{
    CitationStyle, Institution, Library, LibraryKind, LibraryTarget, Person, Point, Post,
    ProfsiteError, Result, SiteSettings,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProfsiteError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;
        enable_foreign_keys(&conn).await?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ProfsiteError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;
        enable_foreign_keys(&conn).await?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ProfsiteError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ProfsiteError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Library operations
    // -----------------------------------------------------------------------

    /// Insert a new library record.
    pub async fn insert_library(&self, library: &Library) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO libraries (id, name, zotero_id, kind, collection, version, bib_file, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    library.id.as_str(),
                    library.name.as_str(),
                    library.target.library_id as i64,
                    library.target.kind.as_str(),
                    library.target.collection.as_deref(),
                    library.version,
                    library.bib_file.as_str(),
                    library.created_at.to_rfc3339(),
                    library.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a library by ID.
    pub async fn get_library(&self, id: &str) -> Result<Option<Library>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, zotero_id, kind, collection, version, bib_file, created_at, updated_at
                 FROM libraries WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_library(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// List all libraries ordered by name.
    pub async fn list_libraries(&self) -> Result<Vec<Library>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, zotero_id, kind, collection, version, bib_file, created_at, updated_at
                 FROM libraries ORDER BY name",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_library(&row)?);
        }
        Ok(results)
    }

    /// Persist the outcome of a sync: version, file path and `updated_at`.
    pub async fn record_library_sync(&self, id: &str, version: i64, bib_file: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE libraries SET version = ?1, bib_file = ?2, updated_at = ?3 WHERE id = ?4",
                params![version, bib_file, now.as_str(), id],
            )
            .await
            .map_err(db_err)?;

        if changed == 0 {
            return Err(ProfsiteError::not_found("library", id));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Citation style operations
    // -----------------------------------------------------------------------

    /// Insert a citation style record.
    pub async fn insert_style(&self, style: &CitationStyle) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO citation_styles (id, name, file, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    style.id.as_str(),
                    style.name.as_str(),
                    style.file.as_str(),
                    style.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a citation style by ID.
    pub async fn get_style(&self, id: &str) -> Result<Option<CitationStyle>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, file, created_at FROM citation_styles WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_style(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// List all citation styles ordered by name.
    pub async fn list_styles(&self) -> Result<Vec<CitationStyle>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, file, created_at FROM citation_styles ORDER BY name",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_style(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Site settings
    // -----------------------------------------------------------------------

    /// Append a settings row; it becomes the effective one. Returns its ID.
    pub async fn insert_site_settings(&self, settings: &SiteSettings) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO site_settings (id, citation_style_id, library_id, main_person_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.as_str(),
                    settings.citation_style_id.as_deref(),
                    settings.library_id.as_deref(),
                    settings.main_person_id.as_deref(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    /// The effective (most recently inserted) settings row, if any.
    pub async fn latest_site_settings(&self) -> Result<Option<SiteSettings>> {
        // rowid follows insertion order, even within one clock tick.
        let mut rows = self
            .conn
            .query(
                "SELECT citation_style_id, library_id, main_person_id
                 FROM site_settings ORDER BY rowid DESC LIMIT 1",
                params![],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(SiteSettings {
                citation_style_id: row.get::<String>(0).ok(),
                library_id: row.get::<String>(1).ok(),
                main_person_id: row.get::<String>(2).ok(),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // People
    // -----------------------------------------------------------------------

    /// Insert a person. Fails if the slug is taken.
    pub async fn insert_person(&self, person: &Person) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO people (id, first, middle, last, email, website, orcid, bio, slug, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    person.id.as_str(),
                    person.first.as_str(),
                    person.middle.as_str(),
                    person.last.as_str(),
                    person.email.as_str(),
                    person.website.as_str(),
                    person.orcid.as_str(),
                    person.bio.as_str(),
                    person.slug.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a person by ID.
    pub async fn get_person(&self, id: &str) -> Result<Option<Person>> {
        self.query_person("WHERE id = ?1", id).await
    }

    /// Get a person by slug.
    pub async fn get_person_by_slug(&self, slug: &str) -> Result<Option<Person>> {
        self.query_person("WHERE slug = ?1", slug).await
    }

    async fn query_person(&self, filter: &str, value: &str) -> Result<Option<Person>> {
        let sql = format!(
            "SELECT id, first, middle, last, email, website, orcid, bio, slug FROM people {filter}"
        );
        let mut rows = self
            .conn
            .query(&sql, params![value])
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_person(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// List people ordered by last then first name.
    pub async fn list_people(&self) -> Result<Vec<Person>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, first, middle, last, email, website, orcid, bio, slug
                 FROM people ORDER BY last, first",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_person(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Post operations
    // -----------------------------------------------------------------------

    /// Insert a post. Fails if the slug is taken.
    pub async fn insert_post(&self, post: &Post) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO posts (id, title, slug, content, display_datetime, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    post.id.as_str(),
                    post.title.as_str(),
                    post.slug.as_str(),
                    post.content.as_str(),
                    post.display_datetime.to_rfc3339(),
                    post.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a post by slug.
    pub async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, slug, content, display_datetime, created_at
                 FROM posts WHERE slug = ?1",
                params![slug],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_post(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Whether a post already uses `slug`.
    pub async fn slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.get_post_by_slug(slug).await?.is_some())
    }

    /// List posts, newest display date first.
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, slug, content, display_datetime, created_at
                 FROM posts ORDER BY display_datetime DESC",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_post(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Institution operations
    // -----------------------------------------------------------------------

    /// Insert an institution record.
    pub async fn insert_institution(&self, inst: &Institution) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO institutions (id, name, address, city, state, postal, country, website, parent_id, longitude, latitude)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    inst.id.as_str(),
                    inst.name.as_str(),
                    inst.address.as_str(),
                    inst.city.as_str(),
                    inst.state.as_str(),
                    inst.postal.as_str(),
                    inst.country.as_str(),
                    inst.website.as_str(),
                    inst.parent_id.as_deref(),
                    inst.location.map(|p| p.lng),
                    inst.location.map(|p| p.lat),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// List institutions ordered by name.
    pub async fn list_institutions(&self) -> Result<Vec<Institution>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, address, city, state, postal, country, website, parent_id, longitude, latitude
                 FROM institutions ORDER BY name",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_institution(&row)?);
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Settings rows reference styles, libraries and people; keep them honest.
async fn enable_foreign_keys(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .await
        .map_err(db_err)?;
    Ok(())
}

fn db_err(e: libsql::Error) -> ProfsiteError {
    ProfsiteError::Storage(e.to_string())
}

fn get_string(row: &Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(db_err)
}

fn get_timestamp(row: &Row, idx: i32) -> Result<DateTime<Utc>> {
    let s = get_string(row, idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ProfsiteError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`Library`].
fn row_to_library(row: &Row) -> Result<Library> {
    let kind: LibraryKind = get_string(row, 3)?.parse()?;
    Ok(Library {
        id: get_string(row, 0)?,
        name: get_string(row, 1)?,
        target: LibraryTarget {
            library_id: row.get::<i64>(2).map_err(db_err)? as u64,
            kind,
            collection: row.get::<String>(4).ok(),
        },
        version: row.get::<i64>(5).ok(),
        bib_file: get_string(row, 6)?,
        created_at: get_timestamp(row, 7)?,
        updated_at: get_timestamp(row, 8)?,
    })
}

fn row_to_style(row: &Row) -> Result<CitationStyle> {
    Ok(CitationStyle {
        id: get_string(row, 0)?,
        name: get_string(row, 1)?,
        file: get_string(row, 2)?,
        created_at: get_timestamp(row, 3)?,
    })
}

fn row_to_person(row: &Row) -> Result<Person> {
    Ok(Person {
        id: get_string(row, 0)?,
        first: get_string(row, 1)?,
        middle: get_string(row, 2)?,
        last: get_string(row, 3)?,
        email: get_string(row, 4)?,
        website: get_string(row, 5)?,
        orcid: get_string(row, 6)?,
        bio: get_string(row, 7)?,
        slug: get_string(row, 8)?,
    })
}

fn row_to_post(row: &Row) -> Result<Post> {
    Ok(Post {
        id: get_string(row, 0)?,
        title: get_string(row, 1)?,
        slug: get_string(row, 2)?,
        content: get_string(row, 3)?,
        display_datetime: get_timestamp(row, 4)?,
        created_at: get_timestamp(row, 5)?,
    })
}

fn row_to_institution(row: &Row) -> Result<Institution> {
    let location = match (row.get::<f64>(9).ok(), row.get::<f64>(10).ok()) {
        (Some(lng), Some(lat)) => Some(Point { lng, lat }),
        _ => None,
    };
    Ok(Institution {
        id: get_string(row, 0)?,
        name: get_string(row, 1)?,
        address: get_string(row, 2)?,
        city: get_string(row, 3)?,
        state: get_string(row, 4)?,
        postal: get_string(row, 5)?,
        country: get_string(row, 6)?,
        website: get_string(row, 7)?,
        parent_id: row.get::<String>(8).ok(),
        location,
    })
}
