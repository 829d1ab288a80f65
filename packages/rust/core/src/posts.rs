//! Blog posts: creation with unique slugs and citation-aware rendering.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use profsite_markdown::{Converter, slugify};
use profsite_shared::{Post, ProfsiteError, RecordId, Result};
use profsite_storage::Storage;

use crate::site::SiteContext;

/// Maximum number of title words kept in a post slug.
pub const SLUG_WORDS: usize = 5;

/// Store a new post titled `title`.
///
/// The slug keeps the first [`SLUG_WORDS`] words of the title; a taken slug
/// gets a `-2`, `-3`, ... suffix. `display_datetime` defaults to now.
#[instrument(skip(storage, content))]
pub async fn create_post(
    storage: &Storage,
    title: &str,
    content: &str,
    display_datetime: Option<DateTime<Utc>>,
) -> Result<Post> {
    let base = slugify(title, SLUG_WORDS);
    if base.is_empty() {
        return Err(ProfsiteError::validation(format!(
            "post title '{title}' has no letters or digits to build a slug from"
        )));
    }
    let slug = unique_slug(storage, &base).await?;

    let now = Utc::now();
    let post = Post {
        id: RecordId::new().to_string(),
        title: title.trim().to_string(),
        slug,
        content: content.to_string(),
        display_datetime: display_datetime.unwrap_or(now),
        created_at: now,
    };
    storage.insert_post(&post).await?;
    info!(slug = %post.slug, "post created");
    Ok(post)
}

async fn unique_slug(storage: &Storage, base: &str) -> Result<String> {
    if !storage.slug_exists(base).await? {
        return Ok(base.to_string());
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !storage.slug_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Render `post` to HTML with the site's citation style and bibliography.
pub async fn render_post<C>(converter: &C, site: &SiteContext, post: &Post) -> Result<String>
where
    C: Converter + Clone + Send + 'static,
{
    render_markdown(
        converter,
        post.content.clone(),
        site.csl_path.clone(),
        site.bib_path.clone(),
    )
    .await
}

/// Run the blocking converter on the blocking thread pool.
pub async fn render_markdown<C>(
    converter: &C,
    content: String,
    csl: Option<PathBuf>,
    bib: Option<PathBuf>,
) -> Result<String>
where
    C: Converter + Clone + Send + 'static,
{
    let converter = converter.clone();
    tokio::task::spawn_blocking(move || {
        profsite_markdown::render(&converter, &content, csl.as_deref(), bib.as_deref())
    })
    .await
    .map_err(|e| ProfsiteError::Conversion(format!("render task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Returns the arguments and input so tests can inspect both.
    #[derive(Clone)]
    struct EchoConverter;

    impl Converter for EchoConverter {
        fn convert(&self, input: &str, args: &[String]) -> Result<String> {
            Ok(format!("{}\n{input}", args.join(" ")))
        }
    }

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("profsite_posts_{}.db", uuid::Uuid::now_v7()));
        Storage::open(&tmp).await.unwrap()
    }

    #[tokio::test]
    async fn slug_collisions_get_numeric_suffixes() {
        let storage = test_storage().await;
        let title = "New Paper on Transit Equity in Boston";

        let first = create_post(&storage, title, "a", None).await.unwrap();
        let second = create_post(&storage, title, "b", None).await.unwrap();
        let third = create_post(&storage, title, "c", None).await.unwrap();

        assert_eq!(first.slug, "new-paper-on-transit-equity");
        assert_eq!(second.slug, "new-paper-on-transit-equity-2");
        assert_eq!(third.slug, "new-paper-on-transit-equity-3");
        assert_eq!(storage.list_posts().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn explicit_display_date_is_kept() {
        let storage = test_storage().await;
        let when = DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let post = create_post(&storage, "Spring update", "x", Some(when))
            .await
            .unwrap();
        let stored = storage.get_post_by_slug(&post.slug).await.unwrap().unwrap();
        assert_eq!(stored.display_datetime, when);
    }

    #[tokio::test]
    async fn unsluggable_title_is_rejected() {
        let storage = test_storage().await;
        let err = create_post(&storage, "???", "x", None).await.unwrap_err();
        assert!(matches!(err, ProfsiteError::Validation { .. }));
    }

    #[tokio::test]
    async fn post_render_uses_site_paths() {
        let storage = test_storage().await;
        let post = create_post(&storage, "Cited", "See [@smith2020]", None)
            .await
            .unwrap();
        let site = SiteContext {
            csl_path: Some(Path::new("/media/citestyles/apa.csl").to_path_buf()),
            bib_path: Some(Path::new("/media/bibs/library_1.bib").to_path_buf()),
            main_person: None,
        };

        let html = render_post(&EchoConverter, &site, &post).await.unwrap();
        assert!(html.contains("--citeproc"));
        assert!(html.contains("--bibliography=/media/bibs/library_1.bib"));
        assert!(html.contains("--csl=/media/citestyles/apa.csl"));
        assert!(html.ends_with("### References"));
    }

    #[tokio::test]
    async fn post_render_without_site_citations_is_plain() {
        let storage = test_storage().await;
        let post = create_post(&storage, "Plain", "See [@smith2020]", None)
            .await
            .unwrap();

        let html = render_post(&EchoConverter, &SiteContext::default(), &post)
            .await
            .unwrap();
        assert!(!html.contains("--citeproc"));
        assert!(html.ends_with("See [@smith2020]"));
    }
}
