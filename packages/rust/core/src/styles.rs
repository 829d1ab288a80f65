//! CSL style uploads.

use std::path::Path;

use chrono::Utc;
use tracing::{info, instrument};

use profsite_shared::{CitationStyle, ProfsiteError, RecordId, Result};
use profsite_storage::Storage;

/// Directory under the media root holding uploaded styles.
pub const STYLES_DIR: &str = "citestyles";

/// Copy the CSL file at `source` into `<media_root>/citestyles/` and record it.
///
/// A style file with the same name is overwritten.
#[instrument(skip(storage))]
pub async fn add_style(
    storage: &Storage,
    media_root: &Path,
    name: &str,
    source: &Path,
) -> Result<CitationStyle> {
    if name.trim().is_empty() {
        return Err(ProfsiteError::validation("style name must not be empty"));
    }
    if source.extension().and_then(|e| e.to_str()) != Some("csl") {
        return Err(ProfsiteError::validation(format!(
            "{} is not a .csl file",
            source.display()
        )));
    }
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ProfsiteError::validation("style file name is not valid UTF-8"))?;

    let dir = media_root.join(STYLES_DIR);
    std::fs::create_dir_all(&dir).map_err(|e| ProfsiteError::io(&dir, e))?;
    let dest = dir.join(file_name);
    std::fs::copy(source, &dest).map_err(|e| ProfsiteError::io(source, e))?;

    let style = CitationStyle {
        id: RecordId::new().to_string(),
        name: name.trim().to_string(),
        file: format!("{STYLES_DIR}/{file_name}"),
        created_at: Utc::now(),
    };
    storage.insert_style(&style).await?;
    info!(id = %style.id, file = %style.file, "citation style added");
    Ok(style)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        root: std::path::PathBuf,
        storage: Storage,
    }

    async fn fixture() -> Fixture {
        let root = std::env::temp_dir().join(format!("profsite_styles_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&root).unwrap();
        let storage = Storage::open(&root.join("profsite.db")).await.unwrap();
        Fixture { root, storage }
    }

    #[tokio::test]
    async fn style_is_copied_under_media_root() {
        let fx = fixture().await;
        let source = fx.root.join("apa.csl");
        std::fs::write(&source, "<style/>").unwrap();
        let media_root = fx.root.join("media");

        let style = add_style(&fx.storage, &media_root, "APA", &source)
            .await
            .unwrap();

        assert_eq!(style.file, "citestyles/apa.csl");
        assert_eq!(
            std::fs::read_to_string(media_root.join(&style.file)).unwrap(),
            "<style/>"
        );
        let stored = fx.storage.get_style(&style.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "APA");
    }

    #[tokio::test]
    async fn non_csl_file_is_rejected() {
        let fx = fixture().await;
        let source = fx.root.join("apa.xml");
        std::fs::write(&source, "<style/>").unwrap();

        let err = add_style(&fx.storage, &fx.root, "APA", &source)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfsiteError::Validation { .. }));
    }

    #[tokio::test]
    async fn missing_source_is_io_error() {
        let fx = fixture().await;
        let err = add_style(&fx.storage, &fx.root, "APA", &fx.root.join("nope.csl"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProfsiteError::Io { .. }));
        assert!(fx.storage.list_styles().await.unwrap().is_empty());
    }
}
