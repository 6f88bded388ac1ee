//! Image loading for the `transcribe` command.

use std::path::Path;

use anyhow::{Context, Result, bail};

use scoresheet_engine::{MediaType, ScoresheetImage};

/// Read an image file. The media type comes from `mime` when given, else
/// from the file extension.
pub(crate) fn load_image(path: &Path, mime: Option<&str>) -> Result<ScoresheetImage> {
    let media_type = match mime {
        Some(mime) => MediaType::from_mime(mime)?,
        None => {
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .with_context(|| format!("{} has no file extension", path.display()))?;
            MediaType::from_extension(extension)?
        }
    };

    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }

    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        media_type = media_type.mime(),
        "Loaded image"
    );
    Ok(ScoresheetImage::new(bytes, media_type))
}

/// Stand-in image for offline validation, where the recognizer ignores it.
pub(crate) fn placeholder_image() -> ScoresheetImage {
    ScoresheetImage::new(Vec::new(), MediaType::Png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.JPG");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let image = load_image(&path, None).unwrap();
        assert_eq!(image.media_type(), MediaType::Jpeg);
        assert_eq!(image.len(), 3);
    }

    #[test]
    fn explicit_mime_overrides_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        assert!(load_image(&path, None).is_err());
        let image = load_image(&path, Some("image/png")).unwrap();
        assert_eq!(image.media_type(), MediaType::Png);
    }

    #[test]
    fn rejects_unknown_extension_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("sheet.gif");
        std::fs::write(&gif, [1, 2, 3]).unwrap();
        assert!(load_image(&gif, None).is_err());

        let empty = dir.path().join("sheet.png");
        std::fs::write(&empty, b"").unwrap();
        assert!(load_image(&empty, None).unwrap_err().to_string().contains("is empty"));
    }
}
