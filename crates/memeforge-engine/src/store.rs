use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::ImageFormat;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

const NAME_ATTEMPTS: usize = 8;

/// Shared output area. Writers only ever create new files.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn write(&self, bytes: &[u8], extension: &str) -> Result<PathBuf, StoreError>;

    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fresh_path(&self, extension: &str) -> PathBuf {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.root
            .join(format!("meme_{}.{}", &id[..8], extension.trim_start_matches('.')))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn write(&self, bytes: &[u8], extension: &str) -> Result<PathBuf, StoreError> {
        for _ in 0..NAME_ATTEMPTS {
            let path = self.fresh_path(extension);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            };
            file.write_all(bytes).await?;
            file.flush().await?;
            return Ok(path);
        }
        Err(StoreError::NameExhausted(NAME_ATTEMPTS))
    }

    fn exists(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && path.is_file()
    }
}

/// Decodes whatever a backend returned and stores it as PNG. Bytes that do
/// not decode as an image are rejected before anything is written.
pub async fn store_png(store: &dyn ArtifactStore, payload: &[u8]) -> Result<PathBuf, StoreError> {
    let png = reencode_png(payload)?;
    store.write(&png, "png").await
}

pub fn reencode_png(payload: &[u8]) -> Result<Vec<u8>, StoreError> {
    let decoded = image::load_from_memory(payload)?;
    let mut png = Vec::new();
    decoded.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    use super::{store_png, ArtifactStore, LocalArtifactStore};
    use crate::error::StoreError;

    pub(crate) fn tiny_png(color: [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_pixel(4, 4, Rgb(color));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[tokio::test]
    async fn writes_use_fresh_names() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path().join("uploads"))?;

        let mut seen = HashSet::new();
        for _ in 0..16 {
            let path = store.write(b"x", "png").await?;
            assert!(store.exists(&path));
            let name = path
                .file_name()
                .and_then(|value| value.to_str())
                .unwrap_or_default()
                .to_string();
            assert!(name.starts_with("meme_") && name.ends_with(".png"));
            assert_eq!(name.len(), "meme_".len() + 8 + ".png".len());
            assert!(seen.insert(name));
        }
        Ok(())
    }

    #[tokio::test]
    async fn exists_is_scoped_to_the_store_root() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path().join("uploads"))?;
        let outside = temp.path().join("elsewhere.png");
        std::fs::write(&outside, b"x")?;
        assert!(!store.exists(&outside));
        Ok(())
    }

    #[tokio::test]
    async fn store_png_reencodes_and_rejects_garbage() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = LocalArtifactStore::new(temp.path())?;

        let path = store_png(&store, &tiny_png([200, 10, 10])).await?;
        let decoded = image::open(&path)?.to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([200, 10, 10]));

        let err = store_png(&store, b"<html>busy</html>").await.err();
        assert!(matches!(err, Some(StoreError::Decode(_))));
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }
}
