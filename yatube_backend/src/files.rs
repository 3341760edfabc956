use crate::config::YatubePaths;
use crate::forms::ValidImage;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// Public prefix under which stored media paths are linked.
pub const MEDIA_URL: &str = "/media/";

/// Writes post images below the media directory. Stored paths are relative
/// to that directory (`posts/<uuid>.<ext>`).
#[derive(Clone)]
pub struct FileService {
    paths: YatubePaths,
}

impl FileService {
    pub fn new(paths: YatubePaths) -> Self {
        Self { paths }
    }

    pub async fn save_post_image(&self, image: &ValidImage) -> Result<String> {
        let stored_name = format!("{}.{}", Uuid::new_v4(), image.extension);
        let relative_path = format!("posts/{stored_name}");
        let absolute_path = self.paths.post_images_dir.join(&stored_name);
        fs::create_dir_all(&self.paths.post_images_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create image directory {}",
                    self.paths.post_images_dir.display()
                )
            })?;
        fs::write(&absolute_path, &image.data)
            .await
            .with_context(|| format!("failed to write image to {}", absolute_path.display()))?;
        tracing::debug!(path = %relative_path, mime = image.mime, size = image.data.len(), "stored post image");
        Ok(relative_path)
    }

    /// Best-effort removal of a replaced or cleared image.
    pub async fn remove(&self, relative_path: &str) {
        let absolute_path = self.absolute_path(relative_path);
        if let Err(err) = fs::remove_file(&absolute_path).await {
            tracing::warn!(path = %absolute_path.display(), error = %err, "failed to remove stale image");
        }
    }

    pub fn absolute_path(&self, relative_path: &str) -> PathBuf {
        self.paths.media_dir.join(relative_path)
    }
}

pub fn media_url(relative_path: &str) -> String {
    format!("{MEDIA_URL}{relative_path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn images_land_under_media_posts() {
        let dir = tempdir().expect("tempdir");
        let service = FileService::new(YatubePaths::from_base_dir(dir.path()).unwrap());
        let image = ValidImage {
            data: vec![0x47, 0x49, 0x46, 0x38],
            mime: "image/gif",
            extension: "gif",
        };
        let stored = service.save_post_image(&image).await.expect("save");
        assert!(stored.starts_with("posts/"));
        assert!(stored.ends_with(".gif"));
        let on_disk = tokio::fs::read(service.absolute_path(&stored)).await.unwrap();
        assert_eq!(on_disk, image.data);
        assert_eq!(media_url(&stored), format!("/media/{stored}"));

        service.remove(&stored).await;
        assert!(!service.absolute_path(&stored).exists());
    }
}
