use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "mp4", "avi", "mov", "webm"];

/// Filesystem store for violation evidence. Saves are best-effort: every
/// failure is logged and reported as "no reference" so the violation
/// record itself always goes through.
#[derive(Clone)]
pub struct EvidenceService {
    dir: PathBuf,
    public_prefix: String,
    max_file_bytes: u64,
    max_total_bytes: u64,
    retention_hours: i64,
}

impl EvidenceService {
    pub fn from_config() -> Self {
        let config = crate::config::get_config();
        Self {
            dir: PathBuf::from(&config.evidence_dir),
            public_prefix: "/uploads/evidence".to_string(),
            max_file_bytes: config.evidence_max_file_bytes,
            max_total_bytes: config.evidence_max_total_bytes,
            retention_hours: config.evidence_retention_hours,
        }
    }

    pub fn allowed_extension(extension: &str) -> bool {
        ALLOWED_EXTENSIONS.contains(&extension.to_lowercase().as_str())
    }

    /// Persist an evidence blob and return its public reference, or `None`
    /// when the file is rejected or the write fails.
    pub async fn save(&self, data: &[u8], extension: &str) -> Option<String> {
        let extension = extension.to_lowercase();
        if !Self::allowed_extension(&extension) {
            tracing::warn!(extension = %extension, "Evidence rejected: extension not allowed");
            return None;
        }
        if data.is_empty() {
            return None;
        }
        if data.len() as u64 > self.max_file_bytes {
            tracing::warn!(
                size = data.len(),
                limit = self.max_file_bytes,
                "Evidence rejected: file too large"
            );
            return None;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::error!(error = ?e, "Failed to create evidence directory");
            return None;
        }

        match self.dir_size().await {
            Ok(total) if total + data.len() as u64 > self.max_total_bytes => {
                tracing::warn!(total, "Evidence rejected: store is full");
                return None;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to size evidence directory");
                return None;
            }
            _ => {}
        }

        let filename = format!(
            "{}_{}.{}",
            Uuid::new_v4(),
            Utc::now().format("%Y%m%d_%H%M%S"),
            extension
        );
        let path = self.dir.join(&filename);
        match tokio::fs::write(&path, data).await {
            Ok(()) => Some(format!("{}/{}", self.public_prefix, filename)),
            Err(e) => {
                tracing::error!(error = ?e, path = %path.display(), "Failed to write evidence");
                None
            }
        }
    }

    pub async fn exists(&self, reference: &str) -> bool {
        match self.path_for_reference(reference) {
            Some(path) => tokio::fs::metadata(path).await.is_ok(),
            None => false,
        }
    }

    /// Resolve a stored reference or bare filename to an on-disk path.
    /// Rejects anything that would escape the evidence directory.
    pub fn path_for_reference(&self, reference: &str) -> Option<PathBuf> {
        let filename = reference
            .strip_prefix(&format!("{}/", self.public_prefix))
            .unwrap_or(reference);
        let name = Path::new(filename).file_name()?;
        if name.to_str()? != filename {
            return None;
        }
        Some(self.dir.join(name))
    }

    async fn dir_size(&self) -> std::io::Result<u64> {
        let mut total = 0u64;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }

    /// Delete evidence files last modified before `cutoff`. Returns
    /// (deleted file count, bytes freed).
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> std::io::Result<(u64, u64)> {
        let mut deleted = 0u64;
        let mut freed = 0u64;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((0, 0)),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            if DateTime::<Utc>::from(modified) < cutoff {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => {
                        deleted += 1;
                        freed += meta.len();
                    }
                    Err(e) => {
                        tracing::warn!(error = ?e, path = %entry.path().display(), "Failed to delete evidence file")
                    }
                }
            }
        }
        Ok((deleted, freed))
    }

    /// Retention sweep: drop files past the window, then null out ledger
    /// references that can no longer resolve.
    pub async fn sweep(&self, pool: &PgPool) -> crate::error::Result<(u64, u64)> {
        let cutoff = Utc::now() - Duration::hours(self.retention_hours);
        let (deleted, freed) = self.delete_older_than(cutoff).await?;
        if deleted > 0 {
            tracing::info!(deleted, freed, "Evidence retention sweep removed files");
        }

        sqlx::query(
            r#"
            UPDATE violations_log
            SET screenshot_url = NULL
            WHERE screenshot_url IS NOT NULL AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        sqlx::query(
            r#"
            UPDATE violations_log
            SET video_url = NULL
            WHERE video_url IS NOT NULL AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok((deleted, freed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list() {
        assert!(EvidenceService::allowed_extension("png"));
        assert!(EvidenceService::allowed_extension("WEBM"));
        assert!(!EvidenceService::allowed_extension("exe"));
        assert!(!EvidenceService::allowed_extension("pdf"));
    }

    #[test]
    fn reference_resolution_rejects_traversal() {
        let svc = EvidenceService {
            dir: PathBuf::from("uploads/evidence"),
            public_prefix: "/uploads/evidence".to_string(),
            max_file_bytes: 1024,
            max_total_bytes: 4096,
            retention_hours: 48,
        };
        assert!(svc.path_for_reference("../../etc/passwd").is_none());
        assert!(svc.path_for_reference("a/b.png").is_none());
        let ok = svc.path_for_reference("/uploads/evidence/shot.png").unwrap();
        assert_eq!(ok, PathBuf::from("uploads/evidence/shot.png"));
    }
}
