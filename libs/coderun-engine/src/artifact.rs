/// Artifact Store - On-Disk Job Materialization
///
/// Writes submitted source to `<work_dir>/<job_id>.<ext>` and removes every
/// file belonging to a job once the pipeline is done with it. Removal is
/// best-effort and idempotent: missing files are fine, other failures are
/// logged and swallowed.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Fresh identifiers are retried this many times on a name collision
const MAX_CREATE_ATTEMPTS: usize = 3;

/// Path of a job artifact with the given extension
pub fn artifact_path(work_dir: &Path, job_id: &Uuid, extension: &str) -> PathBuf {
    work_dir.join(format!("{}.{}", job_id, extension))
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `code` under a fresh job id
    async fn create(&self, language: &str, source_extension: &str, code: &str) -> io::Result<Uuid>;

    /// Delete the source and, if present, the compiled output of a job
    async fn remove(&self, job_id: &Uuid, source_extension: &str, output_extension: Option<&str>);
}

/// Artifact store backed by a local directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    work_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    async fn remove_file(path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Artifact removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove artifact"),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn create(&self, language: &str, source_extension: &str, code: &str) -> io::Result<Uuid> {
        fs::create_dir_all(&self.work_dir).await?;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let job_id = Uuid::new_v4();
            let path = artifact_path(&self.work_dir, &job_id, source_extension);

            // create_new guarantees the id is not shared with a concurrent job
            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };

            if let Err(e) = write_all(&mut file, code).await {
                drop(file);
                Self::remove_file(&path).await;
                return Err(e);
            }

            debug!(
                job_id = %job_id,
                language = language,
                path = %path.display(),
                source_size = code.len(),
                "Artifact created"
            );
            return Ok(job_id);
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not allocate a unique job id",
        ))
    }

    async fn remove(&self, job_id: &Uuid, source_extension: &str, output_extension: Option<&str>) {
        Self::remove_file(&artifact_path(&self.work_dir, job_id, source_extension)).await;
        if let Some(ext) = output_extension {
            Self::remove_file(&artifact_path(&self.work_dir, job_id, ext)).await;
        }
    }
}

async fn write_all(file: &mut fs::File, code: &str) -> io::Result<()> {
    file.write_all(code.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await
}
