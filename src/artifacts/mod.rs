//! Per-video materialized artifacts.
//!
//! The ingestion pipeline (an external collaborator) uploads four artifacts
//! per video to a blob store:
//!
//! - `transcript_{id}.srt` - the full transcript
//! - `timestamps_{id}.txt` - keyframe timestamps in milliseconds, one per line
//! - `frames_{id}.txt` - base64-encoded keyframes, one per line
//! - `{id}.json` - the summary/description document
//!
//! plus individual keyframe images under `keyframes/{id}/{filename}`.
//!
//! The agent core only ever reads these. A missing artifact is fatal for the
//! invocation that needs it: no sub-query can proceed without its evidence.

use crate::error::{GlimtError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read access to the materialized artifacts of one video.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Full transcript text.
    async fn load_transcript(&self, video_id: &str) -> Result<String>;

    /// Summary/description document (the `{id}.json` artifact, verbatim).
    async fn load_summary_document(&self, video_id: &str) -> Result<String>;

    /// Base64-encoded keyframes, in timestamp order.
    async fn load_frames(&self, video_id: &str) -> Result<Vec<String>>;

    /// Keyframe timestamps in milliseconds, parallel to `load_frames`.
    async fn load_frame_timestamps(&self, video_id: &str) -> Result<Vec<f64>>;

    /// Raw bytes of a single keyframe image.
    async fn load_keyframe(&self, video_id: &str, filename: &str) -> Result<Vec<u8>>;

    /// Check that every artifact required for a QnA run is present.
    ///
    /// Called by the entry point before any turn executes, so a missing
    /// upload fails the invocation up front rather than mid-conversation.
    async fn verify(&self, video_id: &str) -> Result<()>;
}

/// Blob-store collaborator the artifacts are materialized from.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download one blob from a container.
    async fn download(&self, container: &str, blob_name: &str) -> Result<Vec<u8>>;
}

/// Containers the ingestion pipeline uploads into.
#[derive(Debug, Clone)]
pub struct BlobLayout {
    pub transcript_container: String,
    pub timestamps_container: String,
    pub frames_container: String,
    pub summary_container: String,
}

impl Default for BlobLayout {
    fn default() -> Self {
        Self {
            transcript_container: "transcripts".to_string(),
            timestamps_container: "timestamps".to_string(),
            frames_container: "frames".to_string(),
            summary_container: "summaries".to_string(),
        }
    }
}

/// Artifact store backed by a local directory.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn transcript_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("transcript_{}.srt", video_id))
    }

    fn timestamps_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("timestamps_{}.txt", video_id))
    }

    fn frames_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("frames_{}.txt", video_id))
    }

    fn summary_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", video_id))
    }

    fn keyframe_path(&self, video_id: &str, filename: &str) -> PathBuf {
        // Hit filenames may carry a blob prefix; only the final component
        // maps to the local file.
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.to_string());
        self.root.join("keyframes").join(video_id).join(name)
    }

    async fn read_text(&self, video_id: &str, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path).await.map_err(|_| {
            GlimtError::ArtifactMissing {
                video_id: video_id.to_string(),
                path: path.display().to_string(),
            }
        })
    }

    async fn read_lines(&self, video_id: &str, path: &Path) -> Result<Vec<String>> {
        let content = self.read_text(video_id, path).await?;
        Ok(content
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// Download all artifacts for a video from the blob store into this one.
    pub async fn materialize(
        &self,
        blob_store: &dyn BlobStore,
        layout: &BlobLayout,
        video_id: &str,
    ) -> Result<()> {
        info!("Materializing artifacts for video {}", video_id);

        let downloads = [
            (
                &layout.transcript_container,
                format!("transcript_{}.srt", video_id),
            ),
            (
                &layout.timestamps_container,
                format!("timestamps_{}.txt", video_id),
            ),
            (&layout.frames_container, format!("frames_{}.txt", video_id)),
            (&layout.summary_container, format!("{}.json", video_id)),
        ];

        for (container, blob_name) in downloads {
            let bytes = blob_store.download(container, &blob_name).await?;
            let local_path = self.root.join(&blob_name);
            tokio::fs::write(&local_path, &bytes).await?;
            debug!("Materialized {} ({} bytes)", blob_name, bytes.len());
        }

        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn load_transcript(&self, video_id: &str) -> Result<String> {
        self.read_text(video_id, &self.transcript_path(video_id))
            .await
    }

    async fn load_summary_document(&self, video_id: &str) -> Result<String> {
        self.read_text(video_id, &self.summary_path(video_id)).await
    }

    async fn load_frames(&self, video_id: &str) -> Result<Vec<String>> {
        self.read_lines(video_id, &self.frames_path(video_id)).await
    }

    async fn load_frame_timestamps(&self, video_id: &str) -> Result<Vec<f64>> {
        let lines = self
            .read_lines(video_id, &self.timestamps_path(video_id))
            .await?;
        lines
            .iter()
            .map(|line| {
                line.parse::<f64>().map_err(|_| {
                    GlimtError::InvalidInput(format!(
                        "Malformed frame timestamp '{}' for video {}",
                        line, video_id
                    ))
                })
            })
            .collect()
    }

    async fn load_keyframe(&self, video_id: &str, filename: &str) -> Result<Vec<u8>> {
        let path = self.keyframe_path(video_id, filename);
        tokio::fs::read(&path)
            .await
            .map_err(|_| GlimtError::ArtifactMissing {
                video_id: video_id.to_string(),
                path: path.display().to_string(),
            })
    }

    async fn verify(&self, video_id: &str) -> Result<()> {
        for path in [
            self.transcript_path(video_id),
            self.timestamps_path(video_id),
            self.frames_path(video_id),
            self.summary_path(video_id),
        ] {
            if !path.exists() {
                return Err(GlimtError::ArtifactMissing {
                    video_id: video_id.to_string(),
                    path: path.display().to_string(),
                });
            }
        }
        Ok(())
    }
}
