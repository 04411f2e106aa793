//! Per-job scratch files.
//!
//! A [`Workspace`] owns the spooled upload and every artifact the transcoding
//! tools derive from it. All tracked paths are removed when the workspace is
//! dropped, whichever way the job ends.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use crate::error::IngestError;
use crate::model::Upload;

pub(crate) const FRAGMENTED_SUFFIX: &str = "-f.mp4";
pub(crate) const MEDIA_PREFIX_SUFFIX: &str = "-f";
pub(crate) const VIDEO_TRACK_SUFFIX: &str = "-f-video-avc1.mp4";
pub(crate) const AUDIO_TRACK_SUFFIX: &str = "-f-audio-fr-mp4a.mp4";
pub(crate) const MANIFEST_SUFFIX: &str = ".mpd";

#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    source: PathBuf,
    base_name: String,
    tracked: Vec<PathBuf>,
}

impl Workspace {
    /// Spool a video upload into `video.XXXXXX` under `scratch_dir` and register
    /// the paths the fragmenter and packager will write next to it.
    #[instrument(skip_all, fields(filename = %upload.filename, size = upload.size))]
    pub async fn acquire(scratch_dir: &Path, mut upload: Upload) -> Result<Self, IngestError> {
        let temp = tempfile::Builder::new()
            .prefix("video.")
            .tempfile_in(scratch_dir)?;
        let (file, source) = temp.keep().map_err(|e| e.error)?;

        let mut workspace = Self::new(scratch_dir, source);
        for suffix in [
            FRAGMENTED_SUFFIX,
            VIDEO_TRACK_SUFFIX,
            AUDIO_TRACK_SUFFIX,
            MANIFEST_SUFFIX,
        ] {
            let path = workspace.sibling(suffix);
            workspace.track(path);
        }

        let written = spool(&mut upload.reader, File::from_std(file), None).await?;
        debug!(written, source = %workspace.source.display(), "spooled video upload");
        Ok(workspace)
    }

    /// Spool a document into `{stem}.XXXXXX.{extension}`. Only that file is tracked.
    /// Fails with [`IngestError::Oversized`] once more than `limit` bytes arrive.
    #[instrument(skip_all, fields(filename = %upload.filename, size = upload.size))]
    pub async fn acquire_document(
        scratch_dir: &Path,
        stem: &str,
        extension: Option<&str>,
        mut upload: Upload,
        limit: u64,
    ) -> Result<Self, IngestError> {
        let prefix = format!("{stem}.");
        let suffix = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(scratch_dir)?;
        let (file, source) = temp.keep().map_err(|e| e.error)?;

        let workspace = Self::new(scratch_dir, source);
        let written = spool(&mut upload.reader, File::from_std(file), Some(limit)).await?;
        if written > limit {
            return Err(IngestError::Oversized {
                name: stem.to_string(),
                limit,
            });
        }
        debug!(written, source = %workspace.source.display(), "spooled document upload");
        Ok(workspace)
    }

    fn new(scratch_dir: &Path, source: PathBuf) -> Self {
        let base_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            dir: scratch_dir.to_path_buf(),
            tracked: vec![source.clone()],
            source,
            base_name,
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.base_name, suffix))
    }

    /// Register an extra path for removal on drop.
    pub fn track(&mut self, path: PathBuf) {
        if !self.tracked.contains(&path) {
            self.tracked.push(path);
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn fragmented(&self) -> PathBuf {
        self.sibling(FRAGMENTED_SUFFIX)
    }

    pub fn video_track(&self) -> PathBuf {
        self.sibling(VIDEO_TRACK_SUFFIX)
    }

    pub fn audio_track(&self) -> PathBuf {
        self.sibling(AUDIO_TRACK_SUFFIX)
    }

    pub fn manifest(&self) -> PathBuf {
        self.sibling(MANIFEST_SUFFIX)
    }

    /// Prefix handed to the packager so its track files land on `video_track`/`audio_track`.
    pub fn media_prefix(&self) -> String {
        format!("{}{}", self.base_name, MEDIA_PREFIX_SUFFIX)
    }

    pub fn manifest_name(&self) -> String {
        format!("{}{}", self.base_name, MANIFEST_SUFFIX)
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        for path in &self.tracked {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed workspace file"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(?err, path = %path.display(), "failed to remove workspace file"),
            }
        }
    }
}

/// Copy `reader` into `file`. With a limit, at most `limit + 1` bytes are read
/// so callers can tell an oversized stream apart without draining it.
async fn spool<R>(reader: &mut R, mut file: File, limit: Option<u64>) -> Result<u64, IngestError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let written = match limit {
        Some(limit) => tokio::io::copy(&mut reader.take(limit + 1), &mut file).await?,
        None => tokio::io::copy(reader, &mut file).await?,
    };
    file.flush().await?;
    Ok(written)
}
