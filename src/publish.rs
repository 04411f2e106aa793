//! Upload of packaged artifacts to the remote storage service.
//!
//! Every file part of the multipart form reads from its own in-memory pipe. A
//! spawned producer task copies the files into those pipes in part order while
//! reqwest streams the form, so a file is never held in memory as a whole.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode, Url};
use serde::Deserialize;
use std::io;
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};

const VIDEO_ENDPOINT: &str = "storage_video";
const DOCUMENT_ENDPOINT: &str = "storage_doc";
const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid storage URL: {0}")]
    InvalidUrl(String),
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage replied {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid storage response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to stream file into request: {0}")]
    Writer(#[source] io::Error),
}

/// An opened artifact and the file name it is uploaded under.
#[derive(Debug)]
pub struct MediaFile {
    pub name: String,
    pub file: File,
}

impl MediaFile {
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, file })
    }
}

/// The three files a DASH package is made of.
#[derive(Debug)]
pub struct VideoArtifacts {
    pub video: MediaFile,
    pub audio: MediaFile,
    pub manifest: MediaFile,
}

#[derive(Debug, Deserialize)]
struct StorageResponse {
    dir_path: String,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload a packaged video and return the directory it was stored under.
    async fn publish_video(
        &self,
        dir_path: &str,
        artifacts: VideoArtifacts,
    ) -> Result<String, PublishError>;

    /// Upload one document and return the path it was stored under.
    async fn publish_document(
        &self,
        dir_path: &str,
        document: MediaFile,
    ) -> Result<String, PublishError>;
}

#[derive(Debug, Clone)]
pub struct HttpPublisher {
    http: Client,
    base_url: Url,
}

impl HttpPublisher {
    pub fn new(base_url: &str) -> Result<Self, PublishError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| PublishError::InvalidUrl(e.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent(concat!("session-ingest/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()?;
        Ok(Self { http, base_url })
    }

    async fn send(
        &self,
        endpoint: &str,
        dir_path: &str,
        files: Vec<(&'static str, MediaFile)>,
    ) -> Result<String, PublishError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| PublishError::InvalidUrl(e.to_string()))?;

        let (pipes, producer) = pipe_files(files);
        let mut form = Form::new().text("dir_path", dir_path.to_string());
        for pipe in pipes {
            let part = Part::stream(Body::wrap_stream(ReaderStream::new(pipe.reader)))
                .file_name(pipe.file_name)
                .mime_str("application/octet-stream")?;
            form = form.part(pipe.field, part);
        }

        let response = self.post(url, form).await;
        let written = match producer.await {
            Ok(res) => res,
            Err(join_err) => Err(io::Error::new(io::ErrorKind::Other, join_err)),
        };

        let dir_path = response?;
        written.map_err(PublishError::Writer)?;
        Ok(dir_path)
    }

    async fn post(&self, url: Url, form: Form) -> Result<String, PublishError> {
        debug!(%url, "posting multipart form");
        let res = self.http.post(url).multipart(form).send().await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            warn!(%status, body = %text, "storage rejected upload");
            return Err(PublishError::Status { status, body: text });
        }
        let payload: StorageResponse = serde_json::from_str(&text)?;
        Ok(payload.dir_path)
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    #[instrument(skip_all, fields(dir_path = %dir_path))]
    async fn publish_video(
        &self,
        dir_path: &str,
        artifacts: VideoArtifacts,
    ) -> Result<String, PublishError> {
        let files = vec![
            ("vfile", artifacts.video),
            ("afile", artifacts.audio),
            ("mpdfile", artifacts.manifest),
        ];
        let stored = self.send(VIDEO_ENDPOINT, dir_path, files).await?;
        info!(stored = %stored, "video published");
        Ok(stored)
    }

    #[instrument(skip_all, fields(dir_path = %dir_path, document = %document.name))]
    async fn publish_document(
        &self,
        dir_path: &str,
        document: MediaFile,
    ) -> Result<String, PublishError> {
        let files = vec![("docfile", document)];
        let stored = self.send(DOCUMENT_ENDPOINT, dir_path, files).await?;
        info!(stored = %stored, "document published");
        Ok(stored)
    }
}

/// Read end of one file part.
struct FilePipe {
    field: &'static str,
    file_name: String,
    reader: DuplexStream,
}

/// Open one pipe per file and spawn the task that fills them in order. Each
/// writer is shut down once its file is copied, which ends that part.
fn pipe_files(files: Vec<(&'static str, MediaFile)>) -> (Vec<FilePipe>, JoinHandle<io::Result<()>>) {
    let mut pipes = Vec::with_capacity(files.len());
    let mut sources = Vec::with_capacity(files.len());
    for (field, media) in files {
        let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        pipes.push(FilePipe {
            field,
            file_name: media.name,
            reader,
        });
        sources.push((media.file, writer));
    }

    let producer = tokio::spawn(async move {
        for (mut file, mut writer) in sources {
            tokio::io::copy(&mut file, &mut writer).await?;
            writer.shutdown().await?;
        }
        Ok(())
    });
    (pipes, producer)
}
