//! Ingestion orchestrator: one entry point per upload.
//!
//! A video runs workspace → transcode → publish → enqueue. A document batch is
//! walked sequentially; each file is spooled, published and enqueued on its own,
//! so one bad file never stops the rest. Failed jobs are logged and dropped;
//! nothing is enqueued for them.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::IngestError;
use crate::model::{
    Completion, DocumentBatchReport, DocumentCompletion, DocumentJob, DocumentUpload,
    VideoCompletion, VideoJob,
};
use crate::naming::document_name;
use crate::publish::{MediaFile, Publisher};
use crate::router::CompletionSender;
use crate::transcode::Transcoder;
use crate::workspace::Workspace;

pub struct Ingestor {
    scratch_dir: PathBuf,
    max_document_bytes: u64,
    transcoder: Transcoder,
    publisher: Arc<dyn Publisher>,
    completions: CompletionSender,
}

impl Ingestor {
    pub fn new(
        scratch_dir: PathBuf,
        max_document_bytes: u64,
        transcoder: Transcoder,
        publisher: Arc<dyn Publisher>,
        completions: CompletionSender,
    ) -> Self {
        Self {
            scratch_dir,
            max_document_bytes,
            transcoder,
            publisher,
            completions,
        }
    }

    pub fn from_config(
        cfg: &Config,
        publisher: Arc<dyn Publisher>,
        completions: CompletionSender,
    ) -> Self {
        Self::new(
            cfg.scratch_dir(),
            cfg.storage.max_document_bytes,
            Transcoder::new(cfg.tools.clone()),
            publisher,
            completions,
        )
    }

    /// Ingest one video. On success exactly one video completion is enqueued.
    #[instrument(skip_all, fields(session_id = job.session_id, dir_path = %job.dir_path))]
    pub async fn process_video(&self, job: VideoJob) -> Result<(), IngestError> {
        let res = self.run_video(job).await;
        if let Err(err) = &res {
            error!(?err, "video ingestion abandoned");
        }
        res
    }

    async fn run_video(&self, job: VideoJob) -> Result<(), IngestError> {
        let VideoJob {
            dir_path,
            session_id,
            upload,
        } = job;

        let workspace = Workspace::acquire(&self.scratch_dir, upload).await?;
        let media = self.transcoder.transcode(&workspace).await?;
        let path = self
            .publisher
            .publish_video(&dir_path, media.artifacts)
            .await?;
        drop(workspace);

        let event = VideoCompletion {
            path,
            duration: media.duration,
            session_id,
        };
        info!(path = %event.path, duration = %event.duration, "video ingested");
        self.enqueue(Completion::Video(event)).await
    }

    /// Ingest a batch of documents one after another.
    #[instrument(skip_all, fields(session_id = job.session_id, dir_path = %job.dir_path, count = job.documents.len()))]
    pub async fn process_documents(&self, job: DocumentJob) -> DocumentBatchReport {
        let DocumentJob {
            dir_path,
            session_id,
            documents,
        } = job;

        let mut report = DocumentBatchReport::default();
        for document in documents {
            let filename = document.upload.filename.clone();
            match self.run_document(&dir_path, session_id, document).await {
                Ok(()) => report.published += 1,
                Err(err @ IngestError::Oversized { .. }) => {
                    warn!(%filename, %err, "document rejected");
                    report.oversized += 1;
                }
                Err(err) => {
                    error!(%filename, ?err, "document ingestion abandoned");
                    report.failed += 1;
                }
            }
        }
        info!(?report, "document batch done");
        report
    }

    async fn run_document(
        &self,
        dir_path: &str,
        session_id: i64,
        document: DocumentUpload,
    ) -> Result<(), IngestError> {
        let (title, extension) =
            document_name(document.title.as_deref(), &document.upload.filename);
        if document.upload.size > self.max_document_bytes {
            return Err(IngestError::Oversized {
                name: title,
                limit: self.max_document_bytes,
            });
        }

        let workspace = Workspace::acquire_document(
            &self.scratch_dir,
            &title,
            extension.as_deref(),
            document.upload,
            self.max_document_bytes,
        )
        .await?;
        let file = MediaFile::open(workspace.source())
            .await
            .map_err(|source| IngestError::MissingArtifact {
                path: workspace.source().to_path_buf(),
                source,
            })?;
        let path = self.publisher.publish_document(dir_path, file).await?;
        drop(workspace);

        self.enqueue(Completion::Document(DocumentCompletion {
            title,
            path,
            session_id,
        }))
        .await
    }

    async fn enqueue(&self, event: Completion) -> Result<(), IngestError> {
        self.completions
            .send(event)
            .await
            .map_err(|_| IngestError::ChannelClosed)
    }

    /// Run [`Self::process_video`] on its own task.
    pub fn spawn_video(self: &Arc<Self>, job: VideoJob) -> JoinHandle<Result<(), IngestError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.process_video(job).await })
    }

    /// Run [`Self::process_documents`] on its own task.
    pub fn spawn_documents(self: &Arc<Self>, job: DocumentJob) -> JoinHandle<DocumentBatchReport> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.process_documents(job).await })
    }
}
