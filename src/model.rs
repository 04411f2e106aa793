use std::fmt;
use tokio::io::AsyncRead;

/// A raw upload as handed over by the request layer.
pub struct Upload {
    pub filename: String,
    /// Size declared by the client.
    pub size: u64,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl Upload {
    pub fn new<R>(filename: impl Into<String>, size: u64, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            filename: filename.into(),
            size,
            reader: Box::new(reader),
        }
    }

    /// Upload backed by an in-memory buffer.
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self::new(filename, size, std::io::Cursor::new(bytes))
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("filename", &self.filename)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// One video to ingest for a session.
#[derive(Debug)]
pub struct VideoJob {
    pub dir_path: String,
    pub session_id: i64,
    pub upload: Upload,
}

/// One document of a batch, with an optional display title.
#[derive(Debug)]
pub struct DocumentUpload {
    pub title: Option<String>,
    pub upload: Upload,
}

/// A batch of documents attached to a session.
#[derive(Debug)]
pub struct DocumentJob {
    pub dir_path: String,
    pub session_id: i64,
    pub documents: Vec<DocumentUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCompletion {
    pub path: String,
    pub duration: String,
    pub session_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCompletion {
    pub title: String,
    pub path: String,
    pub session_id: i64,
}

/// A finished ingestion job waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Video(VideoCompletion),
    Document(DocumentCompletion),
}

impl Completion {
    pub fn kind(&self) -> &'static str {
        match self {
            Completion::Video(_) => "video",
            Completion::Document(_) => "document",
        }
    }

    pub fn session_id(&self) -> i64 {
        match self {
            Completion::Video(v) => v.session_id,
            Completion::Document(d) => d.session_id,
        }
    }
}

/// Outcome of one document batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentBatchReport {
    pub published: usize,
    pub oversized: usize,
    pub failed: usize,
}
