//! Completion router: the single consumer that persists finished jobs.
//!
//! Producers push [`Completion`] events on one bounded channel. The router
//! handles them one at a time in arrival order and is the only writer of
//! video and class-paper records. Persistence errors are logged and the event
//! is dropped.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::db;
use crate::model::{Completion, DocumentCompletion, VideoCompletion};

pub const DEFAULT_CAPACITY: usize = 50;

pub type CompletionSender = mpsc::Sender<Completion>;
pub type CompletionReceiver = mpsc::Receiver<Completion>;

/// Bounded completion channel. Senders wait once `capacity` events are pending.
pub fn completion_channel(capacity: usize) -> (CompletionSender, CompletionReceiver) {
    mpsc::channel(capacity)
}

/// The three writes the router performs.
#[async_trait]
pub trait CompletionStore: Send + Sync {
    async fn insert_video(&self, video: &VideoCompletion) -> Result<i64>;
    async fn mark_session_ready(&self, session_id: i64) -> Result<()>;
    async fn insert_class_paper(&self, paper: &DocumentCompletion) -> Result<i64>;
}

#[async_trait]
impl CompletionStore for db::Pool {
    async fn insert_video(&self, video: &VideoCompletion) -> Result<i64> {
        db::insert_video(self, &video.path, &video.duration, video.session_id).await
    }

    async fn mark_session_ready(&self, session_id: i64) -> Result<()> {
        db::mark_session_ready(self, session_id).await
    }

    async fn insert_class_paper(&self, paper: &DocumentCompletion) -> Result<i64> {
        db::insert_class_paper(self, &paper.title, &paper.path, paper.session_id).await
    }
}

pub struct CompletionRouter<S> {
    store: S,
    receiver: CompletionReceiver,
}

impl<S> CompletionRouter<S>
where
    S: CompletionStore + 'static,
{
    pub fn new(store: S, receiver: CompletionReceiver) -> Self {
        Self { store, receiver }
    }

    /// Drain events until every sender is gone. Returns the number handled.
    pub async fn run(mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.receiver.recv().await {
            handle(&self.store, event).await;
            handled += 1;
        }
        info!(handled, "completion channel closed; router stopping");
        handled
    }

    pub fn spawn(self) -> JoinHandle<usize> {
        tokio::spawn(self.run())
    }
}

#[instrument(skip_all, fields(kind = event.kind(), session_id = event.session_id()))]
async fn handle<S: CompletionStore + ?Sized>(store: &S, event: Completion) {
    match event {
        Completion::Video(video) => match store.insert_video(&video).await {
            Ok(id) => {
                info!(id, path = %video.path, duration = %video.duration, "video recorded");
                match store.mark_session_ready(video.session_id).await {
                    Ok(()) => info!("session ready"),
                    Err(err) => error!(?err, "failed to mark session ready"),
                }
            }
            // the session stays not ready without a stored video
            Err(err) => error!(?err, "failed to record video"),
        },
        Completion::Document(paper) => match store.insert_class_paper(&paper).await {
            Ok(id) => info!(id, title = %paper.title, path = %paper.path, "class paper recorded"),
            Err(err) => error!(?err, "failed to record class paper"),
        },
    }
}
