use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use session_ingest::config;
use session_ingest::db;
use session_ingest::ingest::Ingestor;
use session_ingest::model::{DocumentJob, DocumentUpload, Upload, VideoJob};
use session_ingest::naming::publish_dir;
use session_ingest::publish::HttpPublisher;
use session_ingest::router::{completion_channel, CompletionRouter};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Create a course session, transcode and publish its media, and record the result"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Title of the session to create
    #[arg(long)]
    title: String,

    /// Subject used in the publish directory (e.g. maths)
    #[arg(long)]
    subject: String,

    /// Course year used in the publish directory
    #[arg(long)]
    year: String,

    /// Raw video file
    #[arg(long)]
    video: PathBuf,

    /// Document to attach, as `path` or `path=Title`; repeatable
    #[arg(long = "doc")]
    docs: Vec<String>,
}

async fn open_upload(path: &Path) -> Result<Upload> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let size = file.metadata().await?.len();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Upload::new(filename, size, file))
}

async fn document_upload(arg: &str) -> Result<DocumentUpload> {
    let (path, title) = match arg.split_once('=') {
        Some((path, title)) => (path, Some(title.to_string())),
        None => (arg, None),
    };
    Ok(DocumentUpload {
        title,
        upload: open_upload(Path::new(path)).await?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = cfg.database_url();
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    // Single consumer for every completion event.
    let (completions, receiver) = completion_channel(cfg.app.completion_capacity);
    let router = CompletionRouter::new(pool.clone(), receiver).spawn();

    let publisher = Arc::new(HttpPublisher::new(&cfg.storage.base_url)?);
    let ingestor = Arc::new(Ingestor::from_config(&cfg, publisher, completions));

    let session_id = db::create_session(&pool, &args.title).await?;
    let dir_path = publish_dir(&args.subject, &args.year, session_id);
    info!(session_id, %dir_path, database_url = %database_url, "session created");

    let video = ingestor.spawn_video(VideoJob {
        dir_path: dir_path.clone(),
        session_id,
        upload: open_upload(&args.video).await?,
    });

    let documents = if args.docs.is_empty() {
        None
    } else {
        let mut uploads = Vec::with_capacity(args.docs.len());
        for arg in &args.docs {
            uploads.push(document_upload(arg).await?);
        }
        Some(ingestor.spawn_documents(DocumentJob {
            dir_path,
            session_id,
            documents: uploads,
        }))
    };

    if let Err(err) = video.await? {
        error!(%err, "video was not published; session stays not ready");
    }
    if let Some(documents) = documents {
        let report = documents.await?;
        info!(?report, "documents processed");
    }

    // Dropping the last sender lets the router drain and stop.
    drop(ingestor);
    let handled = router.await?;

    let session = db::fetch_session(&pool, session_id).await?;
    info!(session_id, ready = session.is_ready, handled, "done");
    Ok(())
}
