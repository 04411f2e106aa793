use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::path::PathBuf;

use session_ingest::config;
use session_ingest::db::{self, ClassPaperRecord, SessionRecord, VideoRecord};
use session_ingest::duration::sum_durations;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Print sessions with their recorded videos, class papers and total duration"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Only report this session
    #[arg(long)]
    session: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SessionReport {
    session: SessionRecord,
    total_duration: String,
    videos: Vec<VideoRecord>,
    class_papers: Vec<ClassPaperRecord>,
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

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let sessions = match args.session {
        Some(id) => vec![db::fetch_session(&pool, id).await?],
        None => db::list_sessions(&pool).await?,
    };

    let mut reports = Vec::with_capacity(sessions.len());
    for session in sessions {
        let videos = db::videos_for_session(&pool, session.id).await?;
        let class_papers = db::class_papers_for_session(&pool, session.id).await?;
        let durations: Vec<&str> = videos.iter().map(|v| v.duration.as_str()).collect();
        reports.push(SessionReport {
            total_duration: sum_durations(&durations),
            session,
            videos,
            class_papers,
        });
    }

    println!("{}", to_string_pretty(&reports)?);
    Ok(())
}
