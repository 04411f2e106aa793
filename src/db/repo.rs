use super::model::{ClassPaperRecord, SessionRecord, VideoRecord};
use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Sessions are created by the request layer; this is its minimal counterpart.
#[instrument(skip_all)]
pub async fn create_session(pool: &Pool, title: &str) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO sessions (title, is_ready, created_at) VALUES (?, 0, ?) RETURNING id",
    )
    .bind(title)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all, fields(session_id = session_id))]
pub async fn insert_video(pool: &Pool, path: &str, duration: &str, session_id: i64) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO videos (path, duration, created_at, session_id) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(path)
    .bind(duration)
    .bind(Utc::now())
    .bind(session_id)
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all, fields(session_id = session_id))]
pub async fn insert_class_paper(
    pool: &Pool,
    title: &str,
    path: &str,
    session_id: i64,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO class_papers (title, path, created_at, session_id) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(title)
    .bind(path)
    .bind(Utc::now())
    .bind(session_id)
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all, fields(session_id = session_id))]
pub async fn mark_session_ready(pool: &Pool, session_id: i64) -> Result<()> {
    let res = sqlx::query("UPDATE sessions SET is_ready = 1, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(session_id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(anyhow!("session {} not found", session_id));
    }
    Ok(())
}

fn session_from_row(row: &SqliteRow) -> SessionRecord {
    SessionRecord {
        id: row.get("id"),
        title: row.get("title"),
        is_ready: row.get::<i64, _>("is_ready") != 0,
        created_at: row.get("created_at"),
        updated_at: row.try_get("updated_at").ok().flatten(),
    }
}

pub async fn fetch_session(pool: &Pool, session_id: i64) -> Result<SessionRecord> {
    let row = sqlx::query(
        "SELECT id, title, is_ready, created_at, updated_at FROM sessions WHERE id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Err(anyhow!("session {} not found", session_id));
    };
    Ok(session_from_row(&row))
}

pub async fn list_sessions(pool: &Pool) -> Result<Vec<SessionRecord>> {
    let rows = sqlx::query(
        "SELECT id, title, is_ready, created_at, updated_at FROM sessions ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(session_from_row).collect())
}

pub async fn videos_for_session(pool: &Pool, session_id: i64) -> Result<Vec<VideoRecord>> {
    let rows = sqlx::query(
        "SELECT id, path, duration, session_id, created_at FROM videos WHERE session_id = ? ORDER BY id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| VideoRecord {
            id: row.get("id"),
            path: row.get("path"),
            duration: row.get("duration"),
            session_id: row.get("session_id"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn class_papers_for_session(
    pool: &Pool,
    session_id: i64,
) -> Result<Vec<ClassPaperRecord>> {
    let rows = sqlx::query(
        "SELECT id, title, path, session_id, created_at FROM class_papers WHERE session_id = ? ORDER BY id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| ClassPaperRecord {
            id: row.get("id"),
            title: row.get("title"),
            path: row.get("path"),
            session_id: row.get("session_id"),
            created_at: row.get("created_at"),
        })
        .collect())
}
