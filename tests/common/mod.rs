#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use session_ingest::config::{ToolCommand, Tools};
use session_ingest::publish::{MediaFile, PublishError, Publisher, VideoArtifacts};
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

/// Stage at which the fake toolchain breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakage {
    None,
    Fragment,
    Package,
    Probe,
    /// Packager exits 0 but never writes the audio track.
    MissingAudio,
    /// Fragmenter drops a `fragmenter.started` marker next to its script and never returns.
    HangFragment,
}

const FRAGMENTER: &str = r#"[ "$1" = "--fragment-duration" ] || exit 2
cp "$3" "$4"
"#;

const PACKAGER: &str = r#"while [ $# -gt 0 ]; do
  case "$1" in
    --media-prefix) prefix="$2"; shift 2 ;;
    --mpd-name) mpd="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf 'VIDEO-TRACK' > "$out/$prefix-video-avc1.mp4"
[ -n "$SKIP_AUDIO" ] || printf 'AUDIO-TRACK' > "$out/$prefix-audio-fr-mp4a.mp4"
printf '<MPD/>' > "$out/$mpd"
"#;

const PROBER: &str = "printf '0:00:10.000000\\n'\n";

const HANGING: &str = ": > \"$(dirname \"$0\")/fragmenter.started\"\nexec sleep 30\n";

const FAILING: &str = "echo 'simulated failure' >&2\nexit 1\n";

fn script(dir: &Path, name: &str, body: &str) -> ToolCommand {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    ToolCommand {
        program: "sh".into(),
        args: vec![path.to_string_lossy().into_owned()],
    }
}

/// Shell stand-ins for the fragmenter, packager and prober, written into `dir`.
pub fn fake_tools(dir: &Path, breakage: Breakage) -> Tools {
    let pick = |stage: Breakage, body: &'static str| {
        if breakage == stage {
            FAILING
        } else {
            body
        }
    };
    let packager_body = if breakage == Breakage::MissingAudio {
        format!("SKIP_AUDIO=1\n{}", PACKAGER)
    } else {
        pick(Breakage::Package, PACKAGER).to_string()
    };
    let fragmenter_body = if breakage == Breakage::HangFragment {
        HANGING
    } else {
        pick(Breakage::Fragment, FRAGMENTER)
    };
    Tools {
        fragmenter: script(dir, "fragmenter.sh", fragmenter_body),
        packager: script(dir, "packager.sh", &packager_body),
        prober: script(dir, "prober.sh", pick(Breakage::Probe, PROBER)),
        ..Tools::default()
    }
}

pub fn leftovers(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFile {
    pub name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishCall {
    Video {
        dir_path: String,
        files: Vec<PublishedFile>,
    },
    Document {
        dir_path: String,
        file: PublishedFile,
    },
}

/// Publisher that reads every stream it is handed and records it.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    calls: Arc<Mutex<Vec<PublishCall>>>,
    pub fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub async fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().await.clone()
    }
}

async fn drain(mut media: MediaFile) -> PublishedFile {
    let mut content = Vec::new();
    media.file.read_to_end(&mut content).await.unwrap();
    PublishedFile {
        name: media.name,
        content,
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish_video(
        &self,
        dir_path: &str,
        artifacts: VideoArtifacts,
    ) -> Result<String, PublishError> {
        let files = vec![
            drain(artifacts.video).await,
            drain(artifacts.audio).await,
            drain(artifacts.manifest).await,
        ];
        self.calls.lock().await.push(PublishCall::Video {
            dir_path: dir_path.to_string(),
            files,
        });
        if self.fail {
            return Err(PublishError::Status {
                status: reqwest::StatusCode::BAD_GATEWAY,
                body: "storage down".into(),
            });
        }
        Ok(format!("/stored{dir_path}"))
    }

    async fn publish_document(
        &self,
        dir_path: &str,
        document: MediaFile,
    ) -> Result<String, PublishError> {
        let file = drain(document).await;
        let stored = format!("/stored{dir_path}/{}", file.name);
        self.calls.lock().await.push(PublishCall::Document {
            dir_path: dir_path.to_string(),
            file,
        });
        if self.fail {
            return Err(PublishError::Status {
                status: reqwest::StatusCode::BAD_GATEWAY,
                body: "storage down".into(),
            });
        }
        Ok(stored)
    }
}

/// One multipart request as seen by the fake storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub endpoint: &'static str,
    pub dir_path: String,
    /// (field name, file name, body) in arrival order.
    pub fields: Vec<(String, Option<String>, Vec<u8>)>,
}

impl Received {
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _, _)| n.as_str()).collect()
    }
}

#[derive(Clone, Default)]
pub struct FakeStorage {
    received: Arc<Mutex<Vec<Received>>>,
}

impl FakeStorage {
    pub async fn received(&self) -> Vec<Received> {
        self.received.lock().await.clone()
    }
}

async fn record(
    storage: &FakeStorage,
    endpoint: &'static str,
    mut multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    let mut dir_path = String::new();
    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let body = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        if name == "dir_path" {
            dir_path = String::from_utf8_lossy(&body).into_owned();
        }
        fields.push((name, file_name, body.to_vec()));
    }
    let stored = match endpoint {
        "video" => format!("/srv{dir_path}"),
        _ => {
            let file = fields
                .iter()
                .find_map(|(_, f, _)| f.clone())
                .unwrap_or_default();
            format!("/srv{dir_path}/{file}")
        }
    };
    storage.received.lock().await.push(Received {
        endpoint,
        dir_path,
        fields,
    });
    Ok(Json(json!({ "dir_path": stored })))
}

async fn store_video(
    State(storage): State<FakeStorage>,
    multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    record(&storage, "video", multipart).await
}

async fn store_doc(
    State(storage): State<FakeStorage>,
    multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    record(&storage, "doc", multipart).await
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

/// Start a storage service that accepts everything. Returns its base URL.
pub async fn spawn_storage() -> (String, FakeStorage) {
    let storage = FakeStorage::default();
    let app = Router::new()
        .route("/storage_video", post(store_video))
        .route("/storage_doc", post(store_doc))
        .with_state(storage.clone());
    (serve(app).await, storage)
}

/// Start a storage service whose video endpoint fails and whose document
/// endpoint answers with something that is not JSON.
pub async fn spawn_broken_storage() -> String {
    let app = Router::new()
        .route(
            "/storage_video",
            post(|_body: Bytes| async { (StatusCode::INTERNAL_SERVER_ERROR, "disk full") }),
        )
        .route("/storage_doc", post(|_body: Bytes| async { "ok" }));
    serve(app).await
}
