//! Fragmenting, DASH packaging and duration probing through external tools.
//!
//! The tools are trusted black boxes: only their exit status and the fixed
//! output names derived by [`Workspace`] are looked at.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::{ToolCommand, Tools};
use crate::duration::format_duration;
use crate::error::IngestError;
use crate::publish::{MediaFile, VideoArtifacts};
use crate::workspace::Workspace;

const TRACK_LANGUAGE: &str = "fr";

/// A DASH package ready to stream, plus the source duration as `H:MM:SS`.
#[derive(Debug)]
pub struct PackagedMedia {
    pub artifacts: VideoArtifacts,
    pub duration: String,
}

#[derive(Debug, Clone)]
pub struct Transcoder {
    tools: Tools,
}

impl Transcoder {
    pub fn new(tools: Tools) -> Self {
        Self { tools }
    }

    /// Fragment, package, probe, then open the three artifacts read-only.
    /// The first failing stage aborts the whole run.
    #[instrument(skip_all, fields(source = %workspace.source().display()))]
    pub async fn transcode(&self, workspace: &Workspace) -> Result<PackagedMedia, IngestError> {
        run_tool("fragmenter", &self.tools.fragmenter, self.fragment_args(workspace)).await?;
        debug!("fragmented");
        run_tool("packager", &self.tools.packager, self.package_args(workspace)).await?;
        debug!("packaged");
        let duration = self.probe_duration(workspace.source()).await?;

        let artifacts = VideoArtifacts {
            video: open_artifact(&workspace.video_track()).await?,
            audio: open_artifact(&workspace.audio_track()).await?,
            manifest: open_artifact(&workspace.manifest()).await?,
        };
        info!(%duration, "transcoded");
        Ok(PackagedMedia {
            artifacts,
            duration,
        })
    }

    pub fn fragment_args(&self, workspace: &Workspace) -> Vec<OsString> {
        vec![
            "--fragment-duration".into(),
            self.tools.fragment_duration_ms.to_string().into(),
            workspace.source().into(),
            workspace.fragmented().into(),
        ]
    }

    pub fn package_args(&self, workspace: &Workspace) -> Vec<OsString> {
        vec![
            format!("--language-map=en:{TRACK_LANGUAGE},und:{TRACK_LANGUAGE}").into(),
            "--media-prefix".into(),
            workspace.media_prefix().into(),
            "--mpd-name".into(),
            workspace.manifest_name().into(),
            "--profiles".into(),
            "on-demand".into(),
            "--use-segment-timeline".into(),
            workspace.fragmented().into(),
            "-f".into(),
            "-o".into(),
            workspace.dir().into(),
        ]
    }

    pub fn probe_args(source: &Path) -> Vec<OsString> {
        vec![
            "-show_entries".into(),
            "format=duration".into(),
            "-v".into(),
            "quiet".into(),
            "-of".into(),
            "csv=p=0".into(),
            "-sexagesimal".into(),
            source.into(),
        ]
    }

    /// Duration of the original, unfragmented source.
    pub async fn probe_duration(&self, source: &Path) -> Result<String, IngestError> {
        let output = run_tool("prober", &self.tools.prober, Self::probe_args(source)).await?;
        Ok(format_duration(&String::from_utf8_lossy(&output.stdout)))
    }
}

async fn run_tool(
    tool: &'static str,
    command: &ToolCommand,
    args: Vec<OsString>,
) -> Result<Output, IngestError> {
    let output = Command::new(&command.program)
        .args(&command.args)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| IngestError::Spawn { tool, source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(tool, status = %output.status, stderr = %stderr.trim(), "tool failed");
        return Err(IngestError::ToolFailed {
            tool,
            status: output.status,
        });
    }
    Ok(output)
}

async fn open_artifact(path: &Path) -> Result<MediaFile, IngestError> {
    MediaFile::open(path)
        .await
        .map_err(|source| IngestError::MissingArtifact {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Upload;
    use tempfile::tempdir;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn argument_lists_follow_tool_contracts() {
        let td = tempdir().unwrap();
        let ws = Workspace::acquire(td.path(), Upload::from_bytes("a.mp4", b"x".to_vec()))
            .await
            .unwrap();
        let transcoder = Transcoder::new(Tools::default());
        let source = ws.source().to_string_lossy().to_string();
        let base = ws.base_name().to_string();

        assert_eq!(
            strings(transcoder.fragment_args(&ws)),
            vec![
                "--fragment-duration".to_string(),
                "4000".to_string(),
                source.clone(),
                format!("{source}-f.mp4"),
            ]
        );

        let package = strings(transcoder.package_args(&ws));
        assert_eq!(package[0], "--language-map=en:fr,und:fr");
        assert_eq!(package[2], format!("{base}-f"));
        assert_eq!(package[4], format!("{base}.mpd"));
        assert_eq!(&package[5..8], ["--profiles", "on-demand", "--use-segment-timeline"]);
        assert_eq!(package[8], format!("{source}-f.mp4"));
        assert_eq!(package[11], td.path().to_string_lossy());

        let probe = strings(Transcoder::probe_args(ws.source()));
        assert!(probe.contains(&"-sexagesimal".to_string()));
        assert_eq!(probe.last().unwrap(), &source);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let td = tempdir().unwrap();
        let ws = Workspace::acquire(td.path(), Upload::from_bytes("a.mp4", b"x".to_vec()))
            .await
            .unwrap();
        let tools = Tools {
            fragmenter: ToolCommand::new("definitely-not-a-real-fragmenter"),
            ..Tools::default()
        };
        let err = Transcoder::new(tools).transcode(&ws).await.unwrap_err();
        assert!(matches!(err, IngestError::Spawn { tool: "fragmenter", .. }));
    }
}
