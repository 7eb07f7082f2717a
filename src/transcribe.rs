//! Voice notes: capture a short clip with `ffmpeg`, transcribe it with `whisper`
//!
//! Both tools are external programs found on PATH. Capture failures are
//! reported as errors; transcription failures come back as a sentinel string
//! the widget shows in place of the transcript.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

use crate::config::RecordingConfig;

pub const TRANSCRIPTION_FAILED: &str = "Transcription failed";

#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("{0} is not installed or not in PATH")]
    ToolUnavailable(String),
    #[error("Audio capture failed: {0}")]
    Capture(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// ffmpeg input format and device for the default microphone
pub fn input_device() -> (&'static str, &'static str) {
    if cfg!(target_os = "macos") {
        ("avfoundation", ":0")
    } else if cfg!(target_os = "windows") {
        ("dshow", "audio=default")
    } else {
        ("pulse", "default")
    }
}

pub struct Transcriber {
    work_dir: PathBuf,
    config: RecordingConfig,
    ffmpeg: String,
    whisper: String,
}

impl Transcriber {
    pub fn new(work_dir: impl Into<PathBuf>, config: RecordingConfig) -> Self {
        Self::with_programs(work_dir, config, "ffmpeg", "whisper")
    }

    pub fn with_programs(
        work_dir: impl Into<PathBuf>,
        config: RecordingConfig,
        ffmpeg: impl Into<String>,
        whisper: impl Into<String>,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            config,
            ffmpeg: ffmpeg.into(),
            whisper: whisper.into(),
        }
    }

    async fn ffmpeg_available(&self) -> bool {
        match Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }

    fn capture_args(&self, output: &Path) -> Vec<OsString> {
        let (format, device) = input_device();
        vec![
            "-y".into(),
            "-f".into(),
            format.into(),
            "-i".into(),
            device.into(),
            "-t".into(),
            self.config.seconds.to_string().into(),
            output.as_os_str().to_owned(),
        ]
    }

    fn whisper_args(&self, audio: &Path) -> Vec<OsString> {
        vec![
            audio.as_os_str().to_owned(),
            "--model".into(),
            self.config.whisper_model.as_str().into(),
            "--output_format".into(),
            "txt".into(),
            "--output_dir".into(),
            self.work_dir.as_os_str().to_owned(),
        ]
    }

    /// Record `seconds` of audio into a fresh file in the work directory
    pub async fn capture(&self) -> Result<PathBuf, TranscribeError> {
        if !self.ffmpeg_available().await {
            return Err(TranscribeError::ToolUnavailable(self.ffmpeg.clone()));
        }

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let output = self
            .work_dir
            .join(format!("pensieve-{}.wav", Uuid::new_v4()));

        log::info!(
            "[transcribe] Capturing {}s of audio to {}",
            self.config.seconds,
            output.display()
        );
        let result = Command::new(&self.ffmpeg)
            .args(self.capture_args(&output))
            .stdin(Stdio::null())
            .output()
            .await?;

        if !result.status.success() {
            // ffmpeg may have written a header before failing
            remove_quietly(&output).await;
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = stderr
                .lines()
                .last()
                .map(str::to_string)
                .unwrap_or_else(|| result.status.to_string());
            return Err(TranscribeError::Capture(reason));
        }
        Ok(output)
    }

    /// Run whisper over `audio`. Any failure yields [`TRANSCRIPTION_FAILED`].
    pub async fn transcribe(&self, audio: &Path) -> String {
        log::info!("[transcribe] Transcribing {}", audio.display());

        let transcript_path = match audio.file_stem() {
            Some(stem) => self.work_dir.join(stem).with_extension("txt"),
            None => return TRANSCRIPTION_FAILED.to_string(),
        };

        let status = Command::new(&self.whisper)
            .args(self.whisper_args(audio))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                log::warn!("[transcribe] whisper exited with {}", status);
                return TRANSCRIPTION_FAILED.to_string();
            }
            Err(e) => {
                log::warn!("[transcribe] Failed to run {}: {}", self.whisper, e);
                return TRANSCRIPTION_FAILED.to_string();
            }
        }

        match tokio::fs::read_to_string(&transcript_path).await {
            Ok(text) => {
                remove_quietly(&transcript_path).await;
                text.trim().to_string()
            }
            Err(e) => {
                log::warn!(
                    "[transcribe] No transcript at {}: {}",
                    transcript_path.display(),
                    e
                );
                TRANSCRIPTION_FAILED.to_string()
            }
        }
    }

    pub async fn record_and_transcribe(&self) -> Result<String, TranscribeError> {
        let audio = self.capture().await?;
        let transcript = self.transcribe(&audio).await;
        remove_quietly(&audio).await;
        Ok(transcript)
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        log::debug!("[transcribe] Could not remove {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING: &str = "pensieve-test-no-such-program";

    #[tokio::test]
    async fn test_missing_ffmpeg_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber =
            Transcriber::with_programs(dir.path(), RecordingConfig::default(), MISSING, MISSING);

        let err = transcriber.record_and_transcribe().await.unwrap_err();
        assert!(matches!(err, TranscribeError::ToolUnavailable(ref p) if p == MISSING));
        assert!(err.to_string().contains("not installed or not in PATH"));
    }

    #[tokio::test]
    async fn test_missing_whisper_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"RIFF").unwrap();
        let transcriber =
            Transcriber::with_programs(dir.path(), RecordingConfig::default(), MISSING, MISSING);

        assert_eq!(transcriber.transcribe(&audio).await, TRANSCRIPTION_FAILED);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transcript_is_read_from_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"RIFF").unwrap();
        std::fs::write(dir.path().join("clip.txt"), " call mom \n").unwrap();

        // `true` accepts any arguments and leaves the prepared transcript alone
        let transcriber =
            Transcriber::with_programs(dir.path(), RecordingConfig::default(), MISSING, "true");

        assert_eq!(transcriber.transcribe(&audio).await, "call mom");
        assert!(!dir.path().join("clip.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_whisper_without_output_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.wav");
        let transcriber =
            Transcriber::with_programs(dir.path(), RecordingConfig::default(), MISSING, "true");

        assert_eq!(transcriber.transcribe(&audio).await, TRANSCRIPTION_FAILED);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_capture_leaves_no_audio_behind() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let work_dir = dir.path().join("work");
        // Answers -version, then writes a partial file and fails like a busy device
        let ffmpeg = dir.path().join("ffmpeg");
        std::fs::write(
            &ffmpeg,
            "#!/bin/sh\n\
             [ \"$1\" = \"-version\" ] && exit 0\n\
             for out; do :; done\n\
             echo RIFF > \"$out\"\n\
             echo 'Device or resource busy' >&2\n\
             exit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

        let transcriber = Transcriber::with_programs(
            &work_dir,
            RecordingConfig::default(),
            ffmpeg.to_string_lossy(),
            MISSING,
        );

        let err = transcriber.record_and_transcribe().await.unwrap_err();
        assert!(matches!(err, TranscribeError::Capture(ref reason) if reason == "Device or resource busy"));
        assert_eq!(std::fs::read_dir(&work_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_command_lines() {
        let config = RecordingConfig {
            seconds: 7,
            whisper_model: "tiny".to_string(),
        };
        let transcriber = Transcriber::new("/tmp/pensieve", config);
        let (format, device) = input_device();

        let capture = transcriber.capture_args(Path::new("/tmp/pensieve/a.wav"));
        let expected: Vec<OsString> = ["-y", "-f", format, "-i", device, "-t", "7", "/tmp/pensieve/a.wav"]
            .iter()
            .map(OsString::from)
            .collect();
        assert_eq!(capture, expected);

        let whisper = transcriber.whisper_args(Path::new("/tmp/pensieve/a.wav"));
        let expected: Vec<OsString> = [
            "/tmp/pensieve/a.wav",
            "--model",
            "tiny",
            "--output_format",
            "txt",
            "--output_dir",
            "/tmp/pensieve",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        assert_eq!(whisper, expected);
    }
}
