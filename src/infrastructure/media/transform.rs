//! The per-kind media transforms the workers invoke.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use super::command::{codec_args, FfmpegCommand, MediaTools};
use super::transcriber::TranscriberChain;
use crate::config::settings::AppConfig;
use crate::modules::jobs::model::PipelineKind;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with code {code:?}: {stderr}")]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("could not read media duration from '{0}'")]
    Probe(String),

    #[error("no speech recognised")]
    NoSpeech,

    #[error("no input clips")]
    NoInputs,

    #[error("transform produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("no transform registered for '{0}'")]
    Unregistered(PipelineKind),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Turns finalized input files into one output file.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn run(&self, inputs: &[PathBuf], output: &Path) -> Result<(), TransformError>;
}

/// Grabs one still frame: at 1s, or the first frame of clips shorter than that.
pub struct ThumbnailTransform {
    tools: MediaTools,
}

impl ThumbnailTransform {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }
}

pub fn thumbnail_offset(duration_secs: f64) -> f64 {
    if duration_secs >= 1.0 { 1.0 } else { 0.0 }
}

#[async_trait]
impl Transform for ThumbnailTransform {
    async fn run(&self, inputs: &[PathBuf], output: &Path) -> Result<(), TransformError> {
        let input = inputs.first().ok_or(TransformError::NoInputs)?;
        let offset = thumbnail_offset(self.tools.duration(input).await?);

        let cmd = FfmpegCommand::new()
            .seek(offset)
            .input(input)
            .single_frame()
            .output(output);
        self.tools.ffmpeg(&cmd).await?;

        ensure_output(output).await
    }
}

/// Joins clips in the order given. Each clip is re-encoded first so the
/// concat demuxer can copy streams without mismatched parameters.
pub struct ConcatTransform {
    tools: MediaTools,
    ext: String,
}

impl ConcatTransform {
    pub fn new(tools: MediaTools, ext: impl Into<String>) -> Self {
        Self {
            tools,
            ext: ext.into(),
        }
    }
}

/// Concat demuxer list file body.
pub fn concat_list(clips: &[PathBuf]) -> String {
    clips.iter().fold(String::new(), |mut list, clip| {
        let escaped = clip.to_string_lossy().replace('\'', r"'\''");
        let _ = writeln!(list, "file '{}'", escaped);
        list
    })
}

#[async_trait]
impl Transform for ConcatTransform {
    async fn run(&self, inputs: &[PathBuf], output: &Path) -> Result<(), TransformError> {
        if inputs.is_empty() {
            return Err(TransformError::NoInputs);
        }

        let workdir = tempfile::tempdir()?;
        let mut normalised = Vec::with_capacity(inputs.len());

        for (i, input) in inputs.iter().enumerate() {
            let clip = workdir.path().join(format!("clip_{:04}.{}", i, self.ext));
            let cmd = FfmpegCommand::new()
                .input(input)
                .video_filter("scale=trunc(iw/2)*2:trunc(ih/2)*2,fps=30")
                .args(["-ar", "44100", "-ac", "2"])
                .args(codec_args(&self.ext))
                .output(&clip);
            self.tools.ffmpeg(&cmd).await?;
            debug!("Normalised clip {} of {}", i + 1, inputs.len());
            normalised.push(clip);
        }

        let list = workdir.path().join("clips.txt");
        fs::write(&list, concat_list(&normalised)).await?;

        let cmd = FfmpegCommand::new()
            .args(["-f", "concat", "-safe", "0"])
            .input(&list)
            .args(["-c", "copy"])
            .output(output);
        self.tools.ffmpeg(&cmd).await?;

        ensure_output(output).await
    }
}

/// Transcribes the audio in fixed windows and burns the text in over a
/// translucent band at the bottom of the frame.
pub struct SubtitleTransform {
    tools: MediaTools,
    transcribers: TranscriberChain,
    ext: String,
    window_secs: u32,
    band_height_px: u32,
}

impl SubtitleTransform {
    pub fn new(
        tools: MediaTools,
        transcribers: TranscriberChain,
        ext: impl Into<String>,
        window_secs: u32,
        band_height_px: u32,
    ) -> Self {
        Self {
            tools,
            transcribers,
            ext: ext.into(),
            window_secs: window_secs.max(1),
            band_height_px,
        }
    }

    async fn transcribe(&self, input: &Path, workdir: &Path) -> Result<Vec<Caption>, TransformError> {
        let pattern = workdir.join("window_%05d.wav");
        let cmd = FfmpegCommand::new()
            .input(input)
            .args(["-vn", "-ac", "1", "-ar", "16000", "-f", "segment"])
            .arg("-segment_time")
            .arg(self.window_secs.to_string())
            .output(&pattern);
        self.tools.ffmpeg(&cmd).await?;

        let mut windows = Vec::new();
        let mut entries = fs::read_dir(workdir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("window_") && name.ends_with(".wav") {
                windows.push(entry.path());
            }
        }
        windows.sort();

        let mut captions = Vec::new();
        for (i, window) in windows.iter().enumerate() {
            if let Some(text) = self.transcribers.transcribe(window).await {
                captions.push(Caption {
                    start_secs: i as u32 * self.window_secs,
                    text,
                });
            }
        }

        info!("Transcribed {} of {} windows", captions.len(), windows.len());
        Ok(captions)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub start_secs: u32,
    pub text: String,
}

fn srt_timestamp(secs: u32) -> String {
    format!("{:02}:{:02}:{:02},000", secs / 3600, (secs / 60) % 60, secs % 60)
}

pub fn build_srt(captions: &[Caption], window_secs: u32) -> String {
    captions
        .iter()
        .enumerate()
        .fold(String::new(), |mut srt, (i, c)| {
            let _ = write!(
                srt,
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                srt_timestamp(c.start_secs),
                srt_timestamp(c.start_secs + window_secs),
                c.text
            );
            srt
        })
}

/// Escapes a path for use as a filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', r"\\")
        .replace(':', r"\:")
        .replace('\'', r"\'")
}

pub fn caption_filter(captions: &[Caption], srt: &Path, window_secs: u32, band_height_px: u32) -> String {
    let mut filters: Vec<String> = captions
        .iter()
        .map(|c| {
            format!(
                "drawbox=x=0:y=ih-{h}:w=iw:h={h}:color=black@0.5:t=fill:enable='between(t,{start},{end})'",
                h = band_height_px,
                start = c.start_secs,
                end = c.start_secs + window_secs,
            )
        })
        .collect();

    filters.push(format!(
        "subtitles=filename='{}':force_style='Fontsize=32,PrimaryColour=&H00FFFFFF,Alignment=2,MarginV={}'",
        escape_filter_path(srt),
        band_height_px / 3
    ));
    filters.join(",")
}

#[async_trait]
impl Transform for SubtitleTransform {
    async fn run(&self, inputs: &[PathBuf], output: &Path) -> Result<(), TransformError> {
        let input = inputs.first().ok_or(TransformError::NoInputs)?;
        let workdir = tempfile::tempdir()?;

        let captions = self.transcribe(input, workdir.path()).await?;

        let mut cmd = FfmpegCommand::new().input(input);
        if !captions.is_empty() {
            let srt = workdir.path().join("captions.srt");
            fs::write(&srt, build_srt(&captions, self.window_secs)).await?;
            cmd = cmd.video_filter(caption_filter(
                &captions,
                &srt,
                self.window_secs,
                self.band_height_px,
            ));
        }
        let cmd = cmd.args(codec_args(&self.ext)).output(output);
        self.tools.ffmpeg(&cmd).await?;

        ensure_output(output).await
    }
}

async fn ensure_output(output: &Path) -> Result<(), TransformError> {
    match fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(TransformError::MissingOutput(output.to_path_buf())),
    }
}

/// Which transform handles which pipeline kind.
#[derive(Clone, Default)]
pub struct TransformTable {
    entries: HashMap<PipelineKind, Arc<dyn Transform>>,
}

impl TransformTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: PipelineKind, transform: Arc<dyn Transform>) -> Self {
        self.entries.insert(kind, transform);
        self
    }

    /// The ffmpeg-backed transforms for every kind.
    pub fn from_config(config: &AppConfig) -> Self {
        let tools = MediaTools::new(&config.ffmpeg_bin, &config.ffprobe_bin);
        let transcribers = TranscriberChain::from_commands(&config.transcriber_commands);

        Self::new()
            .with(
                PipelineKind::Subtitle,
                Arc::new(SubtitleTransform::new(
                    tools.clone(),
                    transcribers,
                    &config.video_format_ext,
                    config.caption_segment_seconds,
                    config.caption_height_px,
                )),
            )
            .with(
                PipelineKind::Concat,
                Arc::new(ConcatTransform::new(tools.clone(), &config.video_format_ext)),
            )
            .with(
                PipelineKind::Thumbnail,
                Arc::new(ThumbnailTransform::new(tools)),
            )
    }

    pub fn get(&self, kind: PipelineKind) -> Result<Arc<dyn Transform>, TransformError> {
        self.entries
            .get(&kind)
            .cloned()
            .ok_or(TransformError::Unregistered(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_offset() {
        assert_eq!(thumbnail_offset(0.4), 0.0);
        assert_eq!(thumbnail_offset(1.0), 1.0);
        assert_eq!(thumbnail_offset(93.2), 1.0);
    }

    #[test]
    fn test_concat_list_preserves_order_and_escapes() {
        let list = concat_list(&[PathBuf::from("/t/a.webm"), PathBuf::from("/t/it's.webm")]);
        assert_eq!(list, "file '/t/a.webm'\nfile '/t/it'\\''s.webm'\n");
    }

    #[test]
    fn test_build_srt() {
        let captions = vec![
            Caption { start_secs: 0, text: "hello".into() },
            Caption { start_secs: 3600, text: "later".into() },
        ];
        let srt = build_srt(&captions, 5);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:05,000\nhello\n\n2\n01:00:00,000 --> 01:00:05,000\nlater\n\n"
        );
    }

    #[test]
    fn test_caption_filter_draws_band_per_caption() {
        let captions = vec![
            Caption { start_secs: 0, text: "a".into() },
            Caption { start_secs: 10, text: "b".into() },
        ];
        let filter = caption_filter(&captions, Path::new("/tmp/c:d.srt"), 5, 100);

        assert_eq!(filter.matches("drawbox=").count(), 2);
        assert!(filter.contains("between(t,10,15)"));
        assert!(filter.contains(r"/tmp/c\:d.srt"));
    }

    #[test]
    fn test_table_reports_unregistered_kind() {
        let table = TransformTable::new();
        assert!(matches!(
            table.get(PipelineKind::Concat),
            Err(TransformError::Unregistered(PipelineKind::Concat))
        ));
        let table = TransformTable::from_config(&AppConfig::default());
        for kind in PipelineKind::ALL {
            assert!(table.get(kind).is_ok());
        }
    }
}
