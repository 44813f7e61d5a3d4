use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::env::{self, EnvKey};
use crate::modules::jobs::model::PipelineKind;

/// int(1.8 MiB), the retrieval window clients were built against.
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 1_887_436;

const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;
const DEFAULT_TRANSCRIBER: &str = "whisper-cli -nt -np -f {input}";

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub storage_dir: PathBuf,
    pub chunk_size_bytes: usize,
    pub max_request_bytes: usize,
    pub subtitle_workers: usize,
    pub concat_workers: usize,
    pub thumbnail_workers: usize,
    pub queue_capacity: usize,
    pub video_format_ext: String,
    pub image_format_ext: String,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    /// Each entry is a program followed by its arguments; `{input}` is replaced
    /// with the wav file to transcribe. Tried in order until one succeeds.
    pub transcriber_commands: Vec<Vec<String>>,
    pub caption_segment_seconds: u32,
    pub caption_height_px: u32,
    /// Zero disables the reaper.
    pub session_ttl_secs: u64,
    pub reaper_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            storage_dir: PathBuf::from("./storage"),
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            subtitle_workers: 1,
            concat_workers: 2,
            thumbnail_workers: 2,
            queue_capacity: 16,
            video_format_ext: "webm".to_string(),
            image_format_ext: "jpeg".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            transcriber_commands: parse_transcriber_commands(DEFAULT_TRANSCRIBER),
            caption_segment_seconds: 5,
            caption_height_px: 100,
            session_ttl_secs: 24 * 60 * 60,
            reaper_interval_secs: 300,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        let defaults = Self::default();

        Self {
            server_port: env::get_parsed(EnvKey::ServerPort, defaults.server_port),
            storage_dir: PathBuf::from(env::get_or(EnvKey::StorageDir, "./storage")),
            chunk_size_bytes: env::get_parsed(EnvKey::ChunkSizeBytes, defaults.chunk_size_bytes)
                .max(1),
            max_request_bytes: env::get_parsed(EnvKey::MaxRequestBytes, defaults.max_request_bytes),
            subtitle_workers: env::get_parsed(EnvKey::SubtitleWorkers, defaults.subtitle_workers)
                .max(1),
            concat_workers: env::get_parsed(EnvKey::ConcatWorkers, defaults.concat_workers).max(1),
            thumbnail_workers: env::get_parsed(EnvKey::ThumbnailWorkers, defaults.thumbnail_workers)
                .max(1),
            queue_capacity: env::get_parsed(EnvKey::QueueCapacity, defaults.queue_capacity).max(1),
            video_format_ext: env::get_or(EnvKey::VideoFormatExt, &defaults.video_format_ext),
            image_format_ext: env::get_or(EnvKey::ImageFormatExt, &defaults.image_format_ext),
            ffmpeg_bin: env::get_or(EnvKey::FfmpegBin, &defaults.ffmpeg_bin),
            ffprobe_bin: env::get_or(EnvKey::FfprobeBin, &defaults.ffprobe_bin),
            transcriber_commands: parse_transcriber_commands(&env::get_or(
                EnvKey::TranscriberCommands,
                DEFAULT_TRANSCRIBER,
            )),
            caption_segment_seconds: env::get_parsed(
                EnvKey::CaptionSegmentSeconds,
                defaults.caption_segment_seconds,
            )
            .max(1),
            caption_height_px: env::get_parsed(EnvKey::CaptionHeightPx, defaults.caption_height_px),
            session_ttl_secs: env::get_parsed(EnvKey::SessionTtlSecs, defaults.session_ttl_secs),
            reaper_interval_secs: env::get_parsed(
                EnvKey::ReaperIntervalSecs,
                defaults.reaper_interval_secs,
            )
            .max(1),
        }
    }

    pub fn workers_for(&self, kind: PipelineKind) -> usize {
        match kind {
            PipelineKind::Subtitle => self.subtitle_workers,
            PipelineKind::Concat => self.concat_workers,
            PipelineKind::Thumbnail => self.thumbnail_workers,
        }
    }

    /// Extension of the artifact a pipeline produces.
    pub fn output_ext(&self, kind: PipelineKind) -> &str {
        match kind {
            PipelineKind::Thumbnail => &self.image_format_ext,
            PipelineKind::Subtitle | PipelineKind::Concat => &self.video_format_ext,
        }
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }
}

fn parse_transcriber_commands(raw: &str) -> Vec<Vec<String>> {
    raw.split(';')
        .map(|cmd| cmd.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|argv| !argv.is_empty())
        .collect()
}
