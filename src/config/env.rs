use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    StorageDir,
    ChunkSizeBytes,
    MaxRequestBytes,
    SubtitleWorkers,
    ConcatWorkers,
    ThumbnailWorkers,
    QueueCapacity,
    VideoFormatExt,
    ImageFormatExt,
    FfmpegBin,
    FfprobeBin,
    TranscriberCommands,
    CaptionSegmentSeconds,
    CaptionHeightPx,
    SessionTtlSecs,
    ReaperIntervalSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::StorageDir => "STORAGE_DIR",
            EnvKey::ChunkSizeBytes => "CHUNK_SIZE_BYTES",
            EnvKey::MaxRequestBytes => "MAX_REQUEST_BYTES",
            EnvKey::SubtitleWorkers => "SUBTITLE_WORKERS",
            EnvKey::ConcatWorkers => "CONCAT_WORKERS",
            EnvKey::ThumbnailWorkers => "THUMBNAIL_WORKERS",
            EnvKey::QueueCapacity => "QUEUE_CAPACITY",
            EnvKey::VideoFormatExt => "VIDEO_FORMAT_EXT",
            EnvKey::ImageFormatExt => "IMAGE_FORMAT_EXT",
            EnvKey::FfmpegBin => "FFMPEG_BIN",
            EnvKey::FfprobeBin => "FFPROBE_BIN",
            EnvKey::TranscriberCommands => "TRANSCRIBER_COMMANDS",
            EnvKey::CaptionSegmentSeconds => "CAPTION_SEGMENT_SECONDS",
            EnvKey::CaptionHeightPx => "CAPTION_HEIGHT_PX",
            EnvKey::SessionTtlSecs => "SESSION_TTL_SECS",
            EnvKey::ReaperIntervalSecs => "REAPER_INTERVAL_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
