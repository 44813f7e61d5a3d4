//! ffmpeg / ffprobe invocation.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::transform::TransformError;

/// How many trailing stderr bytes are kept in an error.
const STDERR_TAIL: usize = 2048;

/// Builder for a single ffmpeg run.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCommand {
    args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new() -> Self {
        Self {
            args: vec!["-y".into(), "-hide_banner".into(), "-loglevel".into(), "error".into()],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn input(self, path: &Path) -> Self {
        self.arg("-i").arg(path.to_string_lossy())
    }

    /// Seek before the following input.
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(format!("{:.3}", seconds))
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.arg("-vf").arg(filter)
    }

    pub fn single_frame(self) -> Self {
        self.arg("-frames:v").arg("1").arg("-update").arg("1")
    }

    pub fn output(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn build_args(&self) -> &[String] {
        &self.args
    }
}

/// Encoder arguments for the configured output container.
pub fn codec_args(ext: &str) -> Vec<&'static str> {
    match ext {
        "mp4" | "mov" | "mkv" => vec!["-c:v", "libx264", "-preset", "fast", "-c:a", "aac"],
        _ => vec!["-c:v", "libvpx", "-b:v", "2M", "-c:a", "libvorbis"],
    }
}

/// Paths to the external tools.
#[derive(Debug, Clone)]
pub struct MediaTools {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl MediaTools {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub async fn ffmpeg(&self, cmd: &FfmpegCommand) -> Result<(), TransformError> {
        run(&self.ffmpeg, cmd.build_args()).await.map(|_| ())
    }

    /// Container duration in seconds.
    pub async fn duration(&self, path: &Path) -> Result<f64, TransformError> {
        let path = path.to_string_lossy().into_owned();
        let args = [
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            path.as_str(),
        ];
        let stdout = run(&self.ffprobe, &args).await?;
        parse_duration(&stdout)
    }
}

fn parse_duration(stdout: &str) -> Result<f64, TransformError> {
    let trimmed = stdout.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| TransformError::Probe(trimmed.to_string()))
}

/// Runs `program` to completion and returns its stdout.
pub async fn run<S: AsRef<str>>(program: &str, args: &[S]) -> Result<String, TransformError> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    debug!("Running {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| TransformError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let start = stderr.len().saturating_sub(STDERR_TAIL);
        let tail = stderr
            .get(start..)
            .unwrap_or(&stderr)
            .trim()
            .to_string();

        return Err(TransformError::ExitStatus {
            program: program.to_string(),
            code: output.status.code(),
            stderr: tail,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_thumbnail_command_args() {
        let cmd = FfmpegCommand::new()
            .seek(1.0)
            .input(&PathBuf::from("in.webm"))
            .single_frame()
            .output(&PathBuf::from("out.jpeg"));

        let args = cmd.build_args().join(" ");
        assert!(args.starts_with("-y"));
        assert!(args.contains("-ss 1.000 -i in.webm"));
        assert!(args.ends_with("-frames:v 1 -update 1 out.jpeg"));
    }

    #[test]
    fn test_codec_args_follow_container() {
        assert!(codec_args("webm").contains(&"libvpx"));
        assert!(codec_args("mp4").contains(&"libx264"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.5\n").unwrap(), 12.5);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("").is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = run("definitely-not-a-real-binary-4821", &["-h"])
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Spawn { .. }));
    }
}
