use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

use super::command;
use super::transform::TransformError;

/// Placeholder in a transcriber command line replaced with the wav path.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Turns a short mono wav into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(&self, wav: &Path) -> Result<String, TransformError>;
}

/// Runs an external speech-to-text program and reads the text from stdout.
pub struct CommandTranscriber {
    argv: Vec<String>,
}

impl CommandTranscriber {
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            return None;
        }
        Some(Self { argv })
    }

    fn args_for(&self, wav: &Path) -> Vec<String> {
        let wav = wav.to_string_lossy();
        let mut args: Vec<String> = self.argv[1..]
            .iter()
            .map(|a| a.replace(INPUT_PLACEHOLDER, &wav))
            .collect();

        if !self.argv.iter().any(|a| a.contains(INPUT_PLACEHOLDER)) {
            args.push(wav.into_owned());
        }
        args
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    fn name(&self) -> &str {
        &self.argv[0]
    }

    async fn transcribe(&self, wav: &Path) -> Result<String, TransformError> {
        let stdout = command::run(&self.argv[0], &self.args_for(wav)).await?;
        let text = stdout.split_whitespace().collect::<Vec<_>>().join(" ");

        if text.is_empty() {
            return Err(TransformError::NoSpeech);
        }
        Ok(text)
    }
}

/// Tries each transcriber in order; the first one that produces text wins.
#[derive(Default)]
pub struct TranscriberChain {
    transcribers: Vec<Box<dyn Transcriber>>,
}

impl TranscriberChain {
    pub fn new(transcribers: Vec<Box<dyn Transcriber>>) -> Self {
        Self { transcribers }
    }

    pub fn from_commands(commands: &[Vec<String>]) -> Self {
        let transcribers = commands
            .iter()
            .filter_map(|argv| CommandTranscriber::new(argv.clone()))
            .map(|t| Box::new(t) as Box<dyn Transcriber>)
            .collect();
        Self { transcribers }
    }

    /// `None` when every transcriber failed; the window is then left without
    /// a caption.
    pub async fn transcribe(&self, wav: &Path) -> Option<String> {
        for transcriber in &self.transcribers {
            debug!("Transcribing {} using {}", wav.display(), transcriber.name());
            match transcriber.transcribe(wav).await {
                Ok(text) => return Some(text),
                Err(e) => warn!(
                    "Transcriber {} could not transcribe {}: {}",
                    transcriber.name(),
                    wav.display(),
                    e
                ),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Fixed(&'static str, Option<&'static str>);

    #[async_trait]
    impl Transcriber for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn transcribe(&self, _wav: &Path) -> Result<String, TransformError> {
            self.1.map(str::to_string).ok_or(TransformError::NoSpeech)
        }
    }

    #[tokio::test]
    async fn test_chain_falls_through_failures() {
        let chain = TranscriberChain::new(vec![
            Box::new(Fixed("whisper", None)),
            Box::new(Fixed("vosk", Some("hello there"))),
            Box::new(Fixed("sphinx", Some("unused"))),
        ]);

        let text = chain.transcribe(&PathBuf::from("seg.wav")).await;
        assert_eq!(text.as_deref(), Some("hello there"));
    }

    #[tokio::test]
    async fn test_chain_gives_up_when_all_fail() {
        let chain = TranscriberChain::new(vec![Box::new(Fixed("whisper", None))]);
        assert!(chain.transcribe(&PathBuf::from("seg.wav")).await.is_none());
        assert!(TranscriberChain::default().transcribe(&PathBuf::from("x")).await.is_none());
    }

    #[test]
    fn test_placeholder_substitution() {
        let t = CommandTranscriber::new(vec!["whisper-cli".into(), "-f".into(), "{input}".into()])
            .unwrap();
        assert_eq!(t.args_for(&PathBuf::from("/tmp/a.wav")), vec!["-f", "/tmp/a.wav"]);

        let t = CommandTranscriber::new(vec!["vosk".into()]).unwrap();
        assert_eq!(t.args_for(&PathBuf::from("/tmp/a.wav")), vec!["/tmp/a.wav"]);

        assert!(CommandTranscriber::new(vec![]).is_none());
    }
}
