// Configuration for the relay server, read from the environment (and `.env`).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tts_core::{RelayOptions, DEFAULT_MAX_PENDING_CLIPS, DEFAULT_MIN_SEGMENT_BYTES};

/// Which synthesis engine backs the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Neural piper voice from the model map.
    Piper,
    /// Model-free sine tones, for wiring up clients without a voice installed.
    Tone,
}

impl FromStr for EngineKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "piper" => Ok(Self::Piper),
            "tone" => Ok(Self::Tone),
            other => Err(anyhow::anyhow!(
                "Unknown engine '{other}'. Expected 'piper' or 'tone'"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub engine: EngineKind,
    pub model_map: PathBuf,
    pub voice: String,
    pub tone_sample_rate: u32,
    pub min_segment_bytes: usize,
    pub max_pending_clips: usize,
    pub max_pull_wait_ms: u64,
    pub notification_message: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            request_timeout_secs: 60,
            cors_allowed_origins: None,
            engine: EngineKind::Piper,
            model_map: PathBuf::from("models/map.json"),
            voice: "en_US".to_string(),
            tone_sample_rate: 22_050,
            min_segment_bytes: DEFAULT_MIN_SEGMENT_BYTES,
            max_pending_clips: DEFAULT_MAX_PENDING_CLIPS,
            max_pull_wait_ms: 5_000,
            notification_message: "answer".to_string(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let engine = match std::env::var("TTS_ENGINE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.engine,
        };

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect()
            });

        Ok(Self {
            port: env_parse("PORT", defaults.port),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            cors_allowed_origins,
            engine,
            model_map: std::env::var("TTS_MODEL_MAP")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_map),
            voice: std::env::var("TTS_VOICE").unwrap_or(defaults.voice),
            tone_sample_rate: env_parse("TONE_SAMPLE_RATE", defaults.tone_sample_rate),
            min_segment_bytes: env_parse("MIN_SEGMENT_BYTES", defaults.min_segment_bytes),
            max_pending_clips: env_parse("MAX_PENDING_CLIPS", defaults.max_pending_clips),
            max_pull_wait_ms: env_parse("MAX_PULL_WAIT_MS", defaults.max_pull_wait_ms),
            notification_message: std::env::var("NOTIFICATION_MESSAGE")
                .unwrap_or(defaults.notification_message),
        })
    }

    /// Apply command line arguments: an optional engine name as the first argument.
    pub fn with_args<I: IntoIterator<Item = String>>(mut self, args: I) -> anyhow::Result<Self> {
        if let Some(engine) = args.into_iter().next() {
            self.engine = engine.parse()?;
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Upper bound for the `wait_ms` parameter of the pull endpoint.
    pub fn max_pull_wait(&self) -> Duration {
        Duration::from_millis(self.max_pull_wait_ms)
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            min_segment_bytes: self.min_segment_bytes,
            max_pending_clips: self.max_pending_clips,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("piper".parse::<EngineKind>().unwrap(), EngineKind::Piper);
        assert_eq!(" Tone ".parse::<EngineKind>().unwrap(), EngineKind::Tone);
        assert!("coqui".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_args_override_engine() {
        let config = ServerConfig::default()
            .with_args(vec!["tone".to_string()])
            .unwrap();
        assert_eq!(config.engine, EngineKind::Tone);

        let config = ServerConfig::default().with_args(Vec::new()).unwrap();
        assert_eq!(config.engine, EngineKind::Piper);

        assert!(ServerConfig::default()
            .with_args(vec!["bogus".to_string()])
            .is_err());
    }

    #[test]
    fn test_relay_options_follow_config() {
        let config = ServerConfig {
            min_segment_bytes: 2048,
            max_pending_clips: 0,
            ..ServerConfig::default()
        };
        let options = config.relay_options();
        assert_eq!(options.min_segment_bytes, 2048);
        assert_eq!(options.max_pending_clips, 0);
        assert_eq!(config.max_pull_wait(), Duration::from_secs(5));
    }
}
