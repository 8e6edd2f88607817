use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use parking_lot::Mutex;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use serde::Deserialize;
use tracing::{debug, info};

use super::{PlaybackEvents, SpeechEngine, StreamFormat};
use crate::segmenter::split_sentences;
use crate::wav::{check_sample_rate, samples_to_pcm16};

/// Entry of `models/map.json`, keyed by language.
///
/// Either a bare config path, `{ "config": ... }`, or
/// `{ "default_voice": ..., "voices": { id: { "config": ... } } }`.
/// Extra keys such as `default_speaker` are ignored: piper-rs exposes no
/// speaker selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum VoiceMapEntry {
    Voices {
        default_voice: String,
        voices: HashMap<String, VoiceConfig>,
    },
    Config(VoiceConfig),
    Path(String),
}

#[derive(Debug, Clone, Deserialize)]
struct VoiceConfig {
    config: String,
}

/// Resolve a voice key to a piper config path.
///
/// `voice` is a language key (`en_US`) or `language/voice_id` (`en_US/amy`).
pub fn resolve_voice_config<P: AsRef<Path>>(map_path: P, voice: &str) -> anyhow::Result<PathBuf> {
    let text = fs::read_to_string(map_path.as_ref())
        .with_context(|| format!("Failed to load {}", map_path.as_ref().display()))?;
    let map: HashMap<String, VoiceMapEntry> =
        serde_json::from_str(&text).with_context(|| "map.json is not a valid voice map")?;

    let (lang, voice_id) = match voice.split_once('/') {
        Some((lang, id)) => (lang, Some(id)),
        None => (voice, None),
    };

    let entry = map.get(lang).ok_or_else(|| {
        let mut known: Vec<&String> = map.keys().collect();
        known.sort();
        anyhow::anyhow!("Unknown language key: {lang}. Known: {known:?}")
    })?;

    let config = match entry {
        VoiceMapEntry::Voices {
            default_voice,
            voices,
        } => {
            let id = voice_id.unwrap_or(default_voice);
            voices
                .get(id)
                .map(|v| v.config.clone())
                .ok_or_else(|| anyhow::anyhow!("Unknown voice '{id}' for language '{lang}'"))?
        }
        VoiceMapEntry::Config(v) => v.config.clone(),
        VoiceMapEntry::Path(path) => path.clone(),
    };
    Ok(PathBuf::from(config))
}

/// Read sample rate from a piper voice config JSON.
fn read_sample_rate<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<u32> {
    let text = fs::read_to_string(cfg_path.as_ref())
        .with_context(|| format!("Failed to read config file: {}", cfg_path.as_ref().display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;

    let sample_rate = json
        .get("audio")
        .and_then(|a| a.get("sample_rate"))
        .and_then(|sr| sr.as_u64())
        .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;

    check_sample_rate(sample_rate)
        .with_context(|| format!("Bad 'audio.sample_rate' in {}", cfg_path.as_ref().display()))
}

/// Neural engine backed by a single piper voice.
pub struct PiperEngine {
    config_path: PathBuf,
    synth: Mutex<PiperSpeechSynthesizer>,
    sample_rate: u32,
    pending: Mutex<VecDeque<String>>,
    shut_down: AtomicBool,
}

impl PiperEngine {
    /// Load the voice `voice` listed in the model map at `map_path`.
    pub fn from_map_file<P: AsRef<Path>>(map_path: P, voice: &str) -> anyhow::Result<Self> {
        let cfg_path = resolve_voice_config(map_path, voice)?;
        Self::from_config_path(cfg_path)
    }

    pub fn from_config_path<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<Self> {
        let sample_rate = read_sample_rate(&cfg_path)?;
        let model = piper_rs::from_config_path(cfg_path.as_ref())
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = PiperSpeechSynthesizer::new(model)
            .map_err(|e| anyhow::anyhow!("piper synthesizer error: {e}"))?;

        info!(
            config = %cfg_path.as_ref().display(),
            sample_rate,
            "Loaded piper voice"
        );
        Ok(Self {
            config_path: cfg_path.as_ref().to_path_buf(),
            synth: Mutex::new(synth),
            sample_rate,
            pending: Mutex::new(VecDeque::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn next_text(&self) -> Option<String> {
        self.pending.lock().pop_front()
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl SpeechEngine for PiperEngine {
    fn feed(&self, text: &str) {
        if self.is_shut_down() {
            return;
        }
        self.pending.lock().push_back(text.to_string());
    }

    fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    fn play(&self, events: &dyn PlaybackEvents) -> anyhow::Result<()> {
        let synth = self.synth.lock();

        'queue: while let Some(text) = self.next_text() {
            for sentence in split_sentences(&text) {
                if self.is_shut_down() {
                    break 'queue;
                }
                debug!(chars = sentence.chars().count(), "Synthesizing sentence");

                let iter: PiperSpeechStreamParallel = synth
                    .synthesize_parallel(sentence, None)
                    .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;
                for part in iter {
                    let samples = part
                        .map_err(|e| anyhow::anyhow!("chunk error: {e}"))?
                        .into_vec();
                    events.on_chunk(&samples_to_pcm16(&samples));
                }
                events.on_sentence_boundary();
            }
        }

        events.on_stream_stopped();
        Ok(())
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::mono(self.sample_rate)
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.pending.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tts_core_piper_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_resolve_all_map_formats() {
        let map = write_temp(
            "map.json",
            r#"{
                "de_DE": "models/de_DE/de_DE-thorsten-medium.onnx.json",
                "fr_FR": { "config": "models/fr_FR/fr_FR-siwis-medium.onnx.json", "default_speaker": 0 },
                "en_US": {
                    "default_voice": "lessac",
                    "voices": {
                        "lessac": { "config": "models/en_US/en_US-lessac-medium.onnx.json" },
                        "amy": { "config": "models/en_US/en_US-amy-medium.onnx.json" }
                    }
                }
            }"#,
        );

        assert_eq!(
            resolve_voice_config(&map, "de_DE").unwrap(),
            PathBuf::from("models/de_DE/de_DE-thorsten-medium.onnx.json")
        );
        assert_eq!(
            resolve_voice_config(&map, "fr_FR").unwrap(),
            PathBuf::from("models/fr_FR/fr_FR-siwis-medium.onnx.json")
        );
        assert_eq!(
            resolve_voice_config(&map, "en_US").unwrap(),
            PathBuf::from("models/en_US/en_US-lessac-medium.onnx.json")
        );
        assert_eq!(
            resolve_voice_config(&map, "en_US/amy").unwrap(),
            PathBuf::from("models/en_US/en_US-amy-medium.onnx.json")
        );
    }

    #[test]
    fn test_resolve_unknown_voice() {
        let map = write_temp("map_unknown.json", r#"{ "de_DE": "a.onnx.json" }"#);
        let err = resolve_voice_config(&map, "es_ES").unwrap_err();
        assert!(err.to_string().contains("Unknown language key"));
    }

    #[test]
    fn test_read_sample_rate() {
        let cfg = write_temp("voice.onnx.json", r#"{ "audio": { "sample_rate": 22050 } }"#);
        assert_eq!(read_sample_rate(&cfg).unwrap(), 22_050);

        let bad = write_temp("bad.onnx.json", r#"{ "audio": {} }"#);
        assert!(read_sample_rate(&bad).is_err());

        let huge = write_temp(
            "huge.onnx.json",
            r#"{ "audio": { "sample_rate": 4294989346 } }"#,
        );
        assert!(read_sample_rate(&huge).is_err());

        let zero = write_temp("zero.onnx.json", r#"{ "audio": { "sample_rate": 0 } }"#);
        assert!(read_sample_rate(&zero).is_err());
    }
}
