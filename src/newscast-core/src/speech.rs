//! Speech synthesis for host segments.
//!
//! Two backends: ElevenLabs over HTTP (the production voices, MP3 output) and
//! a local kokoro-tiny engine (WAV output) for offline runs. Both take text
//! that has already been through the sanitizer.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use kokoro_tiny::TtsEngine;
use serde::Serialize;

use crate::config::SpeechConfig;
use crate::error::PodcastError;
use crate::host::Host;

/// Output sample rate of the kokoro engine.
pub const KOKORO_SAMPLE_RATE: u32 = 24_000;

/// Turns sanitized text into an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Extension of the files this backend writes, without the dot.
    fn extension(&self) -> &str;

    /// Synthesize `text` in `host`'s voice and write it to `output`.
    async fn synthesize_to_file(
        &self,
        text: &str,
        host: &Host,
        output: &Path,
    ) -> Result<(), PodcastError>;
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Serialize)]
struct TextToSpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// ElevenLabs text-to-speech client.
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_base: String,
    model_id: String,
    stability: f32,
    similarity_boost: f32,
    /// API keys by voice id; each host may bill to a different account.
    voice_keys: HashMap<String, String>,
    default_key: Option<String>,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
            stability: config.stability,
            similarity_boost: config.similarity_boost,
            voice_keys: HashMap::new(),
            default_key: None,
        }
    }

    /// Use `api_key` for requests in `voice_id`.
    pub fn with_voice_key(
        mut self,
        voice_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.voice_keys.insert(voice_id.into(), api_key.into());
        self
    }

    /// Key for voices without a dedicated one.
    pub fn with_default_key(mut self, api_key: impl Into<String>) -> Self {
        self.default_key = Some(api_key.into());
        self
    }

    fn key_for(&self, voice_id: &str) -> Result<&str, PodcastError> {
        self.voice_keys
            .get(voice_id)
            .or(self.default_key.as_ref())
            .map(String::as_str)
            .ok_or_else(|| {
                PodcastError::Config(format!("No ElevenLabs API key for voice '{}'", voice_id))
            })
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!("{}/text-to-speech/{}", self.api_base, voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn extension(&self) -> &str {
        "mp3"
    }

    async fn synthesize_to_file(
        &self,
        text: &str,
        host: &Host,
        output: &Path,
    ) -> Result<(), PodcastError> {
        let api_key = self.key_for(&host.voice_id)?;
        let body = TextToSpeechRequest {
            text,
            model_id: &self.model_id,
            voice_settings: VoiceSettings {
                stability: self.stability,
                similarity_boost: self.similarity_boost,
            },
        };

        tracing::debug!(
            "Requesting {} characters of speech for {}",
            text.chars().count(),
            host.name
        );
        let response = self
            .client
            .post(self.endpoint(&host.voice_id))
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PodcastError::Synthesis(format!(
                "HTTP {} for {}: {}",
                status,
                host.name,
                error_detail(&body)
            )));
        }

        let audio = response.bytes().await?;
        tokio::fs::write(output, &audio)
            .await
            .map_err(|e| PodcastError::io(output, e))?;
        Ok(())
    }
}

/// Local synthesis with kokoro-tiny (downloads the model on first run).
pub struct KokoroSynthesizer {
    engine: Mutex<TtsEngine>,
    available_voices: Vec<String>,
    speed: f32,
}

impl KokoroSynthesizer {
    pub async fn new(config: &SpeechConfig) -> Result<Self, PodcastError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| PodcastError::Synthesis(format!("Failed to initialize TTS: {}", e)))?;

        let available_voices = engine.voices();

        Ok(Self {
            engine: Mutex::new(engine),
            available_voices,
            speed: config.speed,
        })
    }

    /// Get list of available voice IDs.
    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    /// Validate that a voice ID exists.
    pub fn validate_voice(&self, voice_id: &str) -> Result<(), PodcastError> {
        if !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(PodcastError::Synthesis(format!(
                "Unknown voice '{}'. Available voices:\n{}",
                voice_id,
                format_voices(&self.available_voices)
            )));
        }
        Ok(())
    }

    fn synthesize_samples(&self, text: &str, voice_id: &str) -> Result<Vec<f32>, PodcastError> {
        self.validate_voice(voice_id)?;

        let mut engine = self
            .engine
            .lock()
            .map_err(|_| PodcastError::Synthesis("TTS engine lock poisoned".to_string()))?;

        let mut all_samples = Vec::new();
        for chunk in split_into_chunks(text, 200) {
            let samples = engine
                .synthesize(&chunk, Some(voice_id))
                .map_err(|e| PodcastError::Synthesis(format!("Synthesis failed: {}", e)))?;
            all_samples.extend(samples);
            // 0.3 s between chunks so sentence ends are not clipped.
            all_samples.extend(vec![0.0; (KOKORO_SAMPLE_RATE as usize * 3) / 10]);
        }
        // 0.5 s trailing silence.
        all_samples.extend(vec![0.0; KOKORO_SAMPLE_RATE as usize / 2]);

        Ok(adjust_audio_speed(all_samples, self.speed))
    }
}

#[async_trait]
impl SpeechSynthesizer for KokoroSynthesizer {
    fn extension(&self) -> &str {
        "wav"
    }

    async fn synthesize_to_file(
        &self,
        text: &str,
        host: &Host,
        output: &Path,
    ) -> Result<(), PodcastError> {
        let samples = self.synthesize_samples(text, &host.voice_id)?;
        write_wav(output, &samples, KOKORO_SAMPLE_RATE)
    }
}

/// Pull the message out of an ElevenLabs error body, e.g.
/// `{"detail": {"status": "quota_exceeded", "message": "..."}}`.
fn error_detail(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    match value.get("detail") {
        Some(serde_json::Value::String(message)) => message.clone(),
        Some(detail) => detail
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| detail.to_string()),
        None => body.trim().to_string(),
    }
}

fn format_voices(voices: &[String]) -> String {
    let mut sorted: Vec<&String> = voices.iter().collect();
    sorted.sort();
    sorted
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write mono float samples as a WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), PodcastError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let wav_error = |e: hound::Error| PodcastError::Audio(format!("{}: {}", path.display(), e));

    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)
}

/// Split text into chunks that are safe for local synthesis.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.trim().is_empty() {
                chunks.push(current_chunk.trim().to_string());
            }
            current_chunk.clear();

            // A single overlong sentence is broken at commas instead.
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk.clear();
                    }
                    current_chunk.push_str(part.trim());
                    current_chunk.push(' ');
                }
                continue;
            }
        }

        current_chunk.push_str(sentence);
        current_chunk.push(' ');
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

/// Resample `samples` so playback runs at `rate` times normal speed.
///
/// Values below 1.0 stretch the audio; non-positive rates leave it as is.
pub fn adjust_audio_speed(samples: Vec<f32>, rate: f32) -> Vec<f32> {
    if samples.is_empty() || rate <= 0.0 || (rate - 1.0).abs() < 0.001 {
        return samples;
    }

    let last = samples.len() - 1;
    let output_len = (samples.len() as f32 / rate) as usize;
    (0..output_len)
        .map(|i| {
            let position = i as f32 * rate;
            let at = (position as usize).min(last);
            let next = (at + 1).min(last);
            let weight = position - at as f32;
            samples[at] + (samples[next] - samples[at]) * weight
        })
        .collect()
}
