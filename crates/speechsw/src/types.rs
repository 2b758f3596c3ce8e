use serde::{Deserialize, Serialize};

/// Kind of message the host asks to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Char,
    Key,
    /// Accepted but produces no audio
    SoundIcon,
    /// Accepted but produces no audio
    Spell,
}

/// Host punctuation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PunctuationMode {
    All,
    Most,
    #[default]
    Some,
    None,
}

/// Host capital letter recognition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CapitalLettersMode {
    #[default]
    None,
    Spell,
    Icon,
}

/// Voice settings that accompany a speak request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoiceParams {
    /// Language requested by the host; the language is implied by the voice
    pub language_override: Option<String>,
    /// Catalog display name, e.g. `"espeak English (America)"`
    pub voice_name: Option<String>,
    /// [-100, 100]
    pub rate: i32,
    /// [-100, 100]
    pub pitch: i32,
    pub pitch_range: i32,
    pub volume: i32,
    pub punctuation: PunctuationMode,
    pub capital_letters: CapitalLettersMode,
}

impl VoiceParams {
    pub fn with_voice(mut self, voice_name: impl Into<String>) -> Self {
        self.voice_name = Some(voice_name.into());
        self
    }

    pub fn with_rate(mut self, rate: i32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_pitch(mut self, pitch: i32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_punctuation(mut self, punctuation: PunctuationMode) -> Self {
        self.punctuation = punctuation;
        self
    }
}

/// One speak invocation. The payload is owned; the host buffer need not outlive the call.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: Vec<u8>,
    pub kind: MessageKind,
    pub params: VoiceParams,
}

impl SpeechRequest {
    pub fn new(text: impl Into<Vec<u8>>, kind: MessageKind) -> Self {
        Self {
            text: text.into(),
            kind,
            params: VoiceParams::default(),
        }
    }

    pub fn with_params(mut self, params: VoiceParams) -> Self {
        self.params = params;
        self
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }
}

/// Byte order of samples handed to the host queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// 16-bit mono PCM copied out of an engine buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl AudioFrame {
    pub const BITS: u16 = 16;
    pub const CHANNELS: u16 = 1;

    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as f64 / self.sample_rate as f64 * 1000.0) as u64
    }
}
