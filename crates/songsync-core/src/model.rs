use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SECTION_ENERGY: f64 = 0.5;
pub const CHORDS_ROLE: &str = "chords";
pub const PLACEHOLDER_ROLE: &str = "dummy";

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid time signature {numerator}/{denominator}")]
    InvalidMeter { numerator: u32, denominator: u32 },
    #[error("invalid tempo: {0}")]
    InvalidTempo(f64),
    #[error("section \"{name}\": {reason}")]
    InvalidSection { name: String, reason: String },
    #[error("section \"{next}\" starts before section \"{previous}\" ends")]
    OverlappingSections { previous: String, next: String },
    #[error("track \"{track}\": midi channel {channel} is outside 1..=16")]
    InvalidMidiChannel { track: String, channel: u8 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongDescription {
    pub song_structure: SongStructure,
    pub tracks: Vec<TrackSpec>,
}

impl SongDescription {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.song_structure.validate()?;

        for track in &self.tracks {
            if let Some(external) = &track.external_instrument
                && !(1..=16).contains(&external.midi_channel)
            {
                return Err(ValidationError::InvalidMidiChannel {
                    track: track.name.clone(),
                    channel: external.midi_channel,
                });
            }
        }
        Ok(())
    }

    /// A song without a chord track is still synced; it just yields no
    /// harmonic content.
    #[must_use]
    pub fn has_chord_track(&self) -> bool {
        self.chord_tracks().next().is_some()
    }

    /// Declared tracks whose role is `chords`, compared case-insensitively.
    pub fn chord_tracks(&self) -> impl Iterator<Item = (usize, &TrackSpec)> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.is_chord_track())
    }

    #[must_use]
    pub fn sections(&self) -> &[SectionSpec] {
        &self.song_structure.sections
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongStructure {
    pub total_length_bars: u32,
    pub tempo: f64,
    pub signature_numerator: u32,
    pub signature_denominator: u32,
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
}

impl SongStructure {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.signature_numerator == 0 || self.signature_denominator == 0 {
            return Err(ValidationError::InvalidMeter {
                numerator: self.signature_numerator,
                denominator: self.signature_denominator,
            });
        }
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(ValidationError::InvalidTempo(self.tempo));
        }

        let mut previous: Option<&SectionSpec> = None;
        for section in &self.sections {
            section.validate()?;
            if let Some(previous) = previous
                && section.start_bar < previous.end_bar()
            {
                return Err(ValidationError::OverlappingSections {
                    previous: previous.name.clone(),
                    next: section.name.clone(),
                });
            }
            previous = Some(section);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionSpec {
    pub name: String,
    pub start_bar: u32,
    pub length_bars: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
}

impl SectionSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, start_bar: u32, length_bars: u32) -> Self {
        Self {
            name: name.into(),
            start_bar,
            length_bars,
            mood: None,
            chords: None,
            energy: None,
        }
    }

    #[must_use]
    pub fn with_chords<I, S>(mut self, chords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chords = Some(chords.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = Some(energy);
        self
    }

    #[must_use]
    pub fn energy(&self) -> f64 {
        self.energy.unwrap_or(DEFAULT_SECTION_ENERGY)
    }

    #[must_use]
    pub fn chords(&self) -> &[String] {
        self.chords.as_deref().unwrap_or_default()
    }

    /// First bar after the section (1-based, exclusive).
    #[must_use]
    pub fn end_bar(&self) -> u32 {
        self.start_bar.saturating_add(self.length_bars)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidSection {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.start_bar == 0 {
            return Err(invalid("start_bar is 1-based and must be positive"));
        }
        if self.length_bars == 0 {
            return Err(invalid("length_bars must be positive"));
        }
        if let Some(energy) = self.energy
            && !(0.0..=1.0).contains(&energy)
        {
            return Err(invalid("energy must lie within [0, 1]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Midi,
    Return,
    Master,
}

impl TrackKind {
    /// Only audio and MIDI tracks have a record-arm switch.
    #[must_use]
    pub const fn can_arm(self) -> bool {
        matches!(self, Self::Audio | Self::Midi)
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Audio => "audio",
            Self::Midi => "midi",
            Self::Return => "return",
            Self::Master => "master",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackSpec {
    pub name: String,
    pub role: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_chain: Vec<DeviceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_instrument: Option<ExternalInstrument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instruments: Vec<InstrumentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armed: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clips: Vec<ClipSpec>,
}

impl TrackSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, role: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            kind,
            device_chain: Vec::new(),
            external_instrument: None,
            instruments: Vec::new(),
            color: None,
            group: None,
            comments: None,
            volume: None,
            pan: None,
            muted: None,
            solo: None,
            armed: None,
            clips: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_chord_track(&self) -> bool {
        self.role.eq_ignore_ascii_case(CHORDS_ROLE)
    }

    #[must_use]
    pub fn has_devices(&self) -> bool {
        !self.instruments.is_empty()
            || !self.device_chain.is_empty()
            || self.external_instrument.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSpec {
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalInstrument {
    pub midi_port: String,
    pub midi_channel: u8,
    pub audio_from: String,
    pub latency_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl InstrumentSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preset: None,
            parameters: BTreeMap::new(),
        }
    }
}

/// A static clip declared on a track. Positions are already in beats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipSpec {
    #[serde(alias = "startTime")]
    pub start_time: f64,
    pub length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub pitch: i32,
    pub start_beats: f64,
    pub duration_beats: f64,
    pub velocity: u8,
}

impl Note {
    #[must_use]
    pub fn end_beats(&self) -> f64 {
        self.start_beats + self.duration_beats
    }
}

/// Generated clip content, positioned in session beats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipWithNotes {
    pub start_beats: f64,
    pub length_beats: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl ClipWithNotes {
    #[must_use]
    pub fn empty(name: impl Into<String>, start_beats: f64, length_beats: f64) -> Self {
        Self {
            start_beats,
            length_beats,
            name: name.into(),
            color: None,
            notes: Vec::new(),
        }
    }

    #[must_use]
    pub fn end_beats(&self) -> f64 {
        self.start_beats + self.length_beats
    }
}
