//! Chord voicing with humanized velocities.

use std::fmt;

use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{ClipWithNotes, Note, SectionSpec};

pub const DEFAULT_OCTAVE: i32 = 3;
pub const MIN_VELOCITY: u8 = 1;
pub const MAX_VELOCITY: u8 = 127;

const MINOR_THIRD: i32 = 3;
const MAJOR_THIRD: i32 = 4;
const FIFTH: i32 = 7;
const OCTAVE: i32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordSymbol {
    pub symbol: String,
    pub root: u8,
    pub minor: bool,
}

impl ChordSymbol {
    /// Lenient parse: anything after `/` is ignored, an unrecognized root
    /// falls back to C, and the chord is minor when a lowercase `m` appears
    /// that is not followed by another letter (`Am`, `F#m7`, `Cdim`, not `Cmaj7`).
    #[must_use]
    pub fn parse(symbol: &str) -> Self {
        let head = symbol.split('/').next().unwrap_or_default().trim();
        let root = pitch_class_of(head).unwrap_or_else(|| {
            debug!(symbol, "unrecognized chord root; using C");
            0
        });

        let bytes = head.as_bytes();
        let minor = bytes.iter().enumerate().any(|(index, byte)| {
            *byte == b'm'
                && bytes
                    .get(index + 1)
                    .is_none_or(|next| !next.is_ascii_alphabetic())
        });

        Self {
            symbol: symbol.to_string(),
            root,
            minor,
        }
    }

    #[must_use]
    pub fn third(&self) -> i32 {
        if self.minor { MINOR_THIRD } else { MAJOR_THIRD }
    }

    #[must_use]
    pub fn root_pitch(&self, octave: i32) -> i32 {
        pitch_for(self.root, octave)
    }
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

#[must_use]
pub fn pitch_for(pitch_class: u8, octave: i32) -> i32 {
    i32::from(pitch_class) + OCTAVE * octave
}

/// Pitch class (0 = C) of a leading note name such as `C`, `F#`, `Bb`.
#[must_use]
pub fn pitch_class_of(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let natural: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let shift = match chars.next() {
        Some('#') => 1,
        Some('b') => -1,
        _ => 0,
    };
    u8::try_from((natural + shift).rem_euclid(OCTAVE)).ok()
}

/// Base velocity for a section energy in [0, 1].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn velocity_for_intensity(energy: f64) -> u8 {
    let energy = if energy.is_finite() { energy } else { 0.5 };
    (70.0 + energy * 50.0)
        .round()
        .clamp(f64::from(MIN_VELOCITY), f64::from(MAX_VELOCITY)) as u8
}

/// Maximum velocity deviation per chord voice, in percent of the base.
/// The fifth only ever moves down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterProfile {
    pub root: f64,
    pub third: f64,
    pub fifth: f64,
    pub octave: f64,
}

impl Default for JitterProfile {
    fn default() -> Self {
        Self {
            root: 10.0,
            third: 20.0,
            fifth: 10.0,
            octave: 25.0,
        }
    }
}

impl JitterProfile {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            root: 0.0,
            third: 0.0,
            fifth: 0.0,
            octave: 0.0,
        }
    }
}

/// Velocity humanization over an injectable random source.
pub struct Humanizer {
    rng: Box<dyn RngCore + Send>,
    profile: JitterProfile,
}

impl fmt::Debug for Humanizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Humanizer")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl Humanizer {
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: Box::new(rng),
            profile: JitterProfile::default(),
        }
    }

    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    #[must_use]
    pub fn with_profile(mut self, profile: JitterProfile) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn profile(&self) -> JitterProfile {
        self.profile
    }

    /// `round(base + base * u * percent / 100)` with `u` uniform in [-1, 1]
    /// (or [-1, 0] when `down_only`), clamped to 1..=127.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn velocity(&mut self, base: u8, percent: f64, down_only: bool) -> u8 {
        let base = f64::from(base);
        let spread = if percent > 0.0 {
            let u: f64 = self.rng.gen_range(-1.0..=1.0);
            if down_only { -u.abs() } else { u }
        } else {
            0.0
        };
        (base + base * spread * percent / 100.0)
            .round()
            .clamp(f64::from(MIN_VELOCITY), f64::from(MAX_VELOCITY)) as u8
    }
}

/// Root, third, fifth and octave of `chord`, each with its own velocity.
pub fn voice_chord(
    chord: &ChordSymbol,
    octave: i32,
    base_velocity: u8,
    start_beats: f64,
    duration_beats: f64,
    humanizer: &mut Humanizer,
) -> Vec<Note> {
    let root = chord.root_pitch(octave);
    let profile = humanizer.profile();
    let voices = [
        (root, profile.root, false),
        (root + chord.third(), profile.third, false),
        (root + FIFTH, profile.fifth, true),
        (root + OCTAVE, profile.octave, false),
    ];

    voices
        .into_iter()
        .map(|(pitch, percent, down_only)| Note {
            pitch,
            start_beats,
            duration_beats,
            velocity: humanizer.velocity(base_velocity, percent, down_only),
        })
        .collect()
}

/// One chord per bar, cycling through the section's progression. Note times
/// are relative to the start of the section.
pub fn section_notes(
    section: &SectionSpec,
    beats_per_bar: f64,
    octave: i32,
    humanizer: &mut Humanizer,
) -> Vec<Note> {
    let chords: Vec<ChordSymbol> = section.chords().iter().map(|c| ChordSymbol::parse(c)).collect();
    if chords.is_empty() {
        debug!(section = %section.name, "section has no chords");
        return Vec::new();
    }

    let base_velocity = velocity_for_intensity(section.energy());
    let mut notes = Vec::with_capacity(section.length_bars as usize * 4);
    for bar in 0..section.length_bars {
        let chord = &chords[bar as usize % chords.len()];
        let start = f64::from(bar) * beats_per_bar;
        notes.extend(voice_chord(
            chord,
            octave,
            base_velocity,
            start,
            beats_per_bar,
            humanizer,
        ));
    }
    notes
}

/// The chord clip for a section, positioned at `start_beats` in the session.
pub fn section_clip(
    section: &SectionSpec,
    start_beats: f64,
    beats_per_bar: f64,
    octave: i32,
    humanizer: &mut Humanizer,
) -> ClipWithNotes {
    ClipWithNotes {
        start_beats,
        length_beats: f64::from(section.length_bars) * beats_per_bar,
        name: section.name.clone(),
        color: None,
        notes: section_notes(section, beats_per_bar, octave, humanizer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enharmonic_roots_share_pitch_classes() {
        assert_eq!(pitch_class_of("C#"), pitch_class_of("Db"));
        assert_eq!(pitch_class_of("E#"), Some(5));
        assert_eq!(pitch_class_of("B#"), Some(0));
        assert_eq!(pitch_class_of("Cb"), Some(11));
        assert_eq!(pitch_class_of("Fb"), Some(4));
        assert_eq!(pitch_class_of("H"), None);
    }

    #[test]
    fn trailing_m_marks_minor_even_in_diminished_names() {
        assert!(ChordSymbol::parse("Am").minor);
        assert!(ChordSymbol::parse("Cdim").minor);
        assert!(!ChordSymbol::parse("Cmaj7").minor);
    }

    #[test]
    fn pitch_for_stacks_octaves_on_the_pitch_class() {
        assert_eq!(pitch_for(9, DEFAULT_OCTAVE), 45);
        assert_eq!(pitch_for(0, 0), 0);
    }

    #[test]
    fn minor_detection_ignores_maj() {
        assert!(ChordSymbol::parse("Am").minor);
        assert!(ChordSymbol::parse("F#m7").minor);
        assert!(!ChordSymbol::parse("Cmaj7").minor);
        assert!(!ChordSymbol::parse("G").minor);
    }

    #[test]
    fn slash_bass_is_ignored() {
        let chord = ChordSymbol::parse("C/G");
        assert_eq!(chord.root, 0);
        assert!(!chord.minor);
    }

    #[test]
    fn flat_profile_keeps_base_velocity() {
        let mut humanizer = Humanizer::seeded(7).with_profile(JitterProfile::none());
        let notes = voice_chord(&ChordSymbol::parse("Dm"), 3, 95, 0.0, 4.0, &mut humanizer);
        assert!(notes.iter().all(|note| note.velocity == 95));
        let pitches: Vec<i32> = notes.iter().map(|note| note.pitch).collect();
        assert_eq!(pitches, vec![38, 41, 45, 50]);
    }
}
