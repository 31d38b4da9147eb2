//! In-process session simulator.
//!
//! `MemorySession` models the slice of the remote object graph the engine
//! touches: the song, its track lists, mixer parameters, clip slots, clips,
//! arrangement clips, cue points and device chains. It answers under one of
//! the two naming dialects (or both) and can hide or reject individual
//! members to exercise the adapter's failure handling.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    model::TrackKind,
    session::{LiveBinding, ObjectRef, RemoteError, RemoteResult, RemoteValue},
};

pub const DEFAULT_SCENE_COUNT: usize = 8;
const DEFAULT_TEMPO: f64 = 120.0;
const DEFAULT_VOLUME: f64 = 0.85;
const DEFAULT_TRACK_COLOR: i64 = 0x00a0_a0a0;
const CUE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Only camelCase methods such as `createMidiTrack`.
    CreatorStyle,
    /// Only snake_case names routed through `call`, such as `create_midi_track`.
    Generic,
    #[default]
    Hybrid,
}

impl Dialect {
    fn accepts_method(self, name: &str) -> bool {
        match self {
            Self::CreatorStyle => !name.contains('_'),
            Self::Generic => !is_camel(name),
            Self::Hybrid => true,
        }
    }

    fn accepts_property(self, name: &str) -> bool {
        match self {
            Self::Generic => !is_camel(name),
            Self::CreatorStyle | Self::Hybrid => true,
        }
    }
}

fn is_camel(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
}

fn canonical(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Property,
    Method,
}

#[derive(Debug, Clone)]
struct TrackNode {
    kind: TrackKind,
    name: String,
    color: i64,
    mute: bool,
    solo: bool,
    arm: bool,
    mixer: ObjectRef,
    slots: Vec<ObjectRef>,
    chain: ObjectRef,
    arrangement: Vec<ObjectRef>,
}

#[derive(Debug, Clone)]
struct ParameterNode {
    name: String,
    value: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Clone)]
struct ClipNode {
    name: String,
    color: Option<i64>,
    length: f64,
    start_time: f64,
    arrangement: bool,
    notes: Vec<NoteSnapshot>,
}

#[derive(Debug, Clone)]
enum Node {
    Song,
    Track(TrackNode),
    Mixer { volume: ObjectRef, panning: ObjectRef },
    Parameter(ParameterNode),
    Slot { track: ObjectRef, clip: Option<ObjectRef> },
    Clip(ClipNode),
    CueContainer,
    Cue { name: String, time: f64 },
    DeviceChain { devices: Vec<ObjectRef> },
    Device { name: String, parameters: Vec<ObjectRef> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub object: ObjectRef,
    pub member: String,
    pub args: Vec<RemoteValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSnapshot {
    pub pitch: i64,
    pub time: f64,
    pub duration: f64,
    pub velocity: i64,
    pub mute: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSnapshot {
    pub name: String,
    pub start_time: f64,
    pub length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<NoteSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub name: String,
    pub kind: TrackKind,
    pub color: i64,
    pub volume: f64,
    pub pan: f64,
    pub mute: bool,
    pub solo: bool,
    pub arm: bool,
    pub devices: Vec<String>,
    pub slots: Vec<Option<ClipSnapshot>>,
    pub arrangement: Vec<ClipSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueSnapshot {
    pub name: String,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub tempo: f64,
    pub signature_numerator: RemoteValue,
    pub signature_denominator: RemoteValue,
    pub song_length: f64,
    pub tracks: Vec<TrackSnapshot>,
    pub return_tracks: Vec<TrackSnapshot>,
    pub master_track: TrackSnapshot,
    pub cues: Vec<CueSnapshot>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn track(&self, name: &str) -> Option<&TrackSnapshot> {
        self.tracks.iter().find(|track| track.name == name)
    }

    #[must_use]
    pub fn cue_times(&self) -> Vec<f64> {
        self.cues.iter().map(|cue| cue.time).collect()
    }
}

#[derive(Debug, Clone)]
pub struct MemorySession {
    dialect: Dialect,
    scene_count: usize,
    next_id: u64,
    objects: BTreeMap<ObjectRef, Node>,
    tempo: f64,
    numerator: RemoteValue,
    denominator: RemoteValue,
    current_song_time: f64,
    tracks: Vec<ObjectRef>,
    returns: Vec<ObjectRef>,
    master: ObjectRef,
    cue_container: ObjectRef,
    cues: Vec<ObjectRef>,
    hidden: BTreeSet<String>,
    rejected: BTreeMap<String, String>,
    device_catalog: BTreeMap<String, Vec<(String, f64, f64)>>,
    journal: Vec<JournalEntry>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new(Dialect::default())
    }
}

impl MemorySession {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self::with_scenes(dialect, DEFAULT_SCENE_COUNT)
    }

    #[must_use]
    pub fn with_scenes(dialect: Dialect, scene_count: usize) -> Self {
        let mut session = Self {
            dialect,
            scene_count,
            next_id: 0,
            objects: BTreeMap::new(),
            tempo: DEFAULT_TEMPO,
            numerator: RemoteValue::Int(4),
            denominator: RemoteValue::Int(4),
            current_song_time: 0.0,
            tracks: Vec::new(),
            returns: Vec::new(),
            master: ObjectRef::SONG,
            cue_container: ObjectRef::SONG,
            cues: Vec::new(),
            hidden: BTreeSet::new(),
            rejected: BTreeMap::new(),
            device_catalog: BTreeMap::new(),
            journal: Vec::new(),
        };
        session.register_device(
            "External Instrument",
            &[("MIDI Channel", 1.0, 16.0), ("Hardware Latency", 0.0, 100.0)],
        );
        let song = session.alloc(Node::Song);
        debug_assert_eq!(song, ObjectRef::SONG);
        session.master = session.spawn_track(TrackKind::Master, "Master".to_string());
        session.cue_container = session.alloc(Node::CueContainer);
        session
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Makes `member` (any naming) absent on every object.
    pub fn hide_member(&mut self, member: &str) {
        self.hidden.insert(canonical(member));
    }

    /// Makes every access to `member` fail on the remote side.
    pub fn reject_member(&mut self, member: &str, reason: &str) {
        self.rejected.insert(canonical(member), reason.to_string());
    }

    /// Declares the parameters a device created under `name` exposes, in
    /// addition to "Device On".
    pub fn register_device(&mut self, name: &str, parameters: &[(&str, f64, f64)]) {
        self.device_catalog.insert(
            name.to_string(),
            parameters
                .iter()
                .map(|(parameter, min, max)| ((*parameter).to_string(), *min, *max))
                .collect(),
        );
    }

    /// Overwrites the raw signature values, bypassing validation.
    pub fn set_raw_signature(&mut self, numerator: RemoteValue, denominator: RemoteValue) {
        self.numerator = numerator;
        self.denominator = denominator;
    }

    /// Removes a regular track, as a human editing the set would.
    pub fn delete_track(&mut self, index: usize) -> Option<String> {
        if index >= self.tracks.len() {
            return None;
        }
        let track = self.tracks.remove(index);
        match self.objects.remove(&track) {
            Some(Node::Track(node)) => Some(node.name),
            _ => None,
        }
    }

    #[must_use]
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Number of successful mutations of `member` (any naming).
    #[must_use]
    pub fn mutation_count(&self, member: &str) -> usize {
        let member = canonical(member);
        self.journal
            .iter()
            .filter(|entry| entry.member == member)
            .count()
    }

    #[must_use]
    pub fn current_song_time(&self) -> f64 {
        self.current_song_time
    }

    #[must_use]
    pub fn song_length(&self) -> f64 {
        self.tracks
            .iter()
            .chain(&self.returns)
            .filter_map(|track| match self.objects.get(track) {
                Some(Node::Track(node)) => Some(node),
                _ => None,
            })
            .flat_map(|node| node.arrangement.iter())
            .filter_map(|clip| match self.objects.get(clip) {
                Some(Node::Clip(clip)) => Some(clip.start_time + clip.length),
                _ => None,
            })
            .fold(0.0, f64::max)
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let tracks = |list: &[ObjectRef]| {
            list.iter()
                .filter_map(|track| self.track_snapshot(*track))
                .collect::<Vec<_>>()
        };
        let mut cues: Vec<CueSnapshot> = self
            .cues
            .iter()
            .filter_map(|cue| match self.objects.get(cue) {
                Some(Node::Cue { name, time }) => Some(CueSnapshot {
                    name: name.clone(),
                    time: *time,
                }),
                _ => None,
            })
            .collect();
        cues.sort_by(|a, b| a.time.total_cmp(&b.time));

        SessionSnapshot {
            tempo: self.tempo,
            signature_numerator: self.numerator.clone(),
            signature_denominator: self.denominator.clone(),
            song_length: self.song_length(),
            tracks: tracks(&self.tracks),
            return_tracks: tracks(&self.returns),
            master_track: self
                .track_snapshot(self.master)
                .unwrap_or_else(|| empty_track_snapshot(TrackKind::Master)),
            cues,
        }
    }

    fn track_snapshot(&self, track: ObjectRef) -> Option<TrackSnapshot> {
        let Some(Node::Track(node)) = self.objects.get(&track) else {
            return None;
        };
        let (volume, pan) = match self.objects.get(&node.mixer) {
            Some(Node::Mixer { volume, panning }) => {
                (self.parameter_value(*volume), self.parameter_value(*panning))
            }
            _ => (0.0, 0.0),
        };
        let devices = match self.objects.get(&node.chain) {
            Some(Node::DeviceChain { devices }) => devices
                .iter()
                .filter_map(|device| match self.objects.get(device) {
                    Some(Node::Device { name, .. }) => Some(name.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        let slots = node
            .slots
            .iter()
            .map(|slot| match self.objects.get(slot) {
                Some(Node::Slot {
                    clip: Some(clip), ..
                }) => self.clip_snapshot(*clip),
                _ => None,
            })
            .collect();
        let arrangement = node
            .arrangement
            .iter()
            .filter_map(|clip| self.clip_snapshot(*clip))
            .collect();

        Some(TrackSnapshot {
            name: node.name.clone(),
            kind: node.kind,
            color: node.color,
            volume,
            pan,
            mute: node.mute,
            solo: node.solo,
            arm: node.arm,
            devices,
            slots,
            arrangement,
        })
    }

    fn clip_snapshot(&self, clip: ObjectRef) -> Option<ClipSnapshot> {
        match self.objects.get(&clip) {
            Some(Node::Clip(node)) => Some(ClipSnapshot {
                name: node.name.clone(),
                start_time: node.start_time,
                length: node.length,
                color: node.color,
                notes: node.notes.clone(),
            }),
            _ => None,
        }
    }

    fn parameter_value(&self, parameter: ObjectRef) -> f64 {
        match self.objects.get(&parameter) {
            Some(Node::Parameter(node)) => node.value,
            _ => 0.0,
        }
    }

    fn alloc(&mut self, node: Node) -> ObjectRef {
        let object = ObjectRef(self.next_id);
        self.next_id += 1;
        self.objects.insert(object, node);
        object
    }

    fn alloc_parameter(&mut self, name: &str, value: f64, min: f64, max: f64) -> ObjectRef {
        self.alloc(Node::Parameter(ParameterNode {
            name: name.to_string(),
            value,
            min,
            max,
        }))
    }

    fn spawn_track(&mut self, kind: TrackKind, name: String) -> ObjectRef {
        let volume = self.alloc_parameter("Track Volume", DEFAULT_VOLUME, 0.0, 1.0);
        let panning = self.alloc_parameter("Track Panning", 0.0, -1.0, 1.0);
        let mixer = self.alloc(Node::Mixer { volume, panning });
        let chain = self.alloc(Node::DeviceChain {
            devices: Vec::new(),
        });
        let track = self.alloc(Node::Track(TrackNode {
            kind,
            name,
            color: DEFAULT_TRACK_COLOR,
            mute: false,
            solo: false,
            arm: false,
            mixer,
            slots: Vec::new(),
            chain,
            arrangement: Vec::new(),
        }));

        if kind.can_arm() {
            let slots: Vec<ObjectRef> = (0..self.scene_count)
                .map(|_| self.alloc(Node::Slot { track, clip: None }))
                .collect();
            if let Some(Node::Track(node)) = self.objects.get_mut(&track) {
                node.slots = slots;
            }
        }
        track
    }

    fn check(&self, object: ObjectRef, name: &str, access: Access) -> RemoteResult<String> {
        if !self.objects.contains_key(&object) {
            return Err(RemoteError::StaleObject(object));
        }
        let accepted = match access {
            Access::Property => self.dialect.accepts_property(name),
            Access::Method => self.dialect.accepts_method(name),
        };
        let member = canonical(name);
        if !accepted || self.hidden.contains(&member) {
            return Err(missing(object, name));
        }
        if let Some(reason) = self.rejected.get(&member) {
            return Err(RemoteError::rejected(name, reason.clone()));
        }
        Ok(member)
    }

    fn record(&mut self, object: ObjectRef, member: String, args: Vec<RemoteValue>) {
        trace!(%object, member = %member, "memory session mutation");
        self.journal.push(JournalEntry {
            object,
            member,
            args,
        });
    }

    fn cue_at(&self, time: f64) -> Option<usize> {
        self.cues.iter().position(|cue| {
            matches!(self.objects.get(cue), Some(Node::Cue { time: at, .. }) if (at - time).abs() < CUE_EPSILON)
        })
    }

    fn add_cue(&mut self, time: f64) -> ObjectRef {
        let cue = self.alloc(Node::Cue {
            name: String::new(),
            time,
        });
        self.cues.push(cue);
        cue
    }

    fn create_track(&mut self, kind: TrackKind) {
        let name = match kind {
            TrackKind::Audio => format!("{}-Audio", self.tracks.len() + 1),
            TrackKind::Midi => format!("{}-MIDI", self.tracks.len() + 1),
            TrackKind::Return => format!("{}-Return", char::from(b'A' + (self.returns.len() % 26) as u8)),
            TrackKind::Master => return,
        };
        let track = self.spawn_track(kind, name);
        if kind == TrackKind::Return {
            self.returns.push(track);
        } else {
            self.tracks.push(track);
        }
    }

    fn create_slot_clip(&mut self, slot: ObjectRef, member: &str, length: f64) -> RemoteResult<()> {
        let Some(Node::Slot { track, clip }) = self.objects.get(&slot) else {
            return Err(RemoteError::StaleObject(slot));
        };
        if clip.is_some() {
            return Err(RemoteError::rejected(member, "clip slot already has a clip"));
        }
        if matches!(self.objects.get(track), Some(Node::Track(node)) if node.kind == TrackKind::Audio)
        {
            return Err(RemoteError::rejected(member, "cannot create a MIDI clip on an audio track"));
        }
        if !(length.is_finite() && length > 0.0) {
            return Err(RemoteError::rejected(member, "clip length must be positive"));
        }

        let clip = self.alloc(Node::Clip(ClipNode {
            name: String::new(),
            color: None,
            length,
            start_time: 0.0,
            arrangement: false,
            notes: Vec::new(),
        }));
        if let Some(Node::Slot { clip: slot_clip, .. }) = self.objects.get_mut(&slot) {
            *slot_clip = Some(clip);
        }
        Ok(())
    }

    fn duplicate_to_arrangement(
        &mut self,
        track: ObjectRef,
        member: &str,
        args: &[RemoteValue],
    ) -> RemoteResult<RemoteValue> {
        let (Some(source), Some(time)) = (
            args.first().and_then(RemoteValue::as_object),
            args.get(1).and_then(RemoteValue::as_f64),
        ) else {
            return Err(RemoteError::rejected(member, "expected (clip, time)"));
        };
        let Some(Node::Clip(source)) = self.objects.get(&source) else {
            return Err(RemoteError::rejected(member, "source is not a clip"));
        };
        if source.arrangement {
            return Err(RemoteError::rejected(member, "source must be a session clip"));
        }
        let mut copy = source.clone();
        copy.start_time = time;
        copy.arrangement = true;

        let copy = self.alloc(Node::Clip(copy));
        if let Some(Node::Track(node)) = self.objects.get_mut(&track) {
            node.arrangement.push(copy);
        }
        Ok(RemoteValue::Object(copy))
    }

    fn create_device(&mut self, chain: ObjectRef, member: &str, args: &[RemoteValue]) -> RemoteResult<()> {
        let name = args
            .first()
            .and_then(RemoteValue::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            return Err(RemoteError::rejected(member, "device name is required"));
        }

        let mut parameters = vec![self.alloc_parameter("Device On", 1.0, 0.0, 1.0)];
        let catalog = self.device_catalog.get(&name).cloned().unwrap_or_default();
        for (parameter, min, max) in catalog {
            parameters.push(self.alloc_parameter(&parameter, min, min, max));
        }
        let device = self.alloc(Node::Device { name, parameters });
        if let Some(Node::DeviceChain { devices }) = self.objects.get_mut(&chain) {
            devices.push(device);
        }
        Ok(())
    }
}

fn missing(object: ObjectRef, member: &str) -> RemoteError {
    RemoteError::MissingMember {
        object,
        member: member.to_string(),
    }
}

fn objects(list: &[ObjectRef]) -> RemoteValue {
    RemoteValue::List(list.iter().copied().map(RemoteValue::Object).collect())
}

fn expect_f64(member: &str, value: &RemoteValue) -> RemoteResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| RemoteError::rejected(member, format!("expected a number, got {value:?}")))
}

fn expect_bool(member: &str, value: &RemoteValue) -> RemoteResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| RemoteError::rejected(member, format!("expected a switch value, got {value:?}")))
}

fn expect_text(member: &str, value: &RemoteValue) -> RemoteResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RemoteError::rejected(member, format!("expected text, got {value:?}")))
}

#[allow(clippy::cast_possible_truncation)]
fn expect_color(member: &str, value: &RemoteValue) -> RemoteResult<i64> {
    let color = expect_f64(member, value)? as i64;
    if (0..=0x00ff_ffff).contains(&color) {
        Ok(color)
    } else {
        Err(RemoteError::rejected(member, "color outside 0x000000..=0xffffff"))
    }
}

fn parse_notes(member: &str, args: &[RemoteValue]) -> RemoteResult<Vec<NoteSnapshot>> {
    let Some(batch) = args.first().and_then(RemoteValue::as_list) else {
        return Err(RemoteError::rejected(member, "expected a list of notes"));
    };
    batch
        .iter()
        .map(|note| {
            let RemoteValue::Record(fields) = note else {
                return Err(RemoteError::rejected(member, "note must be a record"));
            };
            let field = |key: &str| {
                fields
                    .get(key)
                    .ok_or_else(|| RemoteError::rejected(member, format!("note is missing `{key}`")))
            };
            #[allow(clippy::cast_possible_truncation)]
            let pitch = expect_f64(member, field("pitch")?)? as i64;
            #[allow(clippy::cast_possible_truncation)]
            let velocity = expect_f64(member, field("velocity")?)? as i64;
            if !(0..=127).contains(&pitch) {
                return Err(RemoteError::rejected(member, format!("pitch {pitch} out of range")));
            }
            Ok(NoteSnapshot {
                pitch,
                time: expect_f64(member, field("time")?)?,
                duration: expect_f64(member, field("duration")?)?,
                velocity,
                mute: fields
                    .get("mute")
                    .and_then(RemoteValue::as_bool)
                    .unwrap_or(false),
            })
        })
        .collect()
}

fn empty_track_snapshot(kind: TrackKind) -> TrackSnapshot {
    TrackSnapshot {
        name: String::new(),
        kind,
        color: DEFAULT_TRACK_COLOR,
        volume: 0.0,
        pan: 0.0,
        mute: false,
        solo: false,
        arm: false,
        devices: Vec::new(),
        slots: Vec::new(),
        arrangement: Vec::new(),
    }
}

impl LiveBinding for MemorySession {
    fn get(&mut self, object: ObjectRef, property: &str) -> RemoteResult<RemoteValue> {
        let member = self.check(object, property, Access::Property)?;
        let node = self
            .objects
            .get(&object)
            .ok_or(RemoteError::StaleObject(object))?;

        let value = match (node, member.as_str()) {
            (Node::Song, "tempo") => RemoteValue::Float(self.tempo),
            (Node::Song, "signature_numerator") => self.numerator.clone(),
            (Node::Song, "signature_denominator") => self.denominator.clone(),
            (Node::Song, "current_song_time") => RemoteValue::Float(self.current_song_time),
            (Node::Song, "song_length") => RemoteValue::Float(self.song_length()),
            (Node::Song, "tracks") => objects(&self.tracks),
            (Node::Song, "return_tracks") => objects(&self.returns),
            (Node::Song, "master_track") => RemoteValue::Object(self.master),
            (Node::Song, "cue_points") => RemoteValue::Object(self.cue_container),
            (Node::CueContainer, "children") => objects(&self.cues),
            (Node::Track(track), "name") => RemoteValue::Text(track.name.clone()),
            (Node::Track(track), "color") => RemoteValue::Int(track.color),
            (Node::Track(track), "mute") => RemoteValue::Int(i64::from(track.mute)),
            (Node::Track(track), "solo") => RemoteValue::Int(i64::from(track.solo)),
            (Node::Track(track), "arm") if track.kind.can_arm() => {
                RemoteValue::Int(i64::from(track.arm))
            }
            (Node::Track(track), "mixer_device") => RemoteValue::Object(track.mixer),
            (Node::Track(track), "clip_slots") => objects(&track.slots),
            (Node::Track(track), "devices") => RemoteValue::Object(track.chain),
            (Node::Track(track), "arrangement_clips") => objects(&track.arrangement),
            (Node::Mixer { volume, .. }, "volume") => RemoteValue::Object(*volume),
            (Node::Mixer { panning, .. }, "panning") => RemoteValue::Object(*panning),
            (Node::Parameter(parameter), "name") => RemoteValue::Text(parameter.name.clone()),
            (Node::Parameter(parameter), "value") => RemoteValue::Float(parameter.value),
            (Node::Parameter(parameter), "min") => RemoteValue::Float(parameter.min),
            (Node::Parameter(parameter), "max") => RemoteValue::Float(parameter.max),
            (Node::Slot { clip, .. }, "has_clip") => RemoteValue::Bool(clip.is_some()),
            (Node::Slot { clip, .. }, "clip") => clip.map_or(RemoteValue::Null, RemoteValue::Object),
            (Node::Clip(clip), "name") => RemoteValue::Text(clip.name.clone()),
            (Node::Clip(clip), "color") => clip.color.map_or(RemoteValue::Null, RemoteValue::Int),
            (Node::Clip(clip), "length") => RemoteValue::Float(clip.length),
            (Node::Clip(clip), "start_time") => RemoteValue::Float(clip.start_time),
            (Node::Clip(clip), "is_arrangement_clip") => RemoteValue::Bool(clip.arrangement),
            (Node::Cue { name, .. }, "name") => RemoteValue::Text(name.clone()),
            (Node::Cue { time, .. }, "time") => RemoteValue::Float(*time),
            (Node::DeviceChain { devices }, "children") => objects(devices),
            (Node::Device { name, .. }, "name") => RemoteValue::Text(name.clone()),
            (Node::Device { parameters, .. }, "parameters") => objects(parameters),
            _ => return Err(missing(object, property)),
        };
        Ok(value)
    }

    fn set(&mut self, object: ObjectRef, property: &str, value: RemoteValue) -> RemoteResult<()> {
        let member = self.check(object, property, Access::Property)?;

        if matches!(self.objects.get(&object), Some(Node::Song)) {
            match member.as_str() {
                "tempo" => {
                    let bpm = expect_f64(property, &value)?;
                    if !(20.0..=999.0).contains(&bpm) {
                        return Err(RemoteError::rejected(property, "tempo outside 20..=999"));
                    }
                    self.tempo = bpm;
                }
                "signature_numerator" => {
                    let numerator = expect_f64(property, &value)?;
                    if !(1.0..=99.0).contains(&numerator) || numerator.fract() != 0.0 {
                        return Err(RemoteError::rejected(property, "numerator outside 1..=99"));
                    }
                    self.numerator = value.clone();
                }
                "signature_denominator" => {
                    let denominator = expect_f64(property, &value)?;
                    if ![1.0, 2.0, 4.0, 8.0, 16.0].contains(&denominator) {
                        return Err(RemoteError::rejected(property, "denominator must be 1, 2, 4, 8 or 16"));
                    }
                    self.denominator = value.clone();
                }
                "current_song_time" => {
                    self.current_song_time = expect_f64(property, &value)?.max(0.0);
                }
                _ => return Err(missing(object, property)),
            }
            self.record(object, member, vec![value]);
            return Ok(());
        }

        let node = self
            .objects
            .get_mut(&object)
            .ok_or(RemoteError::StaleObject(object))?;
        match (node, member.as_str()) {
            (Node::Track(track), "name") => track.name = expect_text(property, &value)?,
            (Node::Track(track), "color") => track.color = expect_color(property, &value)?,
            (Node::Track(track), "mute") => track.mute = expect_bool(property, &value)?,
            (Node::Track(track), "solo") => track.solo = expect_bool(property, &value)?,
            (Node::Track(track), "arm") if track.kind.can_arm() => {
                track.arm = expect_bool(property, &value)?;
            }
            (Node::Parameter(parameter), "value") => {
                let requested = expect_f64(property, &value)?;
                if !(parameter.min..=parameter.max).contains(&requested) {
                    return Err(RemoteError::rejected(
                        property,
                        format!(
                            "{} outside {}..={} for \"{}\"",
                            requested, parameter.min, parameter.max, parameter.name
                        ),
                    ));
                }
                parameter.value = requested;
            }
            (Node::Clip(clip), "name") => clip.name = expect_text(property, &value)?,
            (Node::Clip(clip), "color") => clip.color = Some(expect_color(property, &value)?),
            (Node::Cue { name, .. }, "name") => *name = expect_text(property, &value)?,
            (Node::Cue { .. }, "time") => {
                return Err(RemoteError::rejected(property, "cue time is read-only"));
            }
            _ => return Err(missing(object, property)),
        }
        self.record(object, member, vec![value]);
        Ok(())
    }

    fn call(
        &mut self,
        object: ObjectRef,
        method: &str,
        args: Vec<RemoteValue>,
    ) -> RemoteResult<RemoteValue> {
        let member = self.check(object, method, Access::Method)?;
        let kind = match self.objects.get(&object) {
            Some(Node::Song) => "song",
            Some(Node::Track(_)) => "track",
            Some(Node::Slot { .. }) => "slot",
            Some(Node::Clip(_)) => "clip",
            Some(Node::CueContainer) => "cues",
            Some(Node::DeviceChain { .. }) => "chain",
            Some(_) => "other",
            None => return Err(RemoteError::StaleObject(object)),
        };

        let result = match (kind, member.as_str()) {
            ("song", "create_audio_track") => {
                self.create_track(TrackKind::Audio);
                RemoteValue::Null
            }
            ("song", "create_midi_track") => {
                self.create_track(TrackKind::Midi);
                RemoteValue::Null
            }
            ("song", "create_return_track") => {
                self.create_track(TrackKind::Return);
                RemoteValue::Null
            }
            ("song", "set_or_delete_cue") => {
                if let Some(position) = self.cue_at(self.current_song_time) {
                    let cue = self.cues.remove(position);
                    self.objects.remove(&cue);
                } else {
                    self.add_cue(self.current_song_time);
                }
                RemoteValue::Null
            }
            ("cues", "create_cue_point") => {
                let time = args
                    .first()
                    .map(|value| expect_f64(method, value))
                    .transpose()?
                    .unwrap_or(self.current_song_time);
                if self.cue_at(time).is_some() {
                    return Err(RemoteError::rejected(method, "a cue already exists at this time"));
                }
                RemoteValue::Object(self.add_cue(time))
            }
            ("slot", "create_clip") => {
                let length = args
                    .first()
                    .map(|value| expect_f64(method, value))
                    .transpose()?
                    .unwrap_or(4.0);
                self.create_slot_clip(object, method, length)?;
                RemoteValue::Null
            }
            ("slot", "delete_clip") => {
                let removed = match self.objects.get_mut(&object) {
                    Some(Node::Slot { clip, .. }) => clip.take(),
                    _ => None,
                };
                if let Some(removed) = removed {
                    self.objects.remove(&removed);
                }
                RemoteValue::Null
            }
            ("track", "duplicate_clip_to_arrangement") => {
                self.duplicate_to_arrangement(object, method, &args)?
            }
            ("clip", "set_notes") => {
                let notes = parse_notes(method, &args)?;
                if let Some(Node::Clip(clip)) = self.objects.get_mut(&object) {
                    clip.notes = notes;
                }
                RemoteValue::Null
            }
            ("chain", "create_device") => {
                self.create_device(object, method, &args)?;
                RemoteValue::Null
            }
            _ => return Err(missing(object, method)),
        };
        self.record(object, member, args);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_fold_camel_case() {
        assert_eq!(canonical("createMidiTrack"), "create_midi_track");
        assert_eq!(canonical("create_midi_track"), "create_midi_track");
        assert_eq!(canonical("tracks"), "tracks");
    }

    #[test]
    fn creator_dialect_hides_snake_case_methods() {
        let mut session = MemorySession::new(Dialect::CreatorStyle);
        let err = session
            .call(ObjectRef::SONG, "create_midi_track", Vec::new())
            .expect_err("snake case should be missing");
        assert!(err.is_missing());
        session
            .call(ObjectRef::SONG, "createMidiTrack", Vec::new())
            .expect("camel case should work");
        assert_eq!(session.snapshot().tracks.len(), 1);
    }

    #[test]
    fn cue_toggle_adds_then_removes() {
        let mut session = MemorySession::default();
        session
            .set(ObjectRef::SONG, "current_song_time", RemoteValue::Float(8.0))
            .expect("playhead should move");
        session
            .call(ObjectRef::SONG, "set_or_delete_cue", Vec::new())
            .expect("toggle should work");
        assert_eq!(session.snapshot().cue_times(), vec![8.0]);
        session
            .call(ObjectRef::SONG, "set_or_delete_cue", Vec::new())
            .expect("toggle should work");
        assert!(session.snapshot().cues.is_empty());
    }

    #[test]
    fn rejected_members_fail_even_when_named_correctly() {
        let mut session = MemorySession::default();
        session.reject_member("tempo", "locked");
        let err = session
            .set(ObjectRef::SONG, "tempo", RemoteValue::Float(100.0))
            .expect_err("tempo should be rejected");
        assert!(!err.is_missing());
    }
}
