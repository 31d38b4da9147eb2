//! Resilient session adapter.
//!
//! Every remote effect passes through [`SessionAdapter`]. Each capability is
//! described by a [`Member`] carrying both naming conventions the binding may
//! expose: the creator-style camelCase name and the generic snake_case name.
//! The adapter tries the convention that last answered for that capability,
//! falls back to the other, and distinguishes two outcomes:
//!
//! - neither name exists: soft absence, logged as a warning and reported as
//!   `Ok(None)` / `Ok(false)`;
//! - a name exists but the remote side failed: logged as an error and returned
//!   as [`AdapterError::Remote`].
//!
//! Callers that cannot continue without a result use the `require_*` forms,
//! which turn absence into [`AdapterError::Unavailable`].

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::{
    model::{ClipWithNotes, Note, TrackKind},
    session::{LiveBinding, ObjectRef, RemoteError, RemoteResult, RemoteValue, SlotIndex, TrackHandle},
};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("`{member}` failed on {object}")]
    Remote {
        object: ObjectRef,
        member: &'static str,
        #[source]
        source: RemoteError,
    },
    #[error("capability `{0}` is not available in this session")]
    Unavailable(&'static str),
    #[error("{handle} is out of range ({count} visible)")]
    TrackOutOfRange { handle: TrackHandle, count: usize },
    #[error("{0} has no clip slots")]
    NoClipSlot(TrackHandle),
    #[error("{handle} has no device at index {index}")]
    DeviceOutOfRange { handle: TrackHandle, index: usize },
    #[error("device {device} has no parameter named \"{parameter}\"")]
    UnknownParameter { device: ObjectRef, parameter: String },
    #[error("`{member}` returned an unexpected value: {value:?}")]
    UnexpectedValue {
        member: &'static str,
        value: RemoteValue,
    },
}

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Convention {
    Creator,
    Generic,
}

impl Convention {
    const fn other(self) -> Self {
        match self {
            Self::Creator => Self::Generic,
            Self::Generic => Self::Creator,
        }
    }
}

/// One remote capability under both of its names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub creator: &'static str,
    pub generic: &'static str,
}

impl Member {
    #[must_use]
    pub const fn new(creator: &'static str, generic: &'static str) -> Self {
        Self { creator, generic }
    }

    #[must_use]
    pub const fn same(name: &'static str) -> Self {
        Self {
            creator: name,
            generic: name,
        }
    }

    #[must_use]
    pub const fn name(self, convention: Convention) -> &'static str {
        match convention {
            Convention::Creator => self.creator,
            Convention::Generic => self.generic,
        }
    }

    const fn key(self) -> &'static str {
        self.generic
    }

    fn has_alias(self) -> bool {
        self.creator != self.generic
    }
}

pub mod members {
    use super::Member;

    pub const TEMPO: Member = Member::same("tempo");
    pub const SIGNATURE_NUMERATOR: Member =
        Member::new("signatureNumerator", "signature_numerator");
    pub const SIGNATURE_DENOMINATOR: Member =
        Member::new("signatureDenominator", "signature_denominator");
    pub const CURRENT_SONG_TIME: Member = Member::new("currentSongTime", "current_song_time");
    pub const TRACKS: Member = Member::same("tracks");
    pub const RETURN_TRACKS: Member = Member::new("returnTracks", "return_tracks");
    pub const MASTER_TRACK: Member = Member::new("masterTrack", "master_track");
    pub const CUE_POINTS: Member = Member::new("cuePoints", "cue_points");
    pub const CHILDREN: Member = Member::same("children");

    pub const CREATE_AUDIO_TRACK: Member = Member::new("createAudioTrack", "create_audio_track");
    pub const CREATE_MIDI_TRACK: Member = Member::new("createMidiTrack", "create_midi_track");
    pub const CREATE_RETURN_TRACK: Member =
        Member::new("createReturnTrack", "create_return_track");
    pub const SET_OR_DELETE_CUE: Member = Member::new("setOrDeleteCue", "set_or_delete_cue");
    pub const CREATE_CUE_POINT: Member = Member::new("createCuePoint", "create_cue_point");

    pub const NAME: Member = Member::same("name");
    pub const COLOR: Member = Member::same("color");
    pub const MUTE: Member = Member::same("mute");
    pub const SOLO: Member = Member::same("solo");
    pub const ARM: Member = Member::same("arm");
    pub const MIXER_DEVICE: Member = Member::new("mixerDevice", "mixer_device");
    pub const VOLUME: Member = Member::same("volume");
    pub const PANNING: Member = Member::same("panning");
    pub const VALUE: Member = Member::same("value");
    pub const TIME: Member = Member::same("time");

    pub const CLIP_SLOTS: Member = Member::new("clipSlots", "clip_slots");
    pub const HAS_CLIP: Member = Member::new("hasClip", "has_clip");
    pub const CLIP: Member = Member::same("clip");
    pub const CREATE_CLIP: Member = Member::new("createClip", "create_clip");
    pub const DELETE_CLIP: Member = Member::new("deleteClip", "delete_clip");
    pub const DUPLICATE_CLIP_TO_ARRANGEMENT: Member =
        Member::new("duplicateClipToArrangement", "duplicate_clip_to_arrangement");
    pub const SET_NOTES: Member = Member::new("setNotes", "set_notes");

    pub const DEVICES: Member = Member::same("devices");
    pub const CREATE_DEVICE: Member = Member::new("createDevice", "create_device");
    pub const PARAMETERS: Member = Member::same("parameters");
}

use members as m;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdapterStats {
    pub remote_calls: u64,
    pub soft_absences: u64,
    pub fallbacks: u64,
}

/// Which of the song's track lists a handle indexes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackList {
    Tracks,
    Returns,
}

impl TrackList {
    const fn member(self) -> Member {
        match self {
            Self::Tracks => m::TRACKS,
            Self::Returns => m::RETURN_TRACKS,
        }
    }

    const fn handle(self, index: usize) -> TrackHandle {
        match self {
            Self::Tracks => TrackHandle::Track(index),
            Self::Returns => TrackHandle::Return(index),
        }
    }
}

pub struct SessionAdapter<B> {
    binding: B,
    preferred: HashMap<&'static str, Convention>,
    stats: AdapterStats,
}

impl<B: LiveBinding> SessionAdapter<B> {
    #[must_use]
    pub fn new(binding: B) -> Self {
        Self {
            binding,
            preferred: HashMap::new(),
            stats: AdapterStats::default(),
        }
    }

    #[must_use]
    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut B {
        &mut self.binding
    }

    #[must_use]
    pub fn into_inner(self) -> B {
        self.binding
    }

    #[must_use]
    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    /// Convention that last answered for `member`, if any call has succeeded.
    #[must_use]
    pub fn negotiated(&self, member: Member) -> Option<Convention> {
        self.preferred.get(member.key()).copied()
    }

    fn negotiate<T>(
        &mut self,
        object: ObjectRef,
        member: Member,
        mut attempt: impl FnMut(&mut B, &'static str) -> RemoteResult<T>,
    ) -> AdapterResult<Option<T>> {
        let first = self
            .preferred
            .get(member.key())
            .copied()
            .unwrap_or(Convention::Creator);
        let mut order = vec![first];
        if member.has_alias() {
            order.push(first.other());
        }

        for convention in order {
            let name = member.name(convention);
            self.stats.remote_calls += 1;
            match attempt(&mut self.binding, name) {
                Ok(value) => {
                    if convention != first {
                        self.stats.fallbacks += 1;
                        debug!(%object, member = name, ?convention, "fell back to alternate naming");
                    }
                    self.preferred.insert(member.key(), convention);
                    return Ok(Some(value));
                }
                Err(missing) if missing.is_missing() => {
                    debug!(%object, member = name, "member not exposed under this name");
                }
                Err(source) => {
                    error!(%object, member = name, error = %source, "remote operation failed");
                    return Err(AdapterError::Remote {
                        object,
                        member: member.key(),
                        source,
                    });
                }
            }
        }

        self.stats.soft_absences += 1;
        warn!(%object, member = member.key(), "capability not available in this session; skipped");
        Ok(None)
    }

    pub fn get(&mut self, object: ObjectRef, member: Member) -> AdapterResult<Option<RemoteValue>> {
        self.negotiate(object, member, |binding, name| binding.get(object, name))
    }

    /// Returns whether the property was applied; `false` means soft absence.
    pub fn set(
        &mut self,
        object: ObjectRef,
        member: Member,
        value: impl Into<RemoteValue>,
    ) -> AdapterResult<bool> {
        let value = value.into();
        let applied = self.negotiate(object, member, |binding, name| {
            binding.set(object, name, value.clone())
        })?;
        Ok(applied.is_some())
    }

    pub fn call(
        &mut self,
        object: ObjectRef,
        member: Member,
        args: Vec<RemoteValue>,
    ) -> AdapterResult<Option<RemoteValue>> {
        self.negotiate(object, member, |binding, name| {
            binding.call(object, name, args.clone())
        })
    }

    pub fn require_get(&mut self, object: ObjectRef, member: Member) -> AdapterResult<RemoteValue> {
        self.get(object, member)?
            .ok_or(AdapterError::Unavailable(member.key()))
    }

    pub fn require_call(
        &mut self,
        object: ObjectRef,
        member: Member,
        args: Vec<RemoteValue>,
    ) -> AdapterResult<RemoteValue> {
        self.call(object, member, args)?
            .ok_or(AdapterError::Unavailable(member.key()))
    }

    fn require_object(&mut self, object: ObjectRef, member: Member) -> AdapterResult<ObjectRef> {
        let value = self.require_get(object, member)?;
        match value.as_object() {
            Some(found) => Ok(found),
            None => Err(AdapterError::UnexpectedValue {
                member: member.key(),
                value,
            }),
        }
    }

    /// Flattens a collection value: either a plain list of objects or a
    /// container object exposing `children`.
    fn children(&mut self, member: Member, value: RemoteValue) -> AdapterResult<Vec<ObjectRef>> {
        match value {
            RemoteValue::Null => Ok(Vec::new()),
            RemoteValue::List(items) => Ok(items.iter().filter_map(RemoteValue::as_object).collect()),
            RemoteValue::Object(container) => match self.get(container, m::CHILDREN)? {
                Some(RemoteValue::List(items)) => {
                    Ok(items.iter().filter_map(RemoteValue::as_object).collect())
                }
                Some(RemoteValue::Null) | None => Ok(Vec::new()),
                Some(other) => Err(AdapterError::UnexpectedValue {
                    member: m::CHILDREN.key(),
                    value: other,
                }),
            },
            other => Err(AdapterError::UnexpectedValue {
                member: member.key(),
                value: other,
            }),
        }
    }

    pub fn list(&mut self, object: ObjectRef, member: Member) -> AdapterResult<Vec<ObjectRef>> {
        match self.get(object, member)? {
            Some(value) => self.children(member, value),
            None => Ok(Vec::new()),
        }
    }

    // Song

    pub fn set_tempo(&mut self, bpm: f64) -> AdapterResult<bool> {
        self.set(ObjectRef::SONG, m::TEMPO, bpm)
    }

    pub fn set_time_signature(&mut self, numerator: u32, denominator: u32) -> AdapterResult<bool> {
        let numerator_set = self.set(
            ObjectRef::SONG,
            m::SIGNATURE_NUMERATOR,
            i64::from(numerator),
        )?;
        let denominator_set = self.set(
            ObjectRef::SONG,
            m::SIGNATURE_DENOMINATOR,
            i64::from(denominator),
        )?;
        Ok(numerator_set && denominator_set)
    }

    pub fn move_playhead(&mut self, beat: f64) -> AdapterResult<bool> {
        self.set(ObjectRef::SONG, m::CURRENT_SONG_TIME, beat)
    }

    // Tracks

    fn track_list(&mut self, list: TrackList) -> AdapterResult<Vec<ObjectRef>> {
        self.list(ObjectRef::SONG, list.member())
    }

    pub fn track_count(&mut self) -> AdapterResult<usize> {
        Ok(self.track_list(TrackList::Tracks)?.len())
    }

    pub fn resolve_track(&mut self, handle: TrackHandle) -> AdapterResult<ObjectRef> {
        let (list, index) = match handle {
            TrackHandle::Master => return self.require_object(ObjectRef::SONG, m::MASTER_TRACK),
            TrackHandle::Track(index) => (TrackList::Tracks, index),
            TrackHandle::Return(index) => (TrackList::Returns, index),
        };
        let tracks = self.track_list(list)?;
        tracks
            .get(index)
            .copied()
            .ok_or(AdapterError::TrackOutOfRange {
                handle,
                count: tracks.len(),
            })
    }

    /// Creates a track of `kind` and returns the last position of the list it
    /// lands in. The master track is resolved, never created.
    #[instrument(skip(self))]
    pub fn create_track(&mut self, kind: TrackKind) -> AdapterResult<TrackHandle> {
        let (creator, list) = match kind {
            TrackKind::Audio => (m::CREATE_AUDIO_TRACK, TrackList::Tracks),
            TrackKind::Midi => (m::CREATE_MIDI_TRACK, TrackList::Tracks),
            TrackKind::Return => (m::CREATE_RETURN_TRACK, TrackList::Returns),
            TrackKind::Master => {
                self.require_object(ObjectRef::SONG, m::MASTER_TRACK)?;
                return Ok(TrackHandle::Master);
            }
        };

        self.require_call(ObjectRef::SONG, creator, Vec::new())?;
        let count = self.track_list(list)?.len();
        let handle = list.handle(count.saturating_sub(1));
        if count == 0 {
            return Err(AdapterError::TrackOutOfRange { handle, count });
        }
        debug!(%handle, "track created");
        Ok(handle)
    }

    pub fn track_name(&mut self, handle: TrackHandle) -> AdapterResult<Option<String>> {
        let track = self.resolve_track(handle)?;
        Ok(self
            .get(track, m::NAME)?
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    pub fn set_track_name(&mut self, handle: TrackHandle, name: &str) -> AdapterResult<bool> {
        let track = self.resolve_track(handle)?;
        self.set(track, m::NAME, name)
    }

    pub fn set_track_color(&mut self, handle: TrackHandle, color: i64) -> AdapterResult<bool> {
        let track = self.resolve_track(handle)?;
        self.set(track, m::COLOR, color)
    }

    pub fn set_track_volume(&mut self, handle: TrackHandle, volume: f64) -> AdapterResult<bool> {
        self.set_mixer_parameter(handle, m::VOLUME, volume)
    }

    pub fn set_track_pan(&mut self, handle: TrackHandle, pan: f64) -> AdapterResult<bool> {
        self.set_mixer_parameter(handle, m::PANNING, pan)
    }

    fn set_mixer_parameter(
        &mut self,
        handle: TrackHandle,
        parameter: Member,
        value: f64,
    ) -> AdapterResult<bool> {
        let track = self.resolve_track(handle)?;
        let Some(mixer) = self.get(track, m::MIXER_DEVICE)?.and_then(|v| v.as_object()) else {
            return Ok(false);
        };
        let Some(parameter) = self.get(mixer, parameter)?.and_then(|v| v.as_object()) else {
            return Ok(false);
        };
        self.set(parameter, m::VALUE, value)
    }

    pub fn set_track_mute(&mut self, handle: TrackHandle, muted: bool) -> AdapterResult<bool> {
        self.set_track_switch(handle, m::MUTE, muted)
    }

    pub fn set_track_solo(&mut self, handle: TrackHandle, solo: bool) -> AdapterResult<bool> {
        self.set_track_switch(handle, m::SOLO, solo)
    }

    pub fn set_track_arm(&mut self, handle: TrackHandle, armed: bool) -> AdapterResult<bool> {
        self.set_track_switch(handle, m::ARM, armed)
    }

    fn set_track_switch(
        &mut self,
        handle: TrackHandle,
        member: Member,
        on: bool,
    ) -> AdapterResult<bool> {
        let track = self.resolve_track(handle)?;
        self.set(track, member, i64::from(on))
    }

    // Clips

    pub fn clip_slots(&mut self, handle: TrackHandle) -> AdapterResult<Vec<ObjectRef>> {
        let track = self.resolve_track(handle)?;
        self.list(track, m::CLIP_SLOTS)
    }

    pub fn slot_has_clip(&mut self, slot: ObjectRef) -> AdapterResult<bool> {
        if let Some(value) = self.get(slot, m::HAS_CLIP)? {
            return Ok(value.as_bool().unwrap_or(false));
        }
        Ok(self
            .get(slot, m::CLIP)?
            .is_some_and(|clip| !clip.is_null()))
    }

    /// Creates an empty clip in the first free slot. `Ok(None)` when every
    /// slot is occupied or clip creation is not exposed.
    #[instrument(skip(self))]
    pub fn create_clip_in_free_slot(
        &mut self,
        handle: TrackHandle,
        length_beats: f64,
        name: Option<&str>,
        color: Option<i64>,
    ) -> AdapterResult<Option<SlotIndex>> {
        let slots = self.clip_slots(handle)?;
        let mut free = None;
        for (index, slot) in slots.into_iter().enumerate() {
            if !self.slot_has_clip(slot)? {
                free = Some((SlotIndex(index), slot));
                break;
            }
        }
        let Some((index, slot)) = free else {
            return Ok(None);
        };

        if self
            .call(slot, m::CREATE_CLIP, vec![length_beats.into()])?
            .is_none()
        {
            return Ok(None);
        }

        if name.is_some() || color.is_some() {
            let clip = self.require_object(slot, m::CLIP)?;
            if let Some(name) = name {
                self.set(clip, m::NAME, name)?;
            }
            if let Some(color) = color {
                self.set(clip, m::COLOR, color)?;
            }
        }
        Ok(Some(index))
    }

    /// Stages `clip` in the track's last slot (clearing it first), then
    /// duplicates it into the arrangement at `clip.start_beats` and writes its
    /// notes there. Returns the arrangement clip.
    #[instrument(skip(self, clip), fields(clip = %clip.name, start = clip.start_beats))]
    pub fn write_arrangement_clip(
        &mut self,
        handle: TrackHandle,
        clip: &ClipWithNotes,
    ) -> AdapterResult<ObjectRef> {
        let slots = self.clip_slots(handle)?;
        let slot = *slots.last().ok_or(AdapterError::NoClipSlot(handle))?;

        if self.slot_has_clip(slot)? {
            self.call(slot, m::DELETE_CLIP, Vec::new())?;
        }
        self.require_call(slot, m::CREATE_CLIP, vec![clip.length_beats.into()])?;
        let staged = self.require_object(slot, m::CLIP)?;
        self.set(staged, m::NAME, clip.name.as_str())?;

        let track = self.resolve_track(handle)?;
        let arranged = self.require_call(
            track,
            m::DUPLICATE_CLIP_TO_ARRANGEMENT,
            vec![staged.into(), clip.start_beats.into()],
        )?;
        let arranged = arranged
            .as_object()
            .ok_or_else(|| AdapterError::UnexpectedValue {
                member: m::DUPLICATE_CLIP_TO_ARRANGEMENT.key(),
                value: arranged.clone(),
            })?;

        if !clip.notes.is_empty() {
            self.set_notes(arranged, &clip.notes)?;
        }
        Ok(arranged)
    }

    pub fn set_clip_color(&mut self, clip: ObjectRef, color: i64) -> AdapterResult<bool> {
        self.set(clip, m::COLOR, color)
    }

    /// Submits all notes of a clip as one batch.
    pub fn set_notes(&mut self, clip: ObjectRef, notes: &[Note]) -> AdapterResult<bool> {
        let batch = notes
            .iter()
            .map(|note| {
                RemoteValue::record([
                    ("pitch", RemoteValue::Int(i64::from(note.pitch))),
                    ("time", RemoteValue::Float(note.start_beats)),
                    ("duration", RemoteValue::Float(note.duration_beats)),
                    ("velocity", RemoteValue::Int(i64::from(note.velocity))),
                    ("mute", RemoteValue::Bool(false)),
                ])
            })
            .collect();
        Ok(self
            .call(clip, m::SET_NOTES, vec![RemoteValue::List(batch)])?
            .is_some())
    }

    // Cues

    /// Toggles a cue at the current playhead. When the toggle is not exposed,
    /// falls back to creating a cue point at `beat` on the cue container.
    pub fn toggle_cue(&mut self, beat: f64) -> AdapterResult<bool> {
        if self
            .call(ObjectRef::SONG, m::SET_OR_DELETE_CUE, Vec::new())?
            .is_some()
        {
            return Ok(true);
        }

        let Some(container) = self
            .get(ObjectRef::SONG, m::CUE_POINTS)?
            .and_then(|value| value.as_object())
        else {
            return Ok(false);
        };
        Ok(self
            .call(container, m::CREATE_CUE_POINT, vec![beat.into()])?
            .is_some())
    }

    pub fn cue_points(&mut self) -> AdapterResult<Vec<ObjectRef>> {
        self.list(ObjectRef::SONG, m::CUE_POINTS)
    }

    pub fn cue_time(&mut self, cue: ObjectRef) -> AdapterResult<Option<f64>> {
        Ok(self.get(cue, m::TIME)?.and_then(|value| value.as_f64()))
    }

    pub fn set_cue_name(&mut self, cue: ObjectRef, name: &str) -> AdapterResult<bool> {
        self.set(cue, m::NAME, name)
    }

    // Devices

    pub fn devices(&mut self, handle: TrackHandle) -> AdapterResult<Vec<ObjectRef>> {
        let track = self.resolve_track(handle)?;
        self.list(track, m::DEVICES)
    }

    pub fn device_name(&mut self, device: ObjectRef) -> AdapterResult<Option<String>> {
        Ok(self
            .get(device, m::NAME)?
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    /// Appends a device by name and returns its index in the chain.
    #[instrument(skip(self))]
    pub fn create_device(&mut self, handle: TrackHandle, name: &str) -> AdapterResult<Option<usize>> {
        let track = self.resolve_track(handle)?;
        let Some(chain) = self.get(track, m::DEVICES)? else {
            return Ok(None);
        };
        let Some(container) = chain.as_object() else {
            warn!(%handle, device = name, "device list exposes no creation capability");
            self.stats.soft_absences += 1;
            return Ok(None);
        };

        if self
            .call(container, m::CREATE_DEVICE, vec![name.into()])?
            .is_none()
        {
            return Ok(None);
        }
        let count = self.devices(handle)?.len();
        Ok(Some(count.saturating_sub(1)))
    }

    pub fn set_device_parameter(
        &mut self,
        handle: TrackHandle,
        device_index: usize,
        parameter: &str,
        value: RemoteValue,
    ) -> AdapterResult<bool> {
        let device = *self
            .devices(handle)?
            .get(device_index)
            .ok_or(AdapterError::DeviceOutOfRange {
                handle,
                index: device_index,
            })?;

        for candidate in self.list(device, m::PARAMETERS)? {
            let name = self.get(candidate, m::NAME)?;
            if name.as_ref().and_then(RemoteValue::as_str) == Some(parameter) {
                return self.set(candidate, m::VALUE, value);
            }
        }
        Err(AdapterError::UnknownParameter {
            device,
            parameter: parameter.to_string(),
        })
    }
}
