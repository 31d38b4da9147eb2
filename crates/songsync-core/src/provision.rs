//! Track and clip provisioning.
//!
//! The provisioner owns the mapping from declared tracks to positional
//! session handles. Handles are taken right after creation and stay valid as
//! long as nobody reorders or deletes tracks during the run.

use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::{
    adapter::{AdapterResult, SessionAdapter},
    color::resolve_color,
    model::{ClipSpec, ClipWithNotes, PLACEHOLDER_ROLE, TrackKind, TrackSpec},
    session::{LiveBinding, ObjectRef, SlotIndex, TrackHandle},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionedTrack {
    /// Position in the song description; `None` for engine-owned tracks.
    pub declared: Option<usize>,
    pub name: String,
    pub role: String,
    pub kind: TrackKind,
    pub handle: TrackHandle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProvisionedTracks {
    entries: Vec<ProvisionedTrack>,
}

impl ProvisionedTracks {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProvisionedTrack> {
        self.entries.iter()
    }

    #[must_use]
    pub fn handle_for(&self, declared: usize) -> Option<TrackHandle> {
        self.entries
            .iter()
            .find(|entry| entry.declared == Some(declared))
            .map(|entry| entry.handle)
    }

    /// Exact, case-sensitive name match; the first provisioned track wins.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ProvisionedTrack> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Like [`Self::find`], restricted to tracks from the song description.
    #[must_use]
    pub fn find_declared(&self, name: &str) -> Option<&ProvisionedTrack> {
        self.entries
            .iter()
            .find(|entry| entry.declared.is_some() && entry.name == name)
    }

    fn push(&mut self, entry: ProvisionedTrack) {
        self.entries.push(entry);
    }
}

#[derive(Debug, Default)]
pub struct TrackProvisioner {
    tracks: ProvisionedTracks,
}

impl TrackProvisioner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tracks(&self) -> &ProvisionedTracks {
        &self.tracks
    }

    #[must_use]
    pub fn into_tracks(self) -> ProvisionedTracks {
        self.tracks
    }

    pub fn create_track<B: LiveBinding>(
        &mut self,
        adapter: &mut SessionAdapter<B>,
        kind: TrackKind,
    ) -> AdapterResult<TrackHandle> {
        adapter.create_track(kind)
    }

    /// Applies every declared property independently; absent capabilities
    /// are skipped, remote failures abort.
    #[instrument(skip(self, adapter, spec), fields(track = %spec.name, %handle))]
    pub fn set_track_properties<B: LiveBinding>(
        &mut self,
        adapter: &mut SessionAdapter<B>,
        handle: TrackHandle,
        spec: &TrackSpec,
    ) -> AdapterResult<()> {
        adapter.set_track_name(handle, &spec.name)?;
        if let Some(color) = &spec.color {
            adapter.set_track_color(handle, resolve_color(color))?;
        }
        if let Some(volume) = spec.volume {
            adapter.set_track_volume(handle, volume)?;
        }
        if let Some(pan) = spec.pan {
            adapter.set_track_pan(handle, pan)?;
        }
        if let Some(muted) = spec.muted {
            adapter.set_track_mute(handle, muted)?;
        }
        if let Some(solo) = spec.solo {
            adapter.set_track_solo(handle, solo)?;
        }
        if let Some(armed) = spec.armed {
            if spec.kind.can_arm() {
                adapter.set_track_arm(handle, armed)?;
            } else {
                debug!(kind = %spec.kind, "track kind cannot be armed; skipped");
            }
        }
        Ok(())
    }

    /// Places a simple clip in the first free session slot.
    pub fn create_clip<B: LiveBinding>(
        &mut self,
        adapter: &mut SessionAdapter<B>,
        handle: TrackHandle,
        clip: &ClipSpec,
    ) -> AdapterResult<Option<SlotIndex>> {
        let color = clip.color.as_deref().map(resolve_color);
        let slot = adapter.create_clip_in_free_slot(handle, clip.length, clip.name.as_deref(), color)?;
        match slot {
            Some(slot) => debug!(%handle, %slot, "clip created"),
            None => info!(%handle, clip = ?clip.name, "no free clip slot; clip skipped"),
        }
        Ok(slot)
    }

    /// Writes a generated clip into the arrangement through the track's last
    /// session slot.
    pub fn write_note_clip<B: LiveBinding>(
        &mut self,
        adapter: &mut SessionAdapter<B>,
        handle: TrackHandle,
        clip: &ClipWithNotes,
    ) -> AdapterResult<ObjectRef> {
        let arranged = adapter.write_arrangement_clip(handle, clip)?;
        if let Some(color) = &clip.color {
            adapter.set_clip_color(arranged, resolve_color(color))?;
        }
        Ok(arranged)
    }

    /// Creates the declared track, applies its properties and static clips.
    #[instrument(skip(self, adapter, spec), fields(track = %spec.name, kind = %spec.kind))]
    pub fn provision<B: LiveBinding>(
        &mut self,
        adapter: &mut SessionAdapter<B>,
        declared: usize,
        spec: &TrackSpec,
    ) -> AdapterResult<TrackHandle> {
        let result = self.provision_inner(adapter, spec);
        match &result {
            Ok(handle) => {
                self.tracks.push(ProvisionedTrack {
                    declared: Some(declared),
                    name: spec.name.clone(),
                    role: spec.role.clone(),
                    kind: spec.kind,
                    handle: *handle,
                });
                info!(%handle, "track provisioned");
            }
            Err(err) => error!(track = %spec.name, error = %err, "error creating track"),
        }
        result
    }

    fn provision_inner<B: LiveBinding>(
        &mut self,
        adapter: &mut SessionAdapter<B>,
        spec: &TrackSpec,
    ) -> AdapterResult<TrackHandle> {
        let handle = self.create_track(adapter, spec.kind)?;
        self.set_track_properties(adapter, handle, spec)?;
        for clip in &spec.clips {
            self.create_clip(adapter, handle, clip)?;
        }
        Ok(handle)
    }

    /// The engine-owned MIDI track that carries section regions.
    #[instrument(skip(self, adapter))]
    pub fn provision_placeholder<B: LiveBinding>(
        &mut self,
        adapter: &mut SessionAdapter<B>,
        name: &str,
    ) -> AdapterResult<TrackHandle> {
        let handle = self.create_track(adapter, TrackKind::Midi)?;
        adapter.set_track_name(handle, name)?;
        self.tracks.push(ProvisionedTrack {
            declared: None,
            name: name.to_string(),
            role: PLACEHOLDER_ROLE.to_string(),
            kind: TrackKind::Midi,
            handle,
        });
        info!(%handle, "placeholder track provisioned");
        Ok(handle)
    }
}
