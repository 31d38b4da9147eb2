use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    adapter::{AdapterError, SessionAdapter},
    config::AppConfig,
    cues::{CueReconciler, PlacedMarker},
    harmony::{Humanizer, section_clip},
    instruments::{TrackInstruments, attach_track_devices, inspect_track_instruments},
    model::{SongDescription, SongStructure, ValidationError},
    provision::{ProvisionedTracks, TrackProvisioner},
    session::{LiveBinding, TrackHandle},
    time::MeterModel,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid song description: {0}")]
    InvalidSong(#[from] ValidationError),
    #[error("failed to apply song settings")]
    Settings(#[source] AdapterError),
    #[error("track \"{name}\" failed")]
    Track {
        name: String,
        #[source]
        source: AdapterError,
    },
    #[error("section \"{name}\" failed")]
    Section {
        name: String,
        #[source]
        source: AdapterError,
    },
    #[error("instrument \"{instrument}\" on track \"{track}\" failed")]
    Instrument {
        track: String,
        instrument: String,
        #[source]
        source: AdapterError,
    },
    #[error("chords for section \"{section}\" on track \"{track}\" failed")]
    Chords {
        track: String,
        section: String,
        #[source]
        source: AdapterError,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tracks_provisioned: usize,
    pub markers_placed: usize,
    pub markers: Vec<PlacedMarker>,
    pub instruments_attached: usize,
    pub chord_clips_written: usize,
    pub notes_written: usize,
    pub soft_absences: u64,
    pub remote_calls: u64,
    pub naming_fallbacks: u64,
}

/// Drives one song through the fixed pipeline: settings, tracks, sections,
/// instruments, chords. Nothing is rolled back when a step fails.
pub struct SyncEngine<B> {
    adapter: SessionAdapter<B>,
    config: AppConfig,
    humanizer: Humanizer,
    tracks: ProvisionedTracks,
}

impl<B: LiveBinding> SyncEngine<B> {
    #[must_use]
    pub fn new(binding: B, config: AppConfig) -> Self {
        let humanizer = match config.harmony.seed {
            Some(seed) => Humanizer::seeded(seed),
            None => Humanizer::from_entropy(),
        }
        .with_profile(config.harmony.jitter);

        Self {
            adapter: SessionAdapter::new(binding),
            config,
            humanizer,
            tracks: ProvisionedTracks::default(),
        }
    }

    #[must_use]
    pub fn with_humanizer(mut self, humanizer: Humanizer) -> Self {
        self.humanizer = humanizer;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn adapter(&self) -> &SessionAdapter<B> {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut SessionAdapter<B> {
        &mut self.adapter
    }

    #[must_use]
    pub fn into_binding(self) -> B {
        self.adapter.into_inner()
    }

    /// Tracks provisioned by the most recent run.
    #[must_use]
    pub fn tracks(&self) -> &ProvisionedTracks {
        &self.tracks
    }

    #[instrument(skip_all, fields(tracks = song.tracks.len(), sections = song.sections().len()))]
    pub fn run(&mut self, song: &SongDescription) -> Result<SyncReport, EngineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let before = self.adapter.stats();
        info!(%run_id, "sync started");

        song.validate().inspect_err(|err| {
            error!(error = %err, "song description rejected");
        })?;

        self.apply_settings(&song.song_structure)?;

        let mut provisioner = TrackProvisioner::new();
        let handles = self.provision_tracks(&mut provisioner, song)?;

        let cues = CueReconciler::new(self.config.cues.clone()).reconcile(
            &mut self.adapter,
            &mut provisioner,
            song.sections(),
        )?;

        let mut instruments_attached = 0;
        for (spec, handle) in song.tracks.iter().zip(&handles) {
            if spec.has_devices() {
                instruments_attached += attach_track_devices(&mut self.adapter, *handle, spec)?.len();
            }
        }

        let (chord_clips_written, notes_written) =
            self.write_chords(&mut provisioner, song, &handles)?;

        self.tracks = provisioner.into_tracks();
        let after = self.adapter.stats();
        let report = SyncReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            tracks_provisioned: handles.len(),
            markers_placed: cues.markers.len(),
            markers: cues.markers,
            instruments_attached,
            chord_clips_written,
            notes_written,
            soft_absences: after.soft_absences - before.soft_absences,
            remote_calls: after.remote_calls - before.remote_calls,
            naming_fallbacks: after.fallbacks - before.fallbacks,
        };
        info!(
            %run_id,
            tracks = report.tracks_provisioned,
            markers = report.markers_placed,
            clips = report.chord_clips_written,
            soft_absences = report.soft_absences,
            "sync finished"
        );
        Ok(report)
    }

    /// Reports the devices of the track provisioned under exactly `name` by
    /// the most recent run.
    pub fn inspect(&mut self, name: &str) -> Result<Option<TrackInstruments>, EngineError> {
        inspect_track_instruments(&mut self.adapter, &self.tracks, name).map_err(|source| {
            EngineError::Track {
                name: name.to_string(),
                source,
            }
        })
    }

    fn apply_settings(&mut self, structure: &SongStructure) -> Result<(), EngineError> {
        if self.config.session.apply_tempo {
            self.adapter
                .set_tempo(structure.tempo)
                .map_err(EngineError::Settings)?;
        }
        if self.config.session.apply_signature {
            self.adapter
                .set_time_signature(structure.signature_numerator, structure.signature_denominator)
                .map_err(EngineError::Settings)?;
        }
        Ok(())
    }

    fn provision_tracks(
        &mut self,
        provisioner: &mut TrackProvisioner,
        song: &SongDescription,
    ) -> Result<Vec<TrackHandle>, EngineError> {
        song.tracks
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                provisioner
                    .provision(&mut self.adapter, index, spec)
                    .map_err(|source| EngineError::Track {
                        name: spec.name.clone(),
                        source,
                    })
            })
            .collect()
    }

    fn write_chords(
        &mut self,
        provisioner: &mut TrackProvisioner,
        song: &SongDescription,
        handles: &[TrackHandle],
    ) -> Result<(usize, usize), EngineError> {
        if !song.has_chord_track() {
            warn!("no track has role \"chords\"; no harmonic content generated");
            return Ok((0, 0));
        }

        let mut clips = 0;
        let mut notes = 0;
        for (index, track) in song.chord_tracks() {
            let handle = handles[index];
            for section in song.sections() {
                let meter = MeterModel::read(&mut self.adapter);
                let start = meter.bar_to_beats(section.start_bar.saturating_sub(1));
                let clip = section_clip(
                    section,
                    start,
                    meter.beats_per_bar(),
                    self.config.harmony.octave,
                    &mut self.humanizer,
                );

                provisioner
                    .write_note_clip(&mut self.adapter, handle, &clip)
                    .map_err(|source| {
                        error!(track = %track.name, section = %section.name, error = %source, "failed to write chords");
                        EngineError::Chords {
                            track: track.name.clone(),
                            section: section.name.clone(),
                            source,
                        }
                    })?;
                clips += 1;
                notes += clip.notes.len();
            }
            info!(track = %track.name, clips = song.sections().len(), "chords written");
        }
        Ok((clips, notes))
    }
}
