//! Section markers.
//!
//! Every marker goes through observe → toggle → observe → name. The toggle
//! capability deletes a cue when one already sits under the playhead, so it
//! is only invoked when no cue was observed near the target beat. Re-running
//! a sync therefore renames existing markers instead of removing them.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    adapter::{AdapterResult, SessionAdapter},
    config::CueConfig,
    engine::EngineError,
    model::{ClipWithNotes, SectionSpec},
    provision::TrackProvisioner,
    session::{LiveBinding, ObjectRef, TrackHandle},
    time::MeterModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueState {
    Absent,
    Present(ObjectRef),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedMarker {
    pub name: String,
    pub beat: f64,
    /// `false` when an existing cue was renamed.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueReport {
    pub placeholder: TrackHandle,
    pub regions: usize,
    pub markers: Vec<PlacedMarker>,
}

#[derive(Debug, Clone)]
pub struct CueReconciler {
    config: CueConfig,
}

impl Default for CueReconciler {
    fn default() -> Self {
        Self::new(CueConfig::default())
    }
}

impl CueReconciler {
    #[must_use]
    pub fn new(config: CueConfig) -> Self {
        Self { config }
    }

    /// Nearest cue within tolerance of `beat`. Cues whose time cannot be
    /// read are skipped.
    pub fn observe<B: LiveBinding>(
        &self,
        adapter: &mut SessionAdapter<B>,
        beat: f64,
    ) -> AdapterResult<CueState> {
        let mut nearest: Option<(f64, ObjectRef)> = None;
        for cue in adapter.cue_points()? {
            let time = match adapter.cue_time(cue) {
                Ok(Some(time)) => time,
                Ok(None) => continue,
                Err(err) => {
                    warn!(%cue, error = %err, "failed to read cue time; skipped");
                    continue;
                }
            };
            let distance = (time - beat).abs();
            if distance <= self.config.tolerance_beats
                && nearest.is_none_or(|(best, _)| distance < best)
            {
                nearest = Some((distance, cue));
            }
        }
        Ok(nearest.map_or(CueState::Absent, |(_, cue)| CueState::Present(cue)))
    }

    /// Makes sure a cue named `name` sits at `beat`. `Ok(None)` when the
    /// session offers no way to create one.
    #[instrument(skip(self, adapter))]
    pub fn ensure_marker<B: LiveBinding>(
        &self,
        adapter: &mut SessionAdapter<B>,
        name: &str,
        beat: f64,
    ) -> AdapterResult<Option<PlacedMarker>> {
        let mut created = false;
        let mut state = self.observe(adapter, beat)?;
        if state == CueState::Absent {
            adapter.move_playhead(beat)?;
            adapter.toggle_cue(beat)?;
            state = self.observe(adapter, beat)?;
            created = true;
        }

        let CueState::Present(cue) = state else {
            warn!(marker = name, beat, "marker could not be placed");
            return Ok(None);
        };
        adapter.set_cue_name(cue, name)?;
        debug!(marker = name, beat, created, "marker placed");
        Ok(Some(PlacedMarker {
            name: name.to_string(),
            beat,
            created,
        }))
    }

    /// Placeholder track, one empty region and marker per section, and a
    /// closing marker at the end of the last section.
    #[instrument(skip_all, fields(sections = sections.len()))]
    pub fn reconcile<B: LiveBinding>(
        &self,
        adapter: &mut SessionAdapter<B>,
        provisioner: &mut TrackProvisioner,
        sections: &[SectionSpec],
    ) -> Result<CueReport, EngineError> {
        let placeholder = provisioner
            .provision_placeholder(adapter, &self.config.placeholder_track_name)
            .map_err(|source| EngineError::Track {
                name: self.config.placeholder_track_name.clone(),
                source,
            })?;

        let mut report = CueReport {
            placeholder,
            regions: 0,
            markers: Vec::with_capacity(sections.len() + 1),
        };

        for section in sections {
            let placed = self
                .place_section(adapter, provisioner, placeholder, section)
                .map_err(|source| EngineError::Section {
                    name: section.name.clone(),
                    source,
                })?;
            report.regions += 1;
            report.markers.extend(placed);
        }

        match sections.last() {
            Some(last) => {
                let end_bar = last.end_bar().saturating_sub(1);
                let beat = MeterModel::bar_to_beats(adapter, end_bar);
                let name = &self.config.end_marker_name;
                let placed = self
                    .ensure_marker(adapter, name, beat)
                    .map_err(|source| EngineError::Section {
                        name: name.clone(),
                        source,
                    })?;
                report.markers.extend(placed);
            }
            None => debug!("song has no sections; no end marker"),
        }

        info!(
            regions = report.regions,
            markers = report.markers.len(),
            "sections reconciled"
        );
        Ok(report)
    }

    fn place_section<B: LiveBinding>(
        &self,
        adapter: &mut SessionAdapter<B>,
        provisioner: &mut TrackProvisioner,
        placeholder: TrackHandle,
        section: &SectionSpec,
    ) -> AdapterResult<Option<PlacedMarker>> {
        let meter = MeterModel::read(adapter);
        let start = meter.bar_to_beats(section.start_bar.saturating_sub(1));
        let length = meter.bar_to_beats(section.length_bars);

        let region = ClipWithNotes::empty(section.name.clone(), start, length);
        provisioner.write_note_clip(adapter, placeholder, &region)?;
        self.ensure_marker(adapter, &section.name, start)
    }
}
