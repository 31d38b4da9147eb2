use songsync_core::{
    CueReconciler, Dialect, MemorySession, SectionSpec, SessionAdapter, TrackProvisioner,
    config::CueConfig,
};

fn sections() -> Vec<SectionSpec> {
    vec![
        SectionSpec::new("Intro", 1, 4),
        SectionSpec::new("Verse", 5, 8),
        SectionSpec::new("Chorus", 13, 8),
    ]
}

fn reconcile(adapter: &mut SessionAdapter<MemorySession>) -> songsync_core::cues::CueReport {
    let mut provisioner = TrackProvisioner::new();
    CueReconciler::default()
        .reconcile(adapter, &mut provisioner, &sections())
        .expect("reconciliation should succeed")
}

#[test]
fn markers_land_on_section_starts_and_end() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let report = reconcile(&mut adapter);

    let placed: Vec<(&str, f64)> = report
        .markers
        .iter()
        .map(|marker| (marker.name.as_str(), marker.beat))
        .collect();
    assert_eq!(
        placed,
        vec![("Intro", 0.0), ("Verse", 16.0), ("Chorus", 48.0), ("End", 80.0)]
    );
    assert_eq!(report.regions, 3);

    let snapshot = adapter.binding().snapshot();
    assert_eq!(snapshot.cue_times(), vec![0.0, 16.0, 48.0, 80.0]);
    let names: Vec<&str> = snapshot.cues.iter().map(|cue| cue.name.as_str()).collect();
    assert_eq!(names, vec!["Intro", "Verse", "Chorus", "End"]);
}

#[test]
fn placeholder_regions_extend_song_length() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    reconcile(&mut adapter);

    let snapshot = adapter.binding().snapshot();
    let placeholder = snapshot
        .track("Song Structure")
        .expect("placeholder track should exist");
    let regions: Vec<(f64, f64)> = placeholder
        .arrangement
        .iter()
        .map(|clip| (clip.start_time, clip.length))
        .collect();
    assert_eq!(regions, vec![(0.0, 16.0), (16.0, 32.0), (48.0, 32.0)]);
    assert!(placeholder.arrangement.iter().all(|clip| clip.notes.is_empty()));
    assert_eq!(snapshot.song_length, 80.0);
}

#[test]
fn rerun_renames_instead_of_duplicating() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let first = reconcile(&mut adapter);
    let second = reconcile(&mut adapter);

    assert!(first.markers.iter().all(|marker| marker.created));
    assert!(second.markers.iter().all(|marker| !marker.created));
    assert_eq!(adapter.binding().snapshot().cues.len(), 4);
}

#[test]
fn markers_follow_three_four_meter() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    adapter
        .set_time_signature(3, 4)
        .expect("signature should be applied");
    reconcile(&mut adapter);

    assert_eq!(
        adapter.binding().snapshot().cue_times(),
        vec![0.0, 12.0, 36.0, 60.0]
    );
}

#[test]
fn missing_toggle_falls_back_to_cue_creation() {
    let mut session = MemorySession::new(Dialect::Generic);
    session.hide_member("set_or_delete_cue");
    let mut adapter = SessionAdapter::new(session);
    let report = reconcile(&mut adapter);

    assert_eq!(report.markers.len(), 4);
    assert_eq!(
        adapter.binding().snapshot().cue_times(),
        vec![0.0, 16.0, 48.0, 80.0]
    );
}

#[test]
fn no_cue_capability_skips_markers_without_failing() {
    let mut session = MemorySession::new(Dialect::Hybrid);
    session.hide_member("set_or_delete_cue");
    session.hide_member("create_cue_point");
    let mut adapter = SessionAdapter::new(session);
    let report = reconcile(&mut adapter);

    assert!(report.markers.is_empty());
    assert_eq!(report.regions, 3);
    assert!(adapter.stats().soft_absences >= 8);
}

#[test]
fn custom_names_come_from_config() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let mut provisioner = TrackProvisioner::new();
    let reconciler = CueReconciler::new(CueConfig {
        placeholder_track_name: "Guide".to_string(),
        end_marker_name: "Fin".to_string(),
        ..CueConfig::default()
    });
    reconciler
        .reconcile(&mut adapter, &mut provisioner, &sections())
        .expect("reconciliation should succeed");

    let snapshot = adapter.binding().snapshot();
    assert!(snapshot.track("Guide").is_some());
    assert_eq!(snapshot.cues.last().map(|cue| cue.name.as_str()), Some("Fin"));
    assert_eq!(provisioner.tracks().find("Guide").map(|t| t.role.as_str()), Some("dummy"));
}
