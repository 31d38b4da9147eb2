use songsync_core::{
    AppConfig, Dialect, EngineError, InstrumentSpec, MemorySession, SectionSpec, SyncEngine,
    TrackKind, TrackSpec, fixtures::demo_song,
};

fn seeded_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.harmony.seed = Some(42);
    config
}

fn engine(dialect: Dialect) -> SyncEngine<MemorySession> {
    SyncEngine::new(MemorySession::new(dialect), seeded_config())
}

#[test]
fn demo_song_runs_every_phase() {
    let mut engine = engine(Dialect::Hybrid);
    let report = engine.run(&demo_song()).expect("demo sync should succeed");

    assert_eq!(report.tracks_provisioned, 5);
    assert_eq!(report.markers_placed, 4);
    assert_eq!(report.instruments_attached, 3);
    assert_eq!(report.chord_clips_written, 3);
    assert_eq!(report.notes_written, (4 + 8 + 8) * 4);
    assert!(report.remote_calls > 0);
    assert!(report.finished_at >= report.started_at);

    let snapshot = engine.adapter().binding().snapshot();
    assert_eq!(snapshot.tempo, 96.0);
    assert_eq!(snapshot.cue_times(), vec![0.0, 16.0, 48.0, 80.0]);

    let keys = snapshot.track("Keys").expect("chord track should exist");
    let starts: Vec<f64> = keys.arrangement.iter().map(|clip| clip.start_time).collect();
    assert_eq!(starts, vec![0.0, 16.0, 48.0]);
    let note_counts: Vec<usize> = keys.arrangement.iter().map(|clip| clip.notes.len()).collect();
    assert_eq!(note_counts, vec![16, 32, 32]);
    assert_eq!(keys.devices, vec!["Grand Piano".to_string()]);
    assert!(keys.arm);

    let bass = snapshot.track("Bass").expect("bass track should exist");
    assert_eq!(bass.devices, vec!["External Instrument".to_string()]);
    assert!(bass.arrangement.is_empty());

    let drums = snapshot.track("Drums").expect("drum track should exist");
    assert_eq!(
        drums.slots[0].as_ref().map(|clip| clip.name.as_str()),
        Some("Groove")
    );

    assert_eq!(snapshot.return_tracks[0].name, "Reverb");
    assert_eq!(snapshot.return_tracks[0].devices, vec!["Reverb".to_string()]);
}

#[test]
fn both_dialects_build_the_same_session() {
    let mut creator = engine(Dialect::CreatorStyle);
    let mut generic = engine(Dialect::Generic);
    creator.run(&demo_song()).expect("creator-style sync should succeed");
    let report = generic.run(&demo_song()).expect("generic sync should succeed");

    assert!(report.naming_fallbacks > 0);
    assert_eq!(
        creator.adapter().binding().snapshot(),
        generic.adapter().binding().snapshot()
    );
}

#[test]
fn song_without_chord_tracks_still_succeeds() {
    let mut song = demo_song();
    for track in &mut song.tracks {
        track.role = "other".to_string();
    }

    let report = engine(Dialect::Hybrid)
        .run(&song)
        .expect("sync without chord tracks should succeed");
    assert_eq!(report.chord_clips_written, 0);
    assert_eq!(report.notes_written, 0);
    assert_eq!(report.markers_placed, 4);
}

#[test]
fn every_chord_track_gets_its_own_clips() {
    let mut song = demo_song();
    song.tracks[1].role = "Chords".to_string();

    let mut engine = engine(Dialect::Hybrid);
    let report = engine.run(&song).expect("sync should succeed");

    assert_eq!(report.chord_clips_written, 6);
    let snapshot = engine.adapter().binding().snapshot();
    assert_eq!(
        snapshot.track("Bass").map(|track| track.arrangement.len()),
        Some(3)
    );
}

#[test]
fn track_failure_aborts_with_track_name_and_no_rollback() {
    let mut session = MemorySession::new(Dialect::Hybrid);
    session.reject_member("create_audio_track", "no audio inputs");
    let mut engine = SyncEngine::new(session, seeded_config());

    let err = engine
        .run(&demo_song())
        .expect_err("rejected track creation should abort");

    assert!(matches!(&err, EngineError::Track { name, .. } if name == "Vocals"));
    assert!(err.to_string().contains("Vocals"));
    let snapshot = engine.adapter().binding().snapshot();
    assert_eq!(snapshot.tracks.len(), 3);
    assert!(snapshot.cues.is_empty());
}

#[test]
fn instrument_failure_names_track_and_instrument() {
    let mut session = MemorySession::new(Dialect::Hybrid);
    session.reject_member("create_device", "browser unavailable");
    let mut engine = SyncEngine::new(session, seeded_config());

    let err = engine
        .run(&demo_song())
        .expect_err("rejected device creation should abort");

    assert!(matches!(
        &err,
        EngineError::Instrument { track, instrument, .. }
            if track == "Keys" && instrument == "Grand Piano"
    ));
}

#[test]
fn invalid_song_is_rejected_before_touching_the_session() {
    let mut song = demo_song();
    song.song_structure.sections.push(SectionSpec::new("Outro", 15, 4));

    let mut engine = engine(Dialect::Hybrid);
    let err = engine.run(&song).expect_err("overlapping sections should fail");

    assert!(matches!(err, EngineError::InvalidSong(_)));
    assert!(engine.adapter().binding().journal().is_empty());
}

#[test]
fn rerunning_a_sync_keeps_one_marker_per_section() {
    let mut engine = engine(Dialect::Hybrid);
    engine.run(&demo_song()).expect("first sync should succeed");
    let report = engine.run(&demo_song()).expect("second sync should succeed");

    assert!(report.markers.iter().all(|marker| !marker.created));
    assert_eq!(engine.adapter().binding().snapshot().cues.len(), 4);
}

#[test]
fn song_settings_can_be_left_alone() {
    let mut config = seeded_config();
    config.session.apply_tempo = false;
    config.session.apply_signature = false;
    let mut engine = SyncEngine::new(MemorySession::default(), config);

    let mut song = demo_song();
    song.song_structure.signature_numerator = 3;
    engine.run(&song).expect("sync should succeed");

    let snapshot = engine.adapter().binding().snapshot();
    assert_eq!(snapshot.tempo, 120.0);
    assert_eq!(snapshot.cue_times(), vec![0.0, 16.0, 48.0, 80.0]);
}

#[test]
fn inspection_matches_track_names_exactly() {
    let mut engine = engine(Dialect::Hybrid);
    engine.run(&demo_song()).expect("sync should succeed");

    let keys = engine
        .inspect("Keys")
        .expect("inspection should succeed")
        .expect("Keys should be found");
    assert_eq!(keys.devices, vec!["Grand Piano".to_string()]);

    let reverb = engine
        .inspect("Reverb")
        .expect("inspection should succeed")
        .expect("return track should be found");
    assert_eq!(reverb.devices, vec!["Reverb".to_string()]);

    assert!(engine.inspect("keys").expect("inspection should succeed").is_none());
}

#[test]
fn empty_progression_writes_a_clip_without_notes() {
    let mut engine = engine(Dialect::Hybrid);
    let mut song = demo_song();
    song.song_structure.sections[1] =
        SectionSpec::new("Verse", 5, 8).with_chords(Vec::<String>::new());

    let report = engine.run(&song).expect("sync should succeed");
    assert_eq!(report.chord_clips_written, 3);
    assert_eq!(report.notes_written, (4 + 8) * 4);

    let snapshot = engine.adapter().binding().snapshot();
    let keys = snapshot.track("Keys").expect("chord track should exist");
    let note_counts: Vec<usize> = keys.arrangement.iter().map(|clip| clip.notes.len()).collect();
    assert_eq!(note_counts, vec![16, 0, 32]);
}

#[test]
fn inspection_finds_master_track_and_skips_engine_tracks() {
    let mut engine = engine(Dialect::Hybrid);
    let mut song = demo_song();
    let mut master = TrackSpec::new("Main Out", "master", TrackKind::Master);
    master.instruments.push(InstrumentSpec::new("Limiter"));
    song.tracks.push(master);
    engine.run(&song).expect("sync should succeed");

    let main_out = engine
        .inspect("Main Out")
        .expect("inspection should succeed")
        .expect("master track should be found");
    assert_eq!(main_out.devices, vec!["Limiter".to_string()]);

    assert!(
        engine
            .inspect("Song Structure")
            .expect("inspection should succeed")
            .is_none()
    );
}
