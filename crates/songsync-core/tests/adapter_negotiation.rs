use songsync_core::{
    AdapterError, Convention, Dialect, MemorySession, RemoteValue, SessionAdapter, TrackHandle,
    TrackKind,
    adapter::members,
};

#[test]
fn creator_dialect_answers_creator_names() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::CreatorStyle));
    let handle = adapter
        .create_track(TrackKind::Midi)
        .expect("track should be created");

    assert_eq!(handle, TrackHandle::Track(0));
    assert_eq!(
        adapter.negotiated(members::CREATE_MIDI_TRACK),
        Some(Convention::Creator)
    );
    assert_eq!(adapter.stats().fallbacks, 0);
}

#[test]
fn generic_dialect_is_negotiated_once_and_cached() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Generic));
    let first = adapter
        .create_track(TrackKind::Audio)
        .expect("first track should be created");
    let second = adapter
        .create_track(TrackKind::Audio)
        .expect("second track should be created");

    assert_eq!(first, TrackHandle::Track(0));
    assert_eq!(second, TrackHandle::Track(1));
    assert_eq!(
        adapter.negotiated(members::CREATE_AUDIO_TRACK),
        Some(Convention::Generic)
    );
    assert_eq!(adapter.stats().fallbacks, 1);
    assert_eq!(adapter.binding().mutation_count("create_audio_track"), 2);
}

#[test]
fn return_and_master_tracks_have_their_own_handles() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    adapter
        .create_track(TrackKind::Midi)
        .expect("midi track should be created");

    let send = adapter
        .create_track(TrackKind::Return)
        .expect("return track should be created");
    let master = adapter
        .create_track(TrackKind::Master)
        .expect("master track should resolve");

    assert_eq!(send, TrackHandle::Return(0));
    assert_eq!(master, TrackHandle::Master);
    assert_eq!(adapter.track_count().expect("tracks should list"), 1);
    assert_eq!(
        adapter.track_name(master).expect("master name should read"),
        Some("Master".to_string())
    );
}

#[test]
fn absent_capability_is_a_soft_no_op() {
    let mut session = MemorySession::new(Dialect::Hybrid);
    session.hide_member("mixer_device");
    let mut adapter = SessionAdapter::new(session);
    let handle = adapter
        .create_track(TrackKind::Midi)
        .expect("track should be created");

    let applied = adapter
        .set_track_volume(handle, 0.5)
        .expect("absence should not be an error");

    assert!(!applied);
    assert_eq!(adapter.stats().soft_absences, 1);
}

#[test]
fn remote_rejection_is_a_hard_failure() {
    let mut session = MemorySession::new(Dialect::Hybrid);
    session.reject_member("create_midi_track", "track limit reached");
    let mut adapter = SessionAdapter::new(session);

    let err = adapter
        .create_track(TrackKind::Midi)
        .expect_err("rejected creation should fail");

    assert!(matches!(
        err,
        AdapterError::Remote {
            member: "create_midi_track",
            ..
        }
    ));
    assert_eq!(adapter.stats().soft_absences, 0);
}

#[test]
fn out_of_range_parameter_value_is_rejected() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let handle = adapter
        .create_track(TrackKind::Midi)
        .expect("track should be created");

    let err = adapter
        .set_track_pan(handle, 3.0)
        .expect_err("pan outside -1..=1 should be rejected");
    assert!(matches!(err, AdapterError::Remote { member: "value", .. }));
}

#[test]
fn handles_go_stale_when_tracks_are_removed_externally() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let handle = adapter
        .create_track(TrackKind::Midi)
        .expect("track should be created");
    adapter.binding_mut().delete_track(0);

    let err = adapter
        .set_track_name(handle, "Gone")
        .expect_err("stale handle should not resolve");
    assert!(matches!(
        err,
        AdapterError::TrackOutOfRange { count: 0, .. }
    ));
}

#[test]
fn arming_a_return_track_is_soft_absent() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let handle = adapter
        .create_track(TrackKind::Return)
        .expect("return track should be created");

    let applied = adapter
        .set_track_arm(handle, true)
        .expect("absence should not be an error");
    assert!(!applied);
}

#[test]
fn device_parameters_are_matched_by_name() {
    let mut session = MemorySession::new(Dialect::Hybrid);
    session.register_device("Wavetable", &[("Filter Freq", 0.0, 1.0)]);
    let mut adapter = SessionAdapter::new(session);
    let handle = adapter
        .create_track(TrackKind::Midi)
        .expect("track should be created");

    let index = adapter
        .create_device(handle, "Wavetable")
        .expect("device should be created")
        .expect("device creation should be available");
    assert_eq!(index, 0);

    assert!(
        adapter
            .set_device_parameter(handle, index, "Filter Freq", RemoteValue::Float(0.25))
            .expect("known parameter should be set")
    );
    let err = adapter
        .set_device_parameter(handle, index, "Resonance", RemoteValue::Float(0.5))
        .expect_err("unknown parameter should fail");
    assert!(matches!(err, AdapterError::UnknownParameter { .. }));
}
