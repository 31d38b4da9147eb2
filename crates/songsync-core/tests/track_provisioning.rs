use songsync_core::{
    ClipSpec, ClipWithNotes, Dialect, MemorySession, Note, SessionAdapter, SlotIndex, TrackHandle,
    TrackKind, TrackProvisioner, TrackSpec, color::FALLBACK_COLOR,
};

fn clip(name: &str) -> ClipSpec {
    ClipSpec {
        start_time: 0.0,
        length: 4.0,
        name: Some(name.to_string()),
        color: None,
    }
}

#[test]
fn declared_properties_are_applied() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let mut provisioner = TrackProvisioner::new();

    let mut spec = TrackSpec::new("Keys", "chords", TrackKind::Midi);
    spec.color = Some("teal".to_string());
    spec.volume = Some(0.6);
    spec.pan = Some(-0.5);
    spec.muted = Some(true);
    spec.solo = Some(true);
    spec.armed = Some(true);
    let handle = provisioner
        .provision(&mut adapter, 0, &spec)
        .expect("track should be provisioned");

    assert_eq!(handle, TrackHandle::Track(0));
    let snapshot = adapter.binding().snapshot();
    let keys = snapshot.track("Keys").expect("track should be named");
    assert_eq!(keys.color, 0x0000_8080);
    assert_eq!(keys.volume, 0.6);
    assert_eq!(keys.pan, -0.5);
    assert!(keys.mute && keys.solo && keys.arm);
    assert_eq!(provisioner.tracks().handle_for(0), Some(handle));
}

#[test]
fn unknown_color_becomes_gray() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let mut provisioner = TrackProvisioner::new();
    let mut spec = TrackSpec::new("Pad", "texture", TrackKind::Midi);
    spec.color = Some("ultraviolet".to_string());

    provisioner
        .provision(&mut adapter, 0, &spec)
        .expect("track should be provisioned");

    let snapshot = adapter.binding().snapshot();
    assert_eq!(
        snapshot.track("Pad").map(|track| track.color),
        Some(FALLBACK_COLOR)
    );
}

#[test]
fn arm_is_skipped_for_return_tracks() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let mut provisioner = TrackProvisioner::new();
    let mut spec = TrackSpec::new("Delay", "fx", TrackKind::Return);
    spec.armed = Some(true);

    let handle = provisioner
        .provision(&mut adapter, 0, &spec)
        .expect("return track should be provisioned");

    assert_eq!(handle, TrackHandle::Return(0));
    assert_eq!(adapter.stats().soft_absences, 0);
    let snapshot = adapter.binding().snapshot();
    assert_eq!(snapshot.return_tracks[0].name, "Delay");
    assert!(!snapshot.return_tracks[0].arm);
}

#[test]
fn master_track_is_resolved_not_created() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let mut provisioner = TrackProvisioner::new();
    let mut spec = TrackSpec::new("Main Out", "master", TrackKind::Master);
    spec.volume = Some(0.7);

    let handle = provisioner
        .provision(&mut adapter, 3, &spec)
        .expect("master should be provisioned");

    assert_eq!(handle, TrackHandle::Master);
    let snapshot = adapter.binding().snapshot();
    assert!(snapshot.tracks.is_empty());
    assert_eq!(snapshot.master_track.name, "Main Out");
    assert_eq!(snapshot.master_track.volume, 0.7);
}

#[test]
fn static_clips_fill_free_slots_and_overflow_is_skipped() {
    let mut adapter = SessionAdapter::new(MemorySession::with_scenes(Dialect::Hybrid, 2));
    let mut provisioner = TrackProvisioner::new();
    let handle = provisioner
        .create_track(&mut adapter, TrackKind::Midi)
        .expect("track should be created");

    let placed: Vec<Option<SlotIndex>> = ["A", "B", "C"]
        .into_iter()
        .map(|name| {
            provisioner
                .create_clip(&mut adapter, handle, &clip(name))
                .expect("clip creation should not fail")
        })
        .collect();

    assert_eq!(placed, vec![Some(SlotIndex(0)), Some(SlotIndex(1)), None]);
    let snapshot = adapter.binding().snapshot();
    let names: Vec<Option<&str>> = snapshot.tracks[0]
        .slots
        .iter()
        .map(|slot| slot.as_ref().map(|clip| clip.name.as_str()))
        .collect();
    assert_eq!(names, vec![Some("A"), Some("B")]);
}

#[test]
fn note_clips_reuse_the_last_slot() {
    let mut adapter = SessionAdapter::new(MemorySession::with_scenes(Dialect::Hybrid, 4));
    let mut provisioner = TrackProvisioner::new();
    let handle = provisioner
        .create_track(&mut adapter, TrackKind::Midi)
        .expect("track should be created");

    let mut first = ClipWithNotes::empty("Verse", 0.0, 16.0);
    first.notes.push(Note {
        pitch: 57,
        start_beats: 0.0,
        duration_beats: 4.0,
        velocity: 90,
    });
    let mut second = ClipWithNotes::empty("Chorus", 16.0, 16.0);
    second.color = Some("red".to_string());

    provisioner
        .write_note_clip(&mut adapter, handle, &first)
        .expect("first clip should be written");
    provisioner
        .write_note_clip(&mut adapter, handle, &second)
        .expect("second clip should be written");

    let snapshot = adapter.binding().snapshot();
    let track = &snapshot.tracks[0];
    assert_eq!(track.slots.len(), 4);
    assert!(track.slots[..3].iter().all(Option::is_none));
    assert_eq!(
        track.slots[3].as_ref().map(|clip| clip.name.as_str()),
        Some("Chorus")
    );

    assert_eq!(track.arrangement.len(), 2);
    assert_eq!(track.arrangement[0].start_time, 0.0);
    assert_eq!(track.arrangement[0].notes.len(), 1);
    assert_eq!(track.arrangement[0].notes[0].velocity, 90);
    assert!(!track.arrangement[0].notes[0].mute);
    assert_eq!(track.arrangement[1].start_time, 16.0);
    assert_eq!(track.arrangement[1].color, Some(0x00ff_0000));
}

#[test]
fn failed_creation_is_reraised_and_not_recorded() {
    let mut session = MemorySession::new(Dialect::Hybrid);
    session.reject_member("create_audio_track", "no audio inputs");
    let mut adapter = SessionAdapter::new(session);
    let mut provisioner = TrackProvisioner::new();

    let spec = TrackSpec::new("Vox", "lead", TrackKind::Audio);
    assert!(provisioner.provision(&mut adapter, 0, &spec).is_err());
    assert!(provisioner.tracks().is_empty());
}

#[test]
fn chord_clips_cannot_be_staged_on_audio_tracks() {
    let mut adapter = SessionAdapter::new(MemorySession::new(Dialect::Hybrid));
    let mut provisioner = TrackProvisioner::new();
    let handle = provisioner
        .create_track(&mut adapter, TrackKind::Audio)
        .expect("track should be created");

    let result = provisioner.write_note_clip(
        &mut adapter,
        handle,
        &ClipWithNotes::empty("Verse", 0.0, 4.0),
    );
    assert!(result.is_err());
}
