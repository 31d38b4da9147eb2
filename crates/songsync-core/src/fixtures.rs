use std::collections::BTreeMap;

use crate::model::{
    ClipSpec, DeviceSpec, ExternalInstrument, InstrumentSpec, SectionSpec, SongDescription,
    SongStructure, TrackKind, TrackSpec,
};

/// A small, fully deterministic song that touches every pipeline phase.
#[must_use]
pub fn demo_song() -> SongDescription {
    let sections = vec![
        SectionSpec::new("Intro", 1, 4)
            .with_chords(["Am", "F", "C", "G"])
            .with_energy(0.3),
        SectionSpec::new("Verse", 5, 8).with_chords(["Am", "F", "C", "G"]),
        SectionSpec::new("Chorus", 13, 8)
            .with_chords(["F", "G", "Em", "Am"])
            .with_energy(0.9),
    ];

    let mut keys = TrackSpec::new("Keys", "chords", TrackKind::Midi);
    keys.color = Some("teal".to_string());
    keys.volume = Some(0.8);
    keys.armed = Some(true);
    let mut piano = InstrumentSpec::new("Grand Piano");
    piano.parameters = BTreeMap::from([("Device On".to_string(), serde_json::json!(1))]);
    keys.instruments.push(piano);

    let mut bass = TrackSpec::new("Bass", "bass", TrackKind::Midi);
    bass.color = Some("#3355ff".to_string());
    bass.pan = Some(-0.2);
    bass.external_instrument = Some(ExternalInstrument {
        midi_port: "Synth Port 1".to_string(),
        midi_channel: 2,
        audio_from: "Ext. In 3/4".to_string(),
        latency_ms: 4,
    });

    let mut drums = TrackSpec::new("Drums", "rhythm", TrackKind::Midi);
    drums.color = Some("orange".to_string());
    drums.clips.push(ClipSpec {
        start_time: 0.0,
        length: 4.0,
        name: Some("Groove".to_string()),
        color: Some("orange".to_string()),
    });

    let mut vocals = TrackSpec::new("Vocals", "lead", TrackKind::Audio);
    vocals.muted = Some(false);
    vocals.armed = Some(true);

    let mut reverb = TrackSpec::new("Reverb", "fx", TrackKind::Return);
    reverb.device_chain.push(DeviceSpec {
        device: "Reverb".to_string(),
        preset: Some("Large Hall".to_string()),
    });

    SongDescription {
        song_structure: SongStructure {
            total_length_bars: 20,
            tempo: 96.0,
            signature_numerator: 4,
            signature_denominator: 4,
            sections,
        },
        tracks: vec![keys, bass, drums, vocals, reverb],
    }
}
