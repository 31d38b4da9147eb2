pub mod adapter;
pub mod color;
pub mod config;
pub mod cues;
pub mod diagnostics;
pub mod engine;
pub mod fixtures;
pub mod harmony;
pub mod instruments;
pub mod memory;
pub mod model;
pub mod persistence;
pub mod provision;
pub mod session;
pub mod time;

pub use adapter::{AdapterError, AdapterStats, Convention, Member, SessionAdapter};
pub use config::AppConfig;
pub use cues::{CueReconciler, CueState, PlacedMarker};
pub use diagnostics::{TelemetryGuard, init_tracing, init_tracing_with_config};
pub use engine::{EngineError, SyncEngine, SyncReport};
pub use harmony::{ChordSymbol, Humanizer, JitterProfile};
pub use instruments::{TrackInstruments, inspect_track_instruments};
pub use memory::{Dialect, MemorySession, SessionSnapshot};
pub use model::{
    ClipSpec, ClipWithNotes, DeviceSpec, ExternalInstrument, InstrumentSpec, Note, SectionSpec,
    SongDescription, SongStructure, TrackKind, TrackSpec, ValidationError,
};
pub use provision::{ProvisionedTracks, TrackProvisioner};
pub use session::{LiveBinding, ObjectRef, RemoteError, RemoteValue, SlotIndex, TrackHandle};
pub use time::{Meter, MeterModel};
