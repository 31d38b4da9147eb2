//! Device attachment and inspection.

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    adapter::{AdapterResult, SessionAdapter},
    engine::EngineError,
    model::{DeviceSpec, ExternalInstrument, InstrumentSpec, TrackSpec},
    provision::ProvisionedTracks,
    session::{LiveBinding, RemoteValue, TrackHandle},
};

pub const EXTERNAL_INSTRUMENT_DEVICE: &str = "External Instrument";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachedDevice {
    pub track: String,
    pub device: String,
    pub index: usize,
    pub parameters_applied: usize,
    pub parameters_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackInstruments {
    pub handle: TrackHandle,
    pub name: String,
    pub devices: Vec<String>,
}

/// Attaches `instruments`, then `device_chain`, then the external
/// instrument of one track. Parameter failures are logged and skipped; a
/// device that cannot be created aborts with the track and device names.
#[instrument(skip(adapter, spec), fields(track = %spec.name, %handle))]
pub fn attach_track_devices<B: LiveBinding>(
    adapter: &mut SessionAdapter<B>,
    handle: TrackHandle,
    spec: &TrackSpec,
) -> Result<Vec<AttachedDevice>, EngineError> {
    let mut attached = Vec::new();

    for instrument in &spec.instruments {
        attached.extend(attach_instrument(adapter, handle, &spec.name, instrument)?);
    }
    for device in &spec.device_chain {
        attached.extend(attach_chain_device(adapter, handle, &spec.name, device)?);
    }
    if let Some(external) = &spec.external_instrument {
        attached.extend(attach_external(adapter, handle, &spec.name, external)?);
    }

    if !attached.is_empty() {
        info!(devices = attached.len(), "devices attached");
    }
    Ok(attached)
}

fn attach_instrument<B: LiveBinding>(
    adapter: &mut SessionAdapter<B>,
    handle: TrackHandle,
    track: &str,
    instrument: &InstrumentSpec,
) -> Result<Option<AttachedDevice>, EngineError> {
    if let Some(preset) = &instrument.preset {
        debug!(device = %instrument.name, preset, "preset is not loaded remotely");
    }
    let parameters = instrument
        .parameters
        .iter()
        .filter_map(|(name, value)| match json_to_remote(value) {
            Some(value) => Some((name.clone(), value)),
            None => {
                warn!(track, device = %instrument.name, parameter = %name, "unsupported parameter value; skipped");
                None
            }
        })
        .collect::<Vec<_>>();
    attach_device(adapter, handle, track, &instrument.name, &parameters)
}

fn attach_chain_device<B: LiveBinding>(
    adapter: &mut SessionAdapter<B>,
    handle: TrackHandle,
    track: &str,
    device: &DeviceSpec,
) -> Result<Option<AttachedDevice>, EngineError> {
    if let Some(preset) = &device.preset {
        debug!(device = %device.device, preset, "preset is not loaded remotely");
    }
    attach_device(adapter, handle, track, &device.device, &[])
}

fn attach_external<B: LiveBinding>(
    adapter: &mut SessionAdapter<B>,
    handle: TrackHandle,
    track: &str,
    external: &ExternalInstrument,
) -> Result<Option<AttachedDevice>, EngineError> {
    let parameters = [
        ("MIDI To".to_string(), RemoteValue::from(external.midi_port.as_str())),
        ("MIDI Channel".to_string(), RemoteValue::Int(i64::from(external.midi_channel))),
        ("Audio From".to_string(), RemoteValue::from(external.audio_from.as_str())),
        ("Hardware Latency".to_string(), RemoteValue::Int(external.latency_ms)),
    ];
    attach_device(adapter, handle, track, EXTERNAL_INSTRUMENT_DEVICE, &parameters)
}

fn attach_device<B: LiveBinding>(
    adapter: &mut SessionAdapter<B>,
    handle: TrackHandle,
    track: &str,
    device: &str,
    parameters: &[(String, RemoteValue)],
) -> Result<Option<AttachedDevice>, EngineError> {
    let index = match adapter.create_device(handle, device) {
        Ok(Some(index)) => index,
        Ok(None) => return Ok(None),
        Err(source) => {
            error!(track, device, error = %source, "failed to add instrument");
            return Err(EngineError::Instrument {
                track: track.to_string(),
                instrument: device.to_string(),
                source,
            });
        }
    };

    let mut applied = 0;
    let mut skipped = 0;
    for (parameter, value) in parameters {
        match adapter.set_device_parameter(handle, index, parameter, value.clone()) {
            Ok(true) => applied += 1,
            Ok(false) => skipped += 1,
            Err(err) => {
                warn!(track, device, parameter = %parameter, error = %err, "failed to set device parameter");
                skipped += 1;
            }
        }
    }

    debug!(track, device, index, applied, skipped, "device attached");
    Ok(Some(AttachedDevice {
        track: track.to_string(),
        device: device.to_string(),
        index,
        parameters_applied: applied,
        parameters_skipped: skipped,
    }))
}

fn json_to_remote(value: &serde_json::Value) -> Option<RemoteValue> {
    match value {
        serde_json::Value::Bool(flag) => Some(RemoteValue::Bool(*flag)),
        serde_json::Value::Number(number) => number
            .as_i64()
            .map(RemoteValue::Int)
            .or_else(|| number.as_f64().map(RemoteValue::Float)),
        serde_json::Value::String(text) => Some(RemoteValue::Text(text.clone())),
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            None
        }
    }
}

/// Lists the devices of the declared track named exactly `name`.
/// `Ok(None)` when no declared track matches; engine-owned tracks and tracks
/// that were already in the session are never reported.
pub fn inspect_track_instruments<B: LiveBinding>(
    adapter: &mut SessionAdapter<B>,
    tracks: &ProvisionedTracks,
    name: &str,
) -> AdapterResult<Option<TrackInstruments>> {
    let Some(track) = tracks.find_declared(name) else {
        return Ok(None);
    };
    let mut devices = Vec::new();
    for device in adapter.devices(track.handle)? {
        devices.extend(adapter.device_name(device)?);
    }
    Ok(Some(TrackInstruments {
        handle: track.handle,
        name: track.name.clone(),
        devices,
    }))
}
