use proptest::prelude::*;
use songsync_core::{
    Dialect, MemorySession, Meter, MeterModel, RemoteValue, SessionAdapter,
};

fn adapter() -> SessionAdapter<MemorySession> {
    SessionAdapter::new(MemorySession::new(Dialect::Hybrid))
}

#[test]
fn default_session_is_common_time() {
    let mut adapter = adapter();
    assert_eq!(MeterModel::read(&mut adapter), Meter::COMMON);
    assert_eq!(MeterModel::bar_to_beats(&mut adapter, 2), 8.0);
}

#[test]
fn meter_is_reread_after_signature_change() {
    let mut adapter = adapter();
    assert_eq!(MeterModel::bar_to_beats(&mut adapter, 2), 8.0);

    adapter
        .set_time_signature(3, 4)
        .expect("signature should be applied");
    assert_eq!(MeterModel::bar_to_beats(&mut adapter, 2), 6.0);

    adapter
        .set_time_signature(6, 8)
        .expect("signature should be applied");
    assert_eq!(MeterModel::bar_to_beats(&mut adapter, 1), 3.0);
}

#[test]
fn unreadable_signature_falls_back_to_common_time() {
    let mut adapter = adapter();
    adapter
        .binding_mut()
        .set_raw_signature(RemoteValue::Text("three".to_string()), RemoteValue::Int(4));
    assert_eq!(MeterModel::read(&mut adapter), Meter::COMMON);

    adapter
        .binding_mut()
        .set_raw_signature(RemoteValue::Int(3), RemoteValue::Int(0));
    assert_eq!(MeterModel::bar_to_beats(&mut adapter, 2), 8.0);
}

#[test]
fn absent_signature_capability_falls_back_to_common_time() {
    let mut session = MemorySession::new(Dialect::Generic);
    session.set_raw_signature(RemoteValue::Int(7), RemoteValue::Int(8));
    session.hide_member("signature_numerator");
    let mut adapter = SessionAdapter::new(session);

    assert_eq!(MeterModel::read(&mut adapter), Meter::COMMON);
    assert!(adapter.stats().soft_absences >= 1);
}

#[test]
fn rejected_signature_read_falls_back_to_common_time() {
    let mut session = MemorySession::new(Dialect::Hybrid);
    session.reject_member("signature_denominator", "transport busy");
    let mut adapter = SessionAdapter::new(session);

    assert_eq!(MeterModel::bar_to_beats(&mut adapter, 3), 12.0);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn bar_to_beats_follows_session_meter(
        numerator in 1u32..=16,
        denominator in prop::sample::select(vec![1u32, 2, 4, 8, 16]),
        bars in 0u32..512,
    ) {
        let mut adapter = adapter();
        adapter
            .set_time_signature(numerator, denominator)
            .expect("signature should be applied");

        let beats = MeterModel::bar_to_beats(&mut adapter, bars);
        let expected = f64::from(bars) * f64::from(numerator) * 4.0 / f64::from(denominator);
        prop_assert!((beats - expected).abs() < 1e-9);
    }
}
