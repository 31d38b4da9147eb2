use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    adapter::{Member, SessionAdapter, members},
    session::{LiveBinding, ObjectRef, RemoteValue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for Meter {
    fn default() -> Self {
        Self::COMMON
    }
}

impl Meter {
    pub const COMMON: Self = Self {
        numerator: 4,
        denominator: 4,
    };

    #[must_use]
    pub fn beats_per_bar(self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        f64::from(self.numerator) * 4.0 / f64::from(self.denominator)
    }

    #[must_use]
    pub fn bar_to_beats(self, bars: u32) -> f64 {
        f64::from(bars) * self.beats_per_bar()
    }
}

/// Reads the session's meter on every query; nothing is cached because the
/// signature may change between phases of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeterModel;

impl MeterModel {
    pub fn read<B: LiveBinding>(adapter: &mut SessionAdapter<B>) -> Meter {
        let numerator = read_component(adapter, members::SIGNATURE_NUMERATOR);
        let denominator = read_component(adapter, members::SIGNATURE_DENOMINATOR);

        match (numerator, denominator) {
            (Some(numerator), Some(denominator)) => Meter {
                numerator,
                denominator,
            },
            _ => {
                warn!(
                    ?numerator,
                    ?denominator,
                    "session time signature unreadable; assuming 4/4"
                );
                Meter::COMMON
            }
        }
    }

    /// Beats elapsed after `bars` whole bars. Callers subtract one bar to
    /// address the start of bar N.
    pub fn bar_to_beats<B: LiveBinding>(adapter: &mut SessionAdapter<B>, bars: u32) -> f64 {
        Self::read(adapter).bar_to_beats(bars)
    }
}

fn read_component<B: LiveBinding>(
    adapter: &mut SessionAdapter<B>,
    member: Member,
) -> Option<u32> {
    let value = match adapter.get(ObjectRef::SONG, member) {
        Ok(Some(value)) => value,
        Ok(None) => return None,
        Err(err) => {
            warn!(member = member.generic, error = %err, "failed to read time signature");
            return None;
        }
    };
    positive_integer(&value)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn positive_integer(value: &RemoteValue) -> Option<u32> {
    let number = value.as_f64()?;
    if number.is_finite() && number >= 1.0 && number <= f64::from(u32::MAX) && number.fract() == 0.0
    {
        Some(number as u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_time_bar_two_is_eight_beats() {
        assert_eq!(Meter::COMMON.bar_to_beats(2), 8.0);
    }

    #[test]
    fn three_four_bar_two_is_six_beats() {
        let meter = Meter {
            numerator: 3,
            denominator: 4,
        };
        assert_eq!(meter.bar_to_beats(2), 6.0);
    }

    #[test]
    fn six_eight_bar_one_is_three_beats() {
        let meter = Meter {
            numerator: 6,
            denominator: 8,
        };
        assert_eq!(meter.bar_to_beats(1), 3.0);
    }

    #[test]
    fn positive_integer_rejects_junk() {
        assert_eq!(positive_integer(&RemoteValue::Int(7)), Some(7));
        assert_eq!(positive_integer(&RemoteValue::Text("3".into())), Some(3));
        assert_eq!(positive_integer(&RemoteValue::Int(0)), None);
        assert_eq!(positive_integer(&RemoteValue::Float(2.5)), None);
        assert_eq!(positive_integer(&RemoteValue::Null), None);
    }
}
