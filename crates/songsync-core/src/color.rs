use tracing::warn;

pub const FALLBACK_COLOR: i64 = 0x0080_8080;

const NAMED_COLORS: &[(&str, i64)] = &[
    ("red", 0x00ff_0000),
    ("green", 0x0000_ff00),
    ("blue", 0x0000_00ff),
    ("white", 0x00ff_ffff),
    ("black", 0x0000_0000),
    ("yellow", 0x00ff_ff00),
    ("orange", 0x00ff_a500),
    ("purple", 0x0080_0080),
    ("cyan", 0x0000_ffff),
    ("magenta", 0x00ff_00ff),
    ("gray", 0x0080_8080),
    ("grey", 0x0080_8080),
    ("brown", 0x00a5_2a2a),
    ("pink", 0x00ff_c0cb),
    ("navy", 0x0000_0080),
    ("teal", 0x0000_8080),
    ("olive", 0x0080_8000),
];

/// Resolves a color name (case-insensitive) or a `#rrggbb` / `rrggbb` /
/// `0xrrggbb` literal.
#[must_use]
pub fn parse_color(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Some((_, rgb)) = NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
    {
        return Some(*rgb);
    }

    let digits = value
        .strip_prefix('#')
        .or_else(|| value.strip_prefix("0x"))
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        i64::from_str_radix(digits, 16).ok()
    } else {
        None
    }
}

/// Like [`parse_color`], but unknown values become gray.
#[must_use]
pub fn resolve_color(value: &str) -> i64 {
    parse_color(value).unwrap_or_else(|| {
        warn!(color = value, "unknown color; using gray");
        FALLBACK_COLOR
    })
}
