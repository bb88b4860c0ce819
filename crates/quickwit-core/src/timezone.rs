//! IANA timezone lookup.

use chrono_tz::{TZ_VARIANTS, Tz};

/// Resolve a zone name, ignoring ASCII case (`europe/amsterdam` works).
pub fn lookup_timezone(name: &str) -> Option<Tz> {
    let name = name.trim();
    if let Ok(tz) = name.parse::<Tz>() {
        return Some(tz);
    }
    TZ_VARIANTS
        .iter()
        .copied()
        .find(|tz| tz.name().eq_ignore_ascii_case(name))
}
