//! Flat-text configuration language: `{name: key = value key2=value2}`
//! brace-delimited subsystem sections containing whitespace-separated
//! `key = value` tokens. Token lookup skips over nested `{...}` blocks
//! so a subsystem section can embed another section's braces without
//! its keys leaking into an outer lookup.

/// Finds the first top-level section named `name` (`{name: ...}`) in
/// `cfg` and returns its inner contents (the text between the matching
/// braces, after the `name:` prefix). Returns `None` if absent.
pub fn locate_section<'a>(cfg: &'a str, name: &str) -> Option<&'a str> {
    let mut search_from = 0usize;
    while let Some(rel) = cfg[search_from..].find('{') {
        let open = search_from + rel;
        let after_brace = open + 1;
        let header_end = cfg[after_brace..]
            .find(|c: char| c == ':' || c == '}')
            .map(|i| after_brace + i);
        let Some(header_end) = header_end else {
            return None;
        };
        if cfg.as_bytes().get(header_end) == Some(&b':')
            && cfg[after_brace..header_end].trim() == name
        {
            let body_start = header_end + 1;
            let close = matching_brace(cfg, open)?;
            return Some(&cfg[body_start..close]);
        }
        search_from = open + 1;
    }
    None
}

/// Returns the index of the `}` matching the `{` at `open`, counting
/// nested braces.
fn matching_brace(cfg: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in cfg.char_indices().skip(open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Looks up `key = value` inside `section`, skipping over any nested
/// `{...}` blocks, and returns the raw value token (whitespace-trimmed,
/// up to the next whitespace or section boundary).
pub fn locate_token<'a>(section: &'a str, key: &str) -> Option<&'a str> {
    locate_token_delim(section, key, b'=')
}

/// Detects whether `key` occurs at the top level of `section` (outside
/// any nested `{...}` block), without requiring a delimiter after it —
/// this is how boolean config flags (`u_zero`, `g_const`, `yaw_zero`, …)
/// are recognized: presence alone, no `=value`.
pub fn has_flag(section: &str, key: &str) -> bool {
    locate_token_delim(section, key, 0).is_some()
}

/// Token lookup with an explicit delimiter byte that must immediately
/// follow the token (after whitespace). Passing `0` means "just detect
/// presence" — the token is found and an empty string is returned,
/// rather than requiring a `delim` character and a value after it.
pub fn locate_token_delim<'a>(section: &'a str, key: &str, delim: u8) -> Option<&'a str> {
    let bytes = section.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            i = matching_brace(section, i).map(|c| c + 1).unwrap_or(bytes.len());
            continue;
        }
        if section[i..].starts_with(key) {
            let after_key = i + key.len();
            let boundary_before_ok = section[..i]
                .chars()
                .next_back()
                .map(|c| !c.is_alphanumeric() && c != '_')
                .unwrap_or(true);
            let boundary_after_ok = section[after_key..]
                .chars()
                .next()
                .map(|c| !c.is_alphanumeric() && c != '_')
                .unwrap_or(true);
            if boundary_before_ok && boundary_after_ok {
                if delim == 0 {
                    return Some(&section[after_key..after_key]);
                }
                let rest = section[after_key..].trim_start();
                if rest.starts_with(delim as char) {
                    let consumed = section[after_key..].len() - rest.len() + 1;
                    let value_start = after_key + consumed;
                    let value = section[value_start..].trim_start();
                    let end = value
                        .find(|c: char| c.is_whitespace() || c == '}')
                        .unwrap_or(value.len());
                    return Some(value[..end].trim());
                }
            }
        }
        i += 1;
    }
    None
}

/// Parses a numeric token with an optional valid range, falling back to
/// `default` when the token is absent, unparseable, or out of range —
/// matching the original's `fsnav_ins_motion_parse_double` convention.
pub fn read_parameter(section: &str, key: &str, default: f64, range: Option<(f64, f64)>) -> f64 {
    match locate_token(section, key).and_then(|v| v.parse::<f64>().ok()) {
        Some(v) => match range {
            Some((lo, hi)) if v < lo || v > hi => default,
            _ => v,
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_section_finds_named_block() {
        let cfg = "{alpha: x=1}{beta: y=2 z=3}";
        assert_eq!(locate_section(cfg, "beta").unwrap().trim(), "y=2 z=3");
    }

    #[test]
    fn locate_token_skips_nested_braces() {
        let section = "freq = 100 {inner: freq = 999} step_limit=50";
        assert_eq!(locate_token(section, "freq"), Some("100"));
        assert_eq!(locate_token(section, "step_limit"), Some("50"));
    }

    #[test]
    fn has_flag_detects_presence_without_a_delimiter() {
        let settings = "sensors_in=a.csv u_zero e2_zero time_limit=10";
        assert!(has_flag(settings, "u_zero"));
        assert!(has_flag(settings, "e2_zero"));
        assert!(!has_flag(settings, "g_const"));
    }

    #[test]
    fn has_flag_ignores_occurrences_inside_nested_sections() {
        let settings = "{imu: u_zero} time_limit=10";
        assert!(!has_flag(settings, "u_zero"));
    }

    #[test]
    fn has_flag_does_not_match_a_longer_identifier() {
        let settings = "e2_zero_strict = 1";
        assert!(!has_flag(settings, "e2_zero"));
    }

    #[test]
    fn read_parameter_falls_back_out_of_range() {
        let section = "freq = 9000";
        let v = read_parameter(section, "freq", 100.0, Some((50.0, 3200.0)));
        assert_eq!(v, 100.0);
    }

    #[test]
    fn read_parameter_uses_default_when_absent() {
        let section = "other = 1";
        let v = read_parameter(section, "freq", 100.0, None);
        assert_eq!(v, 100.0);
    }
}
