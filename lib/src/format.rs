//! Text helpers for fixed-width terminal output.
//!
//! All widths are counted in characters, not bytes.

const UNITS: [&str; 8] = ["B", "K", "M", "G", "T", "P", "E", "Z"];
const FS_CUTOFF: f64 = 900.0;
const FS_USIZE: f64 = 1024.0;
const FS_PLACES: usize = 5;

/// Ellipsis inserted by [`shorten`].
pub const ELLIPSIS: char = '…';

/// Pads `s` on the left with `fill` up to `width` characters.
pub fn left_pad(s: &str, width: usize, fill: char) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let mut out: String = std::iter::repeat(fill).take(width - len).collect();
    out.push_str(s);
    out
}

/// Pads `s` on the right with `fill` up to `width` characters.
pub fn right_pad(s: &str, width: usize, fill: char) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let mut out = s.to_string();
    out.extend(std::iter::repeat(fill).take(width - len));
    out
}

/// Formats a byte count (or a byte rate) with a binary unit suffix.
///
/// `1536.0` renders as `1.50K`, `0.0` as `   0B`. The sign is kept and the
/// result is left-padded to five characters.
pub fn filesize(size: f64) -> String {
    let neg = if size < 0.0 { "-" } else { "" };
    let mut size = size.abs();
    let mut unit = 0;
    while size > FS_CUTOFF && unit + 1 < UNITS.len() {
        size /= FS_USIZE;
        unit += 1;
    }
    let number = if unit == 0 {
        format!("{size:.0}")
    } else if size >= 100.0 {
        format!("{size:.1}")
    } else {
        format!("{size:.2}")
    };
    left_pad(&format!("{neg}{number}{}", UNITS[unit]), FS_PLACES, ' ')
}

/// Replaces the middle of `s` with an ellipsis so it is exactly `width`
/// characters long. Strings that already fit are returned unchanged.
///
/// # Panics
///
/// Panics if the computed string does not have `width` characters.
pub fn shorten(s: &str, width: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    if len <= width {
        return s.to_string();
    }
    match width {
        0 => return String::new(),
        1 => return ELLIPSIS.to_string(),
        _ => {}
    }
    // head keeps ceil((w-1)/2)-1 chars, tail the rest
    let half = width - 1;
    let head_len = half.div_ceil(2);
    let tail_len = if half % 2 == 1 { head_len } else { head_len + 1 };
    let mut out: String = chars[..head_len - 1].iter().collect();
    out.push(ELLIPSIS);
    out.extend(&chars[len - tail_len..]);
    let out_len = out.chars().count();
    assert_eq!(
        out_len, width,
        "shorten produced {out_len} chars for width {width} (head {head_len}, tail {tail_len}, input {len})"
    );
    out
}

/// Percentage of `current` over `total`, clamped into `0..=100`.
///
/// An empty total counts as complete.
pub fn progress_percent(current: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 100.0;
    }
    let percent = current * 100.0 / total;
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}
