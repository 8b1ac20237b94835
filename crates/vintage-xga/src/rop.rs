//! Mix (raster operation) and colour-compare logic.

/// Applies mix `code` (low five bits) to source `s` and destination `d`.
///
/// Codes 0x00-0x0f are the sixteen boolean functions, 0x10-0x15 the arithmetic mixes. The
/// remaining codes leave the destination untouched.
pub fn mix(code: u8, s: u32, d: u32) -> u32 {
    match code & 0x1f {
        0x00 => 0,
        0x01 => s & d,
        0x02 => s & !d,
        0x03 => s,
        0x04 => !s & d,
        0x05 => d,
        0x06 => s ^ d,
        0x07 => s | d,
        0x08 => !s & !d,
        0x09 => s ^ !d,
        0x0a => !d,
        0x0b => s | !d,
        0x0c => !s,
        0x0d => !s | d,
        0x0e => !s | !d,
        0x0f => !0,
        0x10 => s.max(d),
        0x11 => s.min(d),
        0x12 => s.saturating_add(d).min(0xff),
        0x13 => d.saturating_sub(s),
        0x14 => s.saturating_sub(d),
        0x15 => ((u64::from(s) + u64::from(d)) >> 1) as u32,
        _ => d,
    }
}

/// Colour-compare gate: whether a destination pixel may be written.
pub fn compare_passes(cond: u8, dest: u32, cmp: u32) -> bool {
    match cond & 7 {
        1 => dest > cmp,
        2 => dest == cmp,
        3 => dest < cmp,
        4 => true,
        5 => dest >= cmp,
        6 => dest != cmp,
        7 => dest <= cmp,
        _ => false,
    }
}
