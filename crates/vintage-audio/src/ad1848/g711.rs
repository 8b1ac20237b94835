//! G.711 companded sample expansion.

pub fn mulaw_to_linear(byte: u8) -> i16 {
    let byte = !byte;
    let mut t = ((i32::from(byte) & 0x0f) << 3) + 0x84;
    t <<= (byte & 0x70) >> 4;
    let t = if byte & 0x80 != 0 { 0x84 - t } else { t - 0x84 };
    t.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

pub fn alaw_to_linear(byte: u8) -> i16 {
    let byte = byte ^ 0x55;
    let mut t = (i32::from(byte) & 0x0f) << 4;
    match (byte & 0x70) >> 4 {
        0 => t |= 0x8,
        1 => t |= 0x108,
        seg => {
            t |= 0x108;
            t <<= seg - 1;
        }
    }
    (if byte & 0x80 != 0 { t } else { -t }) as i16
}
