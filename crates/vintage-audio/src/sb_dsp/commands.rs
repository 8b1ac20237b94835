//! DSP command length table.
//!
//! Each entry is the number of data bytes a command consumes after the command byte. `-1` marks a
//! command that executes on the command byte itself, which is also how unknown commands are
//! swallowed. Entries of 3 cover the SB16 `0xBx`/`0xCx` format-plus-length commands.

/// Command 0x08 takes one data byte only on SB16 and later; this table holds the pre-SB16 value.
pub(crate) const COMMAND_DATA_LEN: [i8; 256] = [
    -1, 2, -1, 0, 1, 2, -1, 0, -1, -1, -1, -1, -1, -1, 2, 1, // 0x00
    1, -1, -1, -1, 2, -1, 2, 2, -1, -1, -1, -1, 0, -1, -1, 0, // 0x10
    0, -1, -1, -1, 2, -1, -1, -1, -1, -1, -1, -1, 0, -1, -1, -1, // 0x20
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // 0x30
    1, 2, 2, -1, -1, -1, -1, -1, 2, -1, -1, -1, -1, -1, -1, -1, // 0x40
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // 0x50
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // 0x60
    -1, -1, -1, -1, 2, 2, 2, 2, -1, -1, -1, -1, -1, 0, -1, 0, // 0x70
    2, 2, -1, -1, -1, -1, -1, -1, 2, 2, -1, -1, -1, -1, -1, -1, // 0x80
    0, -1, -1, -1, -1, -1, -1, -1, 0, -1, -1, -1, -1, -1, -1, -1, // 0x90
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // 0xa0
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, // 0xb0
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, // 0xc0
    0, 0, -1, 0, 0, 0, 0, -1, 0, 0, 0, -1, -1, -1, -1, -1, // 0xd0
    1, 0, 1, 0, 1, -1, -1, 0, 0, -1, -1, -1, -1, -1, -1, -1, // 0xe0
    -1, -1, 0, 0, -1, -1, -1, -1, -1, 1, 2, -1, -1, -1, -1, 0, // 0xf0
];

/// Data bytes `command` expects on a DSP of the given generation.
///
/// `None` means the command runs as soon as the command byte arrives.
pub fn data_len(command: u8, sb16_or_later: bool) -> Option<u8> {
    if command == 0x08 && sb16_or_later {
        return Some(1);
    }
    u8::try_from(COMMAND_DATA_LEN[usize::from(command)]).ok()
}

/// Replies pushed by command 0xE3 on SB16-class DSPs, followed by a NUL.
pub(crate) const COPYRIGHT: &[u8] = b"COPYRIGHT (C) CREATIVE TECHNOLOGY LTD, 1992.";

/// Protection-check (command 0xE2) adders, indexed by `[count & 3][bit]`, with bit 8 applied
/// unconditionally.
pub(crate) const E2_TABLE: [[i16; 9]; 4] = [
    [1, -2, -4, 8, -16, 32, 64, -128, -106],
    [-1, 2, -4, 8, 16, -32, 64, -128, 165],
    [-1, 2, 4, -8, 16, -32, -64, 128, -151],
    [1, -2, 4, -8, -16, 32, -64, 128, 90],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_dependent_entries() {
        assert_eq!(data_len(0x08, false), None);
        assert_eq!(data_len(0x08, true), Some(1));
        assert_eq!(data_len(0x40, false), Some(1));
        assert_eq!(data_len(0xb6, true), Some(3));
        assert_eq!(data_len(0xd1, false), Some(0));
        assert_eq!(data_len(0x11, true), None);
    }
}
