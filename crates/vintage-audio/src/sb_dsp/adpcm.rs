//! Creative ADPCM decoders (4-bit, 2.6-bit and 2-bit).
//!
//! All three share one scheme: a code from the current byte plus the running step selects an
//! entry of a scale table (added to the 8-bit reference) and of an adjust table (added to the step,
//! modulo 256).

use serde::{Deserialize, Serialize};

const SCALE_4: [i8; 64] = [
    0, 1, 2, 3, 4, 5, 6, 7, 0, -1, -2, -3, -4, -5, -6, -7, //
    1, 3, 5, 7, 9, 11, 13, 15, -1, -3, -5, -7, -9, -11, -13, -15, //
    2, 6, 10, 14, 18, 22, 26, 30, -2, -6, -10, -14, -18, -22, -26, -30, //
    4, 12, 20, 28, 36, 44, 52, 60, -4, -12, -20, -28, -36, -44, -52, -60,
];

const ADJUST_4: [u8; 64] = [
    0, 0, 0, 0, 0, 16, 16, 16, //
    0, 0, 0, 0, 0, 16, 16, 16, //
    240, 0, 0, 0, 0, 16, 16, 16, //
    240, 0, 0, 0, 0, 16, 16, 16, //
    240, 0, 0, 0, 0, 16, 16, 16, //
    240, 0, 0, 0, 0, 16, 16, 16, //
    240, 0, 0, 0, 0, 0, 0, 0, //
    240, 0, 0, 0, 0, 0, 0, 0,
];

const SCALE_26: [i8; 40] = [
    0, 1, 2, 3, 0, -1, -2, -3, //
    1, 3, 5, 7, -1, -3, -5, -7, //
    2, 6, 10, 14, -2, -6, -10, -14, //
    4, 12, 20, 28, -4, -12, -20, -28, //
    5, 15, 25, 35, -5, -15, -25, -35,
];

const ADJUST_26: [u8; 40] = [
    0, 0, 0, 8, 0, 0, 0, 8, //
    248, 0, 0, 8, 248, 0, 0, 8, //
    248, 0, 0, 8, 248, 0, 0, 8, //
    248, 0, 0, 8, 248, 0, 0, 8, //
    248, 0, 0, 0, 248, 0, 0, 0,
];

const SCALE_2: [i8; 24] = [
    0, 1, 0, -1, 1, 3, -1, -3, //
    2, 6, -2, -6, 4, 12, -4, -12, //
    8, 24, -8, -24, 6, 48, -16, -48,
];

const ADJUST_2: [u8; 24] = [
    0, 4, 0, 4, //
    252, 4, 252, 4, 252, 4, 252, 4, //
    252, 4, 252, 4, 252, 4, 252, 4, //
    252, 0, 252, 0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdpcmKind {
    Bits4,
    Bits26,
    Bits2,
}

impl AdpcmKind {
    pub const fn samples_per_byte(self) -> u8 {
        match self {
            AdpcmKind::Bits4 => 2,
            AdpcmKind::Bits26 => 3,
            AdpcmKind::Bits2 => 4,
        }
    }

    fn tables(self) -> (&'static [i8], &'static [u8]) {
        match self {
            AdpcmKind::Bits4 => (&SCALE_4, &ADJUST_4),
            AdpcmKind::Bits26 => (&SCALE_26, &ADJUST_26),
            AdpcmKind::Bits2 => (&SCALE_2, &ADJUST_2),
        }
    }

    fn code(self, byte: u8, pos: u8) -> u8 {
        match self {
            AdpcmKind::Bits4 if pos == 0 => byte >> 4,
            AdpcmKind::Bits4 => byte & 0x0f,
            AdpcmKind::Bits26 => match pos {
                0 => byte >> 5,
                1 => (byte >> 2) & 7,
                _ => (byte << 1) & 7,
            },
            AdpcmKind::Bits2 => (byte >> ((3 - pos.min(3)) * 2)) & 3,
        }
    }
}

/// Decoder state carried across DSP output ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdpcmDecoder {
    kind: AdpcmKind,
    reference: u8,
    step: u8,
    pos: u8,
    byte: u8,
}

impl AdpcmDecoder {
    pub fn new(kind: AdpcmKind) -> Self {
        Self {
            kind,
            reference: 0,
            step: 0,
            pos: 0,
            byte: 0,
        }
    }

    pub fn kind(&self) -> AdpcmKind {
        self.kind
    }

    /// Switches the code width for a new transfer. Reference and step carry over unless
    /// [`set_reference`](Self::set_reference) is called.
    pub fn restart(&mut self, kind: AdpcmKind) {
        self.kind = kind;
        self.pos = 0;
    }

    /// Loads an explicit reference byte and clears the step.
    pub fn set_reference(&mut self, reference: u8) {
        self.reference = reference;
        self.step = 0;
    }

    pub fn reference(&self) -> u8 {
        self.reference
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    /// Loads the next encoded byte and rewinds to its first code.
    pub fn load(&mut self, byte: u8) {
        self.byte = byte;
        self.pos = 0;
    }

    /// True once every code of the current byte has been consumed.
    pub fn needs_byte(&self) -> bool {
        self.pos >= self.kind.samples_per_byte()
    }

    /// Decodes the next code of the current byte into a signed 16-bit sample.
    pub fn decode_next(&mut self) -> i16 {
        let (scale, adjust) = self.kind.tables();
        let code = i32::from(self.kind.code(self.byte, self.pos));
        let idx = (code + i32::from(self.step)).clamp(0, scale.len() as i32 - 1) as usize;

        let reference = (i32::from(self.reference) + i32::from(scale[idx])).clamp(0, 0xff);
        self.reference = reference as u8;
        self.step = self.step.wrapping_add(adjust[idx]);
        self.pos += 1;

        (u16::from(self.reference ^ 0x80) << 8) as i16
    }
}
