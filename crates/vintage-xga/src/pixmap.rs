//! Pixel addressing inside pixel maps.

use crate::regs::{PixelDepth, PixelMap};
use crate::vram::Vram;

/// Host-side state that changes how packed pixels are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelOrder {
    /// Memory access mode register (extended register +9).
    pub access_mode: u8,
    /// Latched by the aperture logic when the host maps VRAM big-endian.
    pub linear_endian_reverse: bool,
}

impl PixelOrder {
    /// Sub-byte pixels of `map` are packed starting at bit 0.
    fn lsb_first(self, map: &PixelMap) -> bool {
        map.order_bit() && self.access_mode & 0x08 == 0 && !self.linear_endian_reverse
    }

    fn swap_words(self, map: &PixelMap) -> bool {
        map.order_bit() && !self.linear_endian_reverse
    }
}

/// Byte address and bit shift of a sub-byte pixel.
fn packed_location(map: &PixelMap, bits: u32, x: i32, y: i32, order: PixelOrder) -> (u32, u32) {
    let row_bytes = i64::from(map.row_pixels() * bits / 8);
    let bit_offset = i64::from(x) * i64::from(bits);
    let addr = i64::from(map.base) + i64::from(y) * row_bytes + bit_offset.div_euclid(8);
    let within = bit_offset.rem_euclid(8) as u32;
    let shift = if order.lsb_first(map) {
        within
    } else {
        8 - bits - within
    };
    (addr as u32, shift)
}

fn whole_location(map: &PixelMap, bytes: u32, x: i32, y: i32) -> u32 {
    let row_bytes = i64::from(map.row_pixels() * bytes);
    let addr = i64::from(map.base) + i64::from(y) * row_bytes + i64::from(x) * i64::from(bytes);
    addr as u32
}

pub fn read_pixel(vram: &Vram, map: &PixelMap, x: i32, y: i32, order: PixelOrder) -> u32 {
    let Some(depth) = map.depth() else {
        return 0;
    };
    match depth {
        PixelDepth::Bpp8 => u32::from(vram.read(whole_location(map, 1, x, y))),
        PixelDepth::Bpp16 => {
            let addr = whole_location(map, 2, x, y);
            let value = vram.read_u16_le(addr);
            u32::from(if order.swap_words(map) {
                value.swap_bytes()
            } else {
                value
            })
        }
        packed => {
            let bits = packed.bits();
            let (addr, shift) = packed_location(map, bits, x, y, order);
            (u32::from(vram.read(addr)) >> shift) & packed.value_mask()
        }
    }
}

pub fn write_pixel(vram: &mut Vram, map: &PixelMap, x: i32, y: i32, value: u32, order: PixelOrder) {
    let Some(depth) = map.depth() else {
        return;
    };
    match depth {
        PixelDepth::Bpp8 => vram.write(whole_location(map, 1, x, y), value as u8),
        PixelDepth::Bpp16 => {
            let addr = whole_location(map, 2, x, y);
            let value = value as u16;
            let value = if order.swap_words(map) {
                value.swap_bytes()
            } else {
                value
            };
            vram.write_u16_le(addr, value);
        }
        packed => {
            let bits = packed.bits();
            let (addr, shift) = packed_location(map, bits, x, y, order);
            let mask = (packed.value_mask() << shift) as u8;
            let old = vram.read(addr);
            let new = (old & !mask) | (((value << shift) as u8) & mask);
            vram.write(addr, new);
        }
    }
}

/// Reads `map` as a 1 bpp bitmap whatever its format says. Pattern and mask maps are read
/// this way.
pub fn read_mono(vram: &Vram, map: &PixelMap, x: i32, y: i32, order: PixelOrder) -> bool {
    let (addr, shift) = packed_location(map, 1, x, y, order);
    (vram.read(addr) >> shift) & 1 != 0
}
