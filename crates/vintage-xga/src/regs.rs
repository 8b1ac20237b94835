//! Coprocessor register file.
//!
//! The register block sits at the top 2 KiB of the 8 KiB MMIO window and repeats every 128
//! bytes. Every access is decomposed into byte lanes, so a word or dword write is exactly the
//! sequence of its byte writes; the offsets that trigger work are handled by the caller.

use tracing::trace;

pub const REG_PIXMAP_INDEX: u32 = 0x12;
pub const REG_PIXMAP_BASE: u32 = 0x14;
pub const REG_PIXMAP_WIDTH: u32 = 0x18;
pub const REG_PIXMAP_HEIGHT: u32 = 0x1a;
pub const REG_PIXMAP_FORMAT: u32 = 0x1c;
pub const REG_BRES_ERR: u32 = 0x20;
pub const REG_BRES_K1: u32 = 0x24;
pub const REG_BRES_K2: u32 = 0x28;
pub const REG_SHORT_STROKE: u32 = 0x2c;
pub const REG_FRGD_MIX: u32 = 0x48;
pub const REG_BKGD_MIX: u32 = 0x49;
pub const REG_CC_COND: u32 = 0x4a;
pub const REG_COLOR_CMP: u32 = 0x4c;
pub const REG_PLANE_MASK: u32 = 0x50;
pub const REG_FRGD_COLOR: u32 = 0x58;
pub const REG_BKGD_COLOR: u32 = 0x5c;
pub const REG_OP_DIM1: u32 = 0x60;
pub const REG_OP_DIM2: u32 = 0x62;
pub const REG_MASK_ORIGIN: u32 = 0x6c;
pub const REG_SRC_XY: u32 = 0x70;
pub const REG_PAT_XY: u32 = 0x74;
pub const REG_DST_XY: u32 = 0x78;
pub const REG_COMMAND: u32 = 0x7c;

/// Bits per pixel of a pixel map, from format bits 0-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelDepth {
    Bpp1,
    Bpp2,
    Bpp4,
    Bpp8,
    Bpp16,
}

impl PixelDepth {
    pub fn from_format(format: u8) -> Option<Self> {
        match format & 7 {
            0 => Some(Self::Bpp1),
            1 => Some(Self::Bpp2),
            2 => Some(Self::Bpp4),
            3 => Some(Self::Bpp8),
            4 => Some(Self::Bpp16),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Bpp1 => 1,
            Self::Bpp2 => 2,
            Self::Bpp4 => 4,
            Self::Bpp8 => 8,
            Self::Bpp16 => 16,
        }
    }

    /// Mask covering one pixel value.
    pub fn value_mask(self) -> u32 {
        (1u32 << self.bits()) - 1
    }
}

/// A pixel map descriptor. Width and height hold the extent minus one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelMap {
    pub base: u32,
    pub width: u16,
    pub height: u16,
    pub format: u8,
}

impl PixelMap {
    pub fn depth(&self) -> Option<PixelDepth> {
        PixelDepth::from_format(self.format)
    }

    /// Format bit 3, the alternate pixel order select.
    pub fn order_bit(&self) -> bool {
        self.format & 0x08 != 0
    }

    /// Pixels per row.
    pub fn row_pixels(&self) -> u32 {
        u32::from(self.width) + 1
    }
}

/// Decoded fields of the pixel operation register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub raw: u32,
}

impl Command {
    pub fn octant(self) -> u8 {
        (self.raw & 7) as u8
    }

    pub fn draw_mode(self) -> DrawMode {
        match self.raw & 0x30 {
            0x10 => DrawMode::SkipFirst,
            0x20 => DrawMode::SkipLast,
            0x30 => DrawMode::Reserved,
            _ => DrawMode::All,
        }
    }

    pub fn mask_mode(self) -> u8 {
        (self.raw & 0xc0) as u8
    }

    pub fn pat_src(self) -> u8 {
        ((self.raw >> 12) & 0xf) as u8
    }

    pub fn dst_map(self) -> u8 {
        ((self.raw >> 16) & 0xf) as u8
    }

    pub fn src_map(self) -> u8 {
        ((self.raw >> 20) & 0xf) as u8
    }

    pub fn opcode(self) -> u8 {
        ((self.raw >> 24) & 0xf) as u8
    }

    pub fn fg_src(self) -> u8 {
        ((self.raw >> 28) & 3) as u8
    }

    pub fn bg_src(self) -> u8 {
        ((self.raw >> 30) & 3) as u8
    }
}

/// Which points of a line or stroke are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    All,
    SkipFirst,
    SkipLast,
    /// Mode 3 writes nothing.
    Reserved,
}

impl DrawMode {
    /// `index` counts plotted positions from zero; `remaining` is the count still to come.
    pub fn draws(self, index: u32, remaining: i32) -> bool {
        match self {
            Self::All => true,
            Self::SkipFirst => index != 0,
            Self::SkipLast => remaining != 0,
            Self::Reserved => false,
        }
    }
}

/// Sign-extends a 14-bit Bresenham term.
#[inline]
pub fn sext14(value: u16) -> i32 {
    (i32::from(value) << 18) >> 18
}

/// Sign-extends a 13-bit map coordinate. Bits 11 and 12 both select the negative range.
#[inline]
pub fn sext_coord(value: u16) -> i32 {
    let v = i32::from(value & 0x1fff);
    if v & 0x1800 != 0 {
        v | !0x17ff
    } else {
        v
    }
}

/// Destination wrap used by BitBLT: 13 bits, negative only when bits 11-12 are both set.
#[inline]
pub fn dst_wrap(value: i32) -> i32 {
    let v = value & 0x1fff;
    if v & 0x1800 == 0x1800 {
        i32::from((v | 0xf800) as u16 as i16)
    } else {
        v
    }
}

fn set_lane32(reg: &mut u32, lane: u32, value: u8) {
    let shift = (lane & 3) * 8;
    *reg = (*reg & !(0xff << shift)) | (u32::from(value) << shift);
}

fn set_lane16(reg: &mut u16, lane: u32, value: u8) {
    let shift = (lane & 1) * 8;
    *reg = (*reg & !(0xff << shift)) | (u16::from(value) << shift);
}

fn set_bres(reg: &mut u16, lane: u32, value: u8) {
    match lane {
        0 => *reg = (*reg & 0x3f00) | u16::from(value),
        1 => *reg = (*reg & 0x00ff) | (u16::from(value & 0x3f) << 8),
        _ => {}
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccelRegs {
    pub map_index: u8,
    pub maps: [PixelMap; 4],
    /// 14-bit raw Bresenham terms.
    pub bres_err: u16,
    pub bres_k1: u16,
    pub bres_k2: u16,
    pub short_stroke: u32,
    pub frgd_mix: u8,
    pub bkgd_mix: u8,
    pub cc_cond: u8,
    pub color_cmp: u32,
    pub plane_mask: u32,
    pub frgd_color: u32,
    pub bkgd_color: u32,
    pub op_dim1: u16,
    pub op_dim2: u16,
    pub mask_x: u16,
    pub mask_y: u16,
    pub src_x: u16,
    pub src_y: u16,
    pub pat_x: u16,
    pub pat_y: u16,
    pub dst_x: u16,
    pub dst_y: u16,
    pub command: u32,
}

impl AccelRegs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command(&self) -> Command {
        Command { raw: self.command }
    }

    /// Pixel map `index`, masked to the four maps.
    pub fn map(&self, index: u8) -> &PixelMap {
        &self.maps[usize::from(index & 3)]
    }

    pub fn write_byte(&mut self, offset: u32, value: u8) {
        let offset = offset & 0x7f;
        let map = usize::from(self.map_index);
        match offset {
            REG_PIXMAP_INDEX => self.map_index = value & 3,
            0x14..=0x17 => set_lane32(&mut self.maps[map].base, offset, value),
            0x18 | 0x19 => set_lane16(&mut self.maps[map].width, offset, value),
            0x1a | 0x1b => set_lane16(&mut self.maps[map].height, offset, value),
            REG_PIXMAP_FORMAT => self.maps[map].format = value,
            0x20..=0x23 => set_bres(&mut self.bres_err, offset - REG_BRES_ERR, value),
            0x24..=0x27 => set_bres(&mut self.bres_k1, offset - REG_BRES_K1, value),
            0x28..=0x2b => set_bres(&mut self.bres_k2, offset - REG_BRES_K2, value),
            0x2c..=0x2f => set_lane32(&mut self.short_stroke, offset, value),
            REG_FRGD_MIX => self.frgd_mix = value,
            REG_BKGD_MIX => self.bkgd_mix = value,
            REG_CC_COND => self.cc_cond = value & 7,
            0x4c..=0x4f => set_lane32(&mut self.color_cmp, offset, value),
            0x50..=0x53 => set_lane32(&mut self.plane_mask, offset, value),
            0x58..=0x5b => set_lane32(&mut self.frgd_color, offset, value),
            0x5c..=0x5f => set_lane32(&mut self.bkgd_color, offset, value),
            0x60 | 0x61 => set_lane16(&mut self.op_dim1, offset, value),
            0x62 | 0x63 => set_lane16(&mut self.op_dim2, offset, value),
            0x6c | 0x6d => set_lane16(&mut self.mask_x, offset, value),
            0x6e | 0x6f => set_lane16(&mut self.mask_y, offset, value),
            0x70 | 0x71 => set_lane16(&mut self.src_x, offset, value),
            0x72 | 0x73 => set_lane16(&mut self.src_y, offset, value),
            0x74 | 0x75 => set_lane16(&mut self.pat_x, offset, value),
            0x76 | 0x77 => set_lane16(&mut self.pat_y, offset, value),
            0x78 | 0x79 => set_lane16(&mut self.dst_x, offset, value),
            0x7a | 0x7b => set_lane16(&mut self.dst_y, offset, value),
            0x7c..=0x7f => set_lane32(&mut self.command, offset, value),
            _ => trace!(offset, value, "write to unimplemented coprocessor register"),
        }
    }

    /// Only the error term and the map coordinates read back; everything else reads zero.
    pub fn read_byte(&self, offset: u32) -> u8 {
        let offset = offset & 0x7f;
        let lane16 = |v: u16| v.to_le_bytes()[(offset & 1) as usize];
        match offset {
            0x20..=0x23 => (sext14(self.bres_err) as u32).to_le_bytes()[(offset & 3) as usize],
            0x70 | 0x71 => lane16(self.src_x),
            0x72 | 0x73 => lane16(self.src_y),
            0x74 | 0x75 => lane16(self.pat_x),
            0x76 | 0x77 => lane16(self.pat_y),
            0x78 | 0x79 => lane16(self.dst_x),
            0x7a | 0x7b => lane16(self.dst_y),
            _ => 0,
        }
    }

    pub(crate) fn set_dst(&mut self, x: i32, y: i32) {
        self.dst_x = x as u16;
        self.dst_y = y as u16;
    }
}
