//! The drawing coprocessor.
//!
//! Every operation runs to completion inside the register write that starts it. The engine
//! borrows the register file and VRAM for the duration of one operation.

mod bitblt;
mod line;
mod ssv;

use tracing::{debug, trace, warn};

use crate::pixmap::{read_pixel, write_pixel, PixelOrder};
use crate::regs::{AccelRegs, Command, PixelMap};
use crate::rop::{compare_passes, mix};
use crate::vram::Vram;

pub const OP_SSV_READ: u8 = 0x02;
pub const OP_LINE_READ: u8 = 0x03;
pub const OP_SSV_WRITE: u8 = 0x04;
pub const OP_LINE_WRITE: u8 = 0x05;
pub const OP_BITBLT: u8 = 0x08;
pub const OP_INVERTING_BITBLT: u8 = 0x09;
pub const OP_AREA_FILL: u8 = 0x0a;

/// `pat_src` value meaning "no pattern, foreground everywhere".
pub(crate) const PATTERN_FOREGROUND: u8 = 8;

/// Foreground or background source selector value naming the source map.
const SOURCE_FROM_MAP: u8 = 2;

pub(crate) struct Engine<'a> {
    pub regs: &'a mut AccelRegs,
    pub vram: &'a mut Vram,
    pub order: PixelOrder,
    /// Displayed width in pixels, used by the pattern heuristics.
    pub h_disp: u32,
}

impl Engine<'_> {
    /// Runs the operation held in the pixel operation register.
    pub fn execute(&mut self) {
        let cmd = self.regs.command();
        debug!(
            opcode = cmd.opcode(),
            octant = cmd.octant(),
            pat_src = cmd.pat_src(),
            dst_map = cmd.dst_map(),
            src_map = cmd.src_map(),
            "coprocessor command"
        );
        match cmd.opcode() {
            OP_SSV_READ | OP_LINE_READ => trace!(opcode = cmd.opcode(), "read-back operation ignored"),
            // Short strokes run from the short-stroke register itself.
            OP_SSV_WRITE => {}
            OP_LINE_WRITE => self.line_draw(),
            OP_BITBLT => self.bitblt(false),
            OP_INVERTING_BITBLT => self.bitblt(true),
            OP_AREA_FILL => self.area_fill(),
            op => warn!(op, "unsupported coprocessor operation"),
        }
    }

    fn cmd(&self) -> Command {
        self.regs.command()
    }

    fn dst_map(&self) -> PixelMap {
        *self.regs.map(self.cmd().dst_map())
    }

    fn src_map(&self) -> PixelMap {
        *self.regs.map(self.cmd().src_map())
    }

    /// Mask map boundary test against map 0 placed at the mask origin.
    fn inside_mask(&self, x: i32, y: i32) -> bool {
        if self.cmd().mask_mode() == 0 {
            return true;
        }
        let mask = self.regs.map(0);
        let ox = i32::from(self.regs.mask_x);
        let oy = i32::from(self.regs.mask_y);
        x >= ox
            && x <= i32::from(mask.width & 0xfff) + ox
            && y >= oy
            && y <= i32::from(mask.height & 0xfff) + oy
    }

    /// Source pixel for the foreground (`fg`) or background path.
    fn source(&self, fg: bool, sx: i32, sy: i32) -> u32 {
        let cmd = self.cmd();
        let (select, fixed) = if fg {
            (cmd.fg_src(), self.regs.frgd_color)
        } else {
            (cmd.bg_src(), self.regs.bkgd_color)
        };
        if select == SOURCE_FROM_MAP {
            read_pixel(self.vram, &self.src_map(), sx, sy, self.order)
        } else {
            fixed
        }
    }

    /// Colour compare, mix and plane mask for one destination pixel. Returns the value to
    /// store, or `None` when the compare gate rejects the pixel.
    fn blend(&self, x: i32, y: i32, src: u32, fg: bool, invert_dest: bool) -> Option<u32> {
        let old = read_pixel(self.vram, &self.dst_map(), x, y, self.order);
        if !compare_passes(self.regs.cc_cond, old, self.regs.color_cmp) {
            return None;
        }
        let code = if fg { self.regs.frgd_mix } else { self.regs.bkgd_mix };
        let d = if invert_dest { !old } else { old };
        let new = mix(code, src, d);
        let pm = self.regs.plane_mask;
        Some((new & pm) | (old & !pm))
    }

    fn store(&mut self, x: i32, y: i32, value: u32) {
        let map = self.dst_map();
        write_pixel(self.vram, &map, x, y, value, self.order);
    }

    /// The full write pipeline for one pixel, used by the BitBLT family.
    fn draw(&mut self, x: i32, y: i32, src: u32, fg: bool, invert_dest: bool) {
        if !self.inside_mask(x, y) {
            return;
        }
        if let Some(value) = self.blend(x, y, src, fg, invert_dest) {
            self.store(x, y, value);
        }
    }
}
