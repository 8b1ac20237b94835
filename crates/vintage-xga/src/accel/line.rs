use crate::regs::{sext14, sext_coord};

use super::{Engine, PATTERN_FOREGROUND};

impl Engine<'_> {
    /// Bresenham line from the destination coordinate, `op_dim1 + 1` points long.
    ///
    /// Octant bit 0 makes y the major axis, bit 1 steps y negative and bit 2 steps x negative.
    pub(super) fn line_draw(&mut self) {
        let cmd = self.cmd();
        let octant = cmd.octant();

        let dminor = sext14(self.regs.bres_k1) >> 1;
        let dmajor = -(sext14(self.regs.bres_k2) - (dminor << 1)) >> 1;
        let mut err = sext14(self.regs.bres_err);

        let mut xdir = if octant & 0x04 != 0 { -1 } else { 1 };
        let mut ydir = if octant & 0x02 != 0 { -1 } else { 1 };

        // `major` and `minor` hold x and y until the octant swaps them.
        let mut major = sext_coord(self.regs.dst_x);
        let mut minor = sext_coord(self.regs.dst_y);
        let y_major = octant & 0x01 != 0;
        if y_major {
            std::mem::swap(&mut major, &mut minor);
            std::mem::swap(&mut xdir, &mut ydir);
        }
        let to_xy = |major: i32, minor: i32| if y_major { (minor, major) } else { (major, minor) };

        if cmd.pat_src() == PATTERN_FOREGROUND {
            let draw_mode = cmd.draw_mode();
            let sx = i32::from(self.regs.src_x & 0xfff);
            let sy = i32::from(self.regs.src_y & 0xfff);
            let mut remaining = i32::from(self.regs.op_dim1);
            let mut index = 0u32;
            while remaining >= 0 {
                let (x, y) = to_xy(major, minor);
                if self.inside_mask(x, y) {
                    let src = self.source(true, sx, sy);
                    if let Some(value) = self.blend(x, y, src, true, false) {
                        if draw_mode.draws(index, remaining) {
                            self.store(x, y, value);
                        }
                    }
                }

                if remaining == 0 {
                    break;
                }
                while err > 0 {
                    minor += ydir;
                    // A non-positive major delta takes a single minor step.
                    err = if dmajor > 0 { err - (dmajor << 1) } else { 0 };
                }
                major += xdir;
                err += dminor << 1;
                index += 1;
                remaining -= 1;
            }
        }

        let (x, y) = to_xy(major, minor);
        self.regs.set_dst(x, y);
    }
}
