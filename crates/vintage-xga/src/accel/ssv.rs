use crate::regs::{sext_coord, DrawMode};

use super::{Engine, PATTERN_FOREGROUND};

/// Step per direction code, y growing downwards.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

const SSV_DRAW: u8 = 0x10;

impl Engine<'_> {
    /// Runs the four vectors of the short-stroke register, low byte first.
    pub fn short_strokes(&mut self) {
        for vector in self.regs.short_stroke.to_le_bytes() {
            self.short_stroke(vector);
        }
    }

    /// One vector: bits 0-3 length, bit 4 draw, bits 5-7 direction.
    fn short_stroke(&mut self, ssv: u8) {
        let cmd = self.cmd();
        let mut x = sext_coord(self.regs.dst_x);
        let mut y = sext_coord(self.regs.dst_y);
        let (dirx, diry) = DIRECTIONS[usize::from(ssv >> 5)];

        if cmd.pat_src() == PATTERN_FOREGROUND {
            let draw_mode = if ssv & SSV_DRAW != 0 {
                cmd.draw_mode()
            } else {
                DrawMode::Reserved
            };
            let sx = i32::from(self.regs.src_x & 0xfff);
            let sy = i32::from(self.regs.src_y & 0xfff);
            let mut remaining = i32::from(ssv & 0x0f);
            let mut index = 0u32;
            loop {
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
                x += dirx;
                y += diry;
                index += 1;
                remaining -= 1;
            }
        }

        self.regs.set_dst(x, y);
    }
}
