use tracing::trace;

use crate::pixmap::read_mono;
use crate::regs::dst_wrap;

use super::{Engine, PATTERN_FOREGROUND};

/// Steps `coord` by `dir` inside the power-of-two tile selected by `extent`.
#[inline]
fn tile_step(coord: i32, dir: i32, extent: i32) -> i32 {
    ((coord + dir) & extent) | (coord & !extent)
}

/// Per-operation iteration state shared by the BitBLT variants.
struct Blt {
    xdir: i32,
    ydir: i32,
    width: i32,
    x: i32,
    y: i32,
    sx: i32,
    sy: i32,
    px: i32,
    py: i32,
    dx: i32,
    dy: i32,
}

impl Engine<'_> {
    fn blt_start(&self) -> Blt {
        let octant = self.cmd().octant();
        let regs = &self.regs;
        let width = i32::from(regs.op_dim1 & 0xfff);
        Blt {
            xdir: if octant & 0x04 != 0 { -1 } else { 1 },
            ydir: if octant & 0x02 != 0 { -1 } else { 1 },
            width,
            x: width,
            y: i32::from(regs.op_dim2 & 0xfff),
            sx: i32::from(regs.src_x & 0xfff),
            sy: i32::from(regs.src_y & 0xfff),
            px: i32::from(regs.pat_x & 0xfff),
            py: i32::from(regs.pat_y & 0xfff),
            dx: dst_wrap(i32::from(regs.dst_x)),
            dy: dst_wrap(i32::from(regs.dst_y)),
        }
    }

    /// Whether a mapped display width equals the visible width. Guests program widths
    /// minus one.
    fn spans_display(&self, width: u16) -> bool {
        i64::from(width) == i64::from(self.h_disp) - 1
    }

    /// Source tiling for foreground-only BitBLTs.
    fn source_tiles(&self) -> bool {
        let cmd = self.cmd();
        let src = self.src_map();
        let dst = self.dst_map();
        if src.height == 7 {
            return true;
        }
        self.spans_display(dst.width)
            && src.width == 1
            && cmd.dst_map() == 1
            && cmd.src_map() == 2
            && self.order.linear_endian_reverse
            && dst.format >= 0x0b
            && src.format >= 0x0b
    }

    /// Pattern tiling for pattern-mixed BitBLTs.
    fn pattern_tiles(&self, blt: &Blt) -> bool {
        let cmd = self.cmd();
        let pat = *self.regs.map(cmd.pat_src());
        if pat.height == 7 {
            return true;
        }
        let dst = self.dst_map();
        let src = self.src_map();
        if !self.spans_display(dst.width) {
            return false;
        }
        let common = cmd.dst_map() == 1
            && cmd.pat_src() == 2
            && self.order.linear_endian_reverse
            && dst.format >= 0x0b
            && blt.px <= 7
            && blt.py <= 3;
        if self.spans_display(src.width) {
            common && cmd.src_map() == 1
        } else {
            common && cmd.src_map() == 0 && !(pat.width >= 7 && cmd.mask_mode() == 0x40)
        }
    }

    /// `(width + 1) x (height + 1)` rectangle copy or pattern fill. With `invert_dest` the
    /// mix sees the complemented destination.
    pub(super) fn bitblt(&mut self, invert_dest: bool) {
        let pat_src = self.cmd().pat_src();
        let mut blt = self.blt_start();

        if pat_src == PATTERN_FOREGROUND {
            let tiles = self.source_tiles();
            let src = self.src_map();
            let (src_w, src_h) = (i32::from(src.width), i32::from(src.height));
            loop {
                let value = self.source(true, blt.sx, blt.sy);
                self.draw(blt.dx, blt.dy, value, true, invert_dest);

                blt.sx = if tiles {
                    tile_step(blt.sx, blt.xdir, src_w)
                } else {
                    blt.sx + blt.xdir
                };
                blt.dx = dst_wrap(blt.dx + blt.xdir);
                blt.x -= 1;
                if blt.x < 0 {
                    blt.x = blt.width;
                    blt.dx = dst_wrap(i32::from(self.regs.dst_x));
                    blt.sx = i32::from(self.regs.src_x & 0xfff);
                    blt.dy = dst_wrap(blt.dy + blt.ydir);
                    blt.sy = if tiles {
                        tile_step(blt.sy, blt.ydir, src_h)
                    } else {
                        blt.sy + blt.ydir
                    };
                    blt.y -= 1;
                    if blt.y < 0 {
                        break;
                    }
                }
            }
        } else if (1..=3).contains(&pat_src) {
            let tiles = self.pattern_tiles(&blt);
            let pat = *self.regs.map(pat_src);
            let (pat_w, pat_h) = (i32::from(pat.width), i32::from(pat.height));
            loop {
                let fg = read_mono(self.vram, &pat, blt.px, blt.py, self.order);
                let value = self.source(fg, blt.sx, blt.sy);
                self.draw(blt.dx, blt.dy, value, fg, invert_dest);

                blt.sx += blt.xdir;
                blt.px = if tiles {
                    tile_step(blt.px, blt.xdir, pat_w)
                } else {
                    blt.px + blt.xdir
                };
                blt.dx = dst_wrap(blt.dx + blt.xdir);
                blt.x -= 1;
                if blt.x < 0 {
                    blt.y -= 1;
                    blt.x = blt.width;
                    blt.dx = dst_wrap(i32::from(self.regs.dst_x));
                    blt.sx = i32::from(self.regs.src_x & 0xfff);
                    blt.px = i32::from(self.regs.pat_x & 0xfff);
                    blt.sy += blt.ydir;
                    blt.py = if tiles {
                        tile_step(blt.py, blt.ydir, pat_h)
                    } else {
                        blt.py + blt.ydir
                    };
                    blt.dy = dst_wrap(blt.dy + blt.ydir);
                    if blt.y < 0 {
                        break;
                    }
                }
            }
        } else {
            trace!(pat_src, "BitBLT with unsupported pattern source");
            return;
        }

        self.regs.set_dst(blt.dx, blt.dy);
    }

    /// Scanline fill between boundary pixels of the pattern map. Each set boundary pixel
    /// toggles the fill state and is itself drawn while filling.
    pub(super) fn area_fill(&mut self) {
        let pat_src = self.cmd().pat_src();
        if !(1..=3).contains(&pat_src) {
            trace!(pat_src, "area fill without a boundary map");
            return;
        }
        let pat = *self.regs.map(pat_src);
        let mut blt = self.blt_start();
        let mut filling = false;
        loop {
            if read_mono(self.vram, &pat, blt.px, blt.py, self.order) {
                filling = !filling;
            }
            if filling {
                let value = self.source(true, blt.sx, blt.sy);
                self.draw(blt.dx, blt.dy, value, true, false);
            }

            blt.sx += blt.xdir;
            blt.px += blt.xdir;
            blt.dx = dst_wrap(blt.dx + blt.xdir);
            blt.x -= 1;
            if blt.x < 0 {
                filling = false;
                blt.y -= 1;
                blt.x = blt.width;
                blt.dx = dst_wrap(i32::from(self.regs.dst_x));
                blt.sx = i32::from(self.regs.src_x & 0xfff);
                blt.px = i32::from(self.regs.pat_x & 0xfff);
                blt.sy += blt.ydir;
                blt.py += blt.ydir;
                blt.dy = dst_wrap(blt.dy + blt.ydir);
                if blt.y < 0 {
                    break;
                }
            }
        }

        self.regs.set_dst(blt.dx, blt.dy);
    }
}
