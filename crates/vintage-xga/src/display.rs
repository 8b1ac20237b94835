//! Extended register window, CRTC timing and the scanline renderer.

use bitflags::bitflags;
use tracing::{debug, trace};
use vintage_platform::{DeviceTimer, IsaBus};
use vintage_time::{TimerEvent, TimerId};

use crate::vram::{Vram, CHANGE_FRAMES};
use crate::XgaKind;

pub const EXT_PORT_BASE: u16 = 0x2100;
pub const EXT_PORT_COUNT: u16 = 16;

pub const EXT_OP_MODE: u16 = 0x0;
pub const EXT_APERTURE_CNTL: u16 = 0x1;
pub const EXT_INT_ENABLE: u16 = 0x4;
pub const EXT_INT_STATUS: u16 = 0x5;
pub const EXT_VM_CONTROL: u16 = 0x6;
pub const EXT_APERTURE_INDEX: u16 = 0x8;
pub const EXT_ACCESS_MODE: u16 = 0x9;
pub const EXT_INDEX: u16 = 0xa;
pub const EXT_DATA: u16 = 0xb;

const MAX_WIDTH: u32 = 2048;
const MAX_HEIGHT: u32 = 1536;
const MAX_DISPLINE: u32 = 1500;

pub const CURSOR_SIZE: u32 = 64;
const SPRITE_BYTES: usize = 0x400;
/// Sprite bytes per cursor row at two bits per pixel.
const SPRITE_ROW_BYTES: u32 = CURSOR_SIZE / 4;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterruptStatus: u8 {
        const START_OF_BLANKING = 0x01;
        const START_OF_PICTURE = 0x02;
        const ACCESS_REJECT = 0x40;
        const OP_COMPLETE = 0x80;
    }
}

bitflags! {
    /// Display control 1 (index 0x50).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DisplayControl1: u8 {
        const INTERLACE = 0x08;
        /// Always reads back set.
        const READ_BACK = 0x20;
        const _ = !0;
    }
}

/// Display mode field of display control 2 (index 0x51).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Vga,
    Bpp8,
    Bpp16,
    /// Extended but with a depth the renderer does not draw.
    Other(u8),
}

impl DisplayMode {
    pub fn from_control2(value: u8) -> Self {
        match value & 7 {
            0..=2 => Self::Vga,
            3 => Self::Bpp8,
            4 => Self::Bpp16,
            other => Self::Other(other),
        }
    }

    pub fn is_extended(self) -> bool {
        self != Self::Vga
    }
}

/// RGBA8888 with red in the low byte.
#[inline]
pub fn rgba(r: u8, g: u8, b: u8) -> u32 {
    u32::from_le_bytes([r, g, b, 0xff])
}

fn rgb565(value: u16) -> u32 {
    let r = ((value >> 11) & 0x1f) as u8;
    let g = ((value >> 5) & 0x3f) as u8;
    let b = (value & 0x1f) as u8;
    rgba((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
}

/// Cursor colour registers hold 0xRRGGBB.
fn packed_rgb(value: u32) -> u32 {
    rgba((value >> 16) as u8, (value >> 8) as u8, value as u8)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
    /// One flag per scanline redrawn since the previous frame.
    pub dirty: Vec<bool>,
}

impl Framebuffer {
    fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![0; len],
            dirty: vec![true; height as usize],
        }
    }

    pub fn row(&self, y: u32) -> &[u32] {
        let w = self.width as usize;
        let start = y as usize * w;
        &self.pixels[start..start + w]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorState {
    pub x: u16,
    pub y: u16,
    pub hot_x: u8,
    pub hot_y: u8,
    pub enabled: bool,
}

/// Derived CRTC timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    pub h_total: u32,
    pub h_disp: u32,
    pub v_total: u32,
    pub dispend: u32,
    pub v_syncstart: u32,
    pub v_blankstart: u32,
    pub split: u32,
    pub rowoffset: u32,
    pub rowcount: u32,
    pub interlace: bool,
    pub pixel_clock_hz: u32,
    pub dispon_ns: u64,
    pub dispoff_ns: u64,
}

impl Timings {
    pub fn line_ns(&self) -> u64 {
        self.dispon_ns + self.dispoff_ns
    }
}

// 640x480 at 60 Hz, used for any register the guest left at zero.
const DEFAULT_HTOTAL: u16 = 99;
const DEFAULT_HDISP: u16 = 79;
const DEFAULT_VTOTAL: u16 = 524;
const DEFAULT_VDISPEND: u16 = 479;
const DEFAULT_VSYNCSTART: u16 = 489;
const DEFAULT_VBLANKSTART: u16 = 479;
const NO_SPLIT: u16 = 0x7ff;

fn or_default(value: u16, default: u16) -> u16 {
    if value == 0 {
        default
    } else {
        value
    }
}

pub struct XgaDisplay {
    kind: XgaKind,

    op_mode: u8,
    aperture_cntl: u8,
    int_enable: u8,
    int_status: InterruptStatus,
    vm_control: u8,
    aperture_index: u8,
    bank: u32,
    access_mode: u8,
    index: u8,
    regs: [u8; 256],

    htotal: u16,
    hdisp: u16,
    vtotal: u16,
    vdispend: u16,
    vblankstart: u16,
    vsyncstart: u16,
    linecmp: u16,
    disp_start: u32,
    pix_map_width: u16,
    disp_cntl_1: DisplayControl1,
    disp_cntl_2: u8,
    clk_sel_1: u8,
    clk_sel_2: u8,
    direct_color: u8,

    cursor: CursorState,
    cursor_color: [u32; 2],
    sprite: Box<[u8; SPRITE_BYTES]>,
    sprite_index: u16,
    sprite_pos: u16,
    prefetch_index: u16,
    prefetch_pos: u16,

    palette: Box<[[u8; 3]; 256]>,
    pal_index: u8,
    pal_pos: u8,
    pal_latch: [u8; 3],
    pal_mask: u8,
    pal_seq: u8,
    full_redraw: u8,

    timings: Timings,
    timer: Option<TimerId>,
    line_start: bool,
    vc: u32,
    sc: u32,
    displine: u32,
    ma: u32,
    maback: u32,
    ma_latch: u32,
    dispon: bool,
    oddeven: bool,
    cursor_latch: CursorState,
    cursor_rows_left: u32,

    frame: Framebuffer,
    completed: Option<Framebuffer>,
}

impl XgaDisplay {
    pub fn new(kind: XgaKind) -> Self {
        let mut display = Self {
            kind,
            op_mode: 0,
            aperture_cntl: 0,
            int_enable: 0,
            int_status: InterruptStatus::empty(),
            vm_control: 0,
            aperture_index: 0,
            bank: 0,
            access_mode: 0,
            index: 0,
            regs: [0; 256],
            htotal: 0,
            hdisp: 0,
            vtotal: 0,
            vdispend: 0,
            vblankstart: 0,
            vsyncstart: 0,
            linecmp: 0,
            disp_start: 0,
            pix_map_width: 0,
            disp_cntl_1: DisplayControl1::empty(),
            disp_cntl_2: 0,
            clk_sel_1: 0,
            clk_sel_2: 0,
            direct_color: 0,
            cursor: CursorState::default(),
            cursor_color: [0; 2],
            sprite: Box::new([0; SPRITE_BYTES]),
            sprite_index: 0,
            sprite_pos: 0,
            prefetch_index: 0,
            prefetch_pos: 0,
            palette: Box::new([[0; 3]; 256]),
            pal_index: 0,
            pal_pos: 0,
            pal_latch: [0; 3],
            pal_mask: 0xff,
            pal_seq: 0,
            full_redraw: CHANGE_FRAMES,
            timings: Timings {
                h_total: 0,
                h_disp: 0,
                v_total: 0,
                dispend: 0,
                v_syncstart: 0,
                v_blankstart: 0,
                split: 0,
                rowoffset: 0,
                rowcount: 0,
                interlace: false,
                pixel_clock_hz: 25_175_000,
                dispon_ns: 1,
                dispoff_ns: 1,
            },
            timer: None,
            line_start: true,
            vc: 0,
            sc: 0,
            displine: 0,
            ma: 0,
            maback: 0,
            ma_latch: 0,
            dispon: true,
            oddeven: false,
            cursor_latch: CursorState::default(),
            cursor_rows_left: 0,
            frame: Framebuffer::default(),
            completed: None,
        };
        display.recalc_timings();
        display
    }

    pub fn mode(&self) -> DisplayMode {
        DisplayMode::from_control2(self.disp_cntl_2)
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor
    }

    pub fn interrupt_status(&self) -> InterruptStatus {
        self.int_status
    }

    pub(crate) fn flag_op_complete(&mut self) {
        self.int_status |= InterruptStatus::OP_COMPLETE;
    }

    pub fn access_mode(&self) -> u8 {
        self.access_mode
    }

    pub fn op_mode(&self) -> u8 {
        self.op_mode
    }

    /// Offset of the 64 KiB banked aperture into VRAM.
    pub fn bank_offset(&self) -> u32 {
        self.bank
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn palette_entry(&self, index: u8) -> [u8; 3] {
        self.palette[usize::from(index)]
    }

    /// Pops the most recently completed frame.
    pub fn take_frame(&mut self) -> Option<Framebuffer> {
        self.completed.take()
    }

    pub fn reset<D>(&mut self, bus: &mut IsaBus<D>) {
        bus.cancel(&mut self.timer);
        *self = Self::new(self.kind);
    }

    pub fn read_u8(&mut self, offset: u16) -> u8 {
        match offset & 0x0f {
            EXT_OP_MODE => self.op_mode,
            EXT_APERTURE_CNTL => self.aperture_cntl,
            EXT_INT_ENABLE => self.int_enable,
            EXT_INT_STATUS => self.int_status.bits(),
            EXT_VM_CONTROL => self.vm_control,
            EXT_APERTURE_INDEX => self.aperture_index,
            EXT_ACCESS_MODE => self.access_mode,
            EXT_INDEX => self.index,
            0x0b..=0x0f => self.read_indexed(),
            _ => 0xff,
        }
    }

    pub fn write_u8<D>(&mut self, offset: u16, value: u8, bus: &mut IsaBus<D>) {
        trace!(offset, value, "xga extended register write");
        match offset & 0x0f {
            EXT_OP_MODE => self.op_mode = value,
            EXT_APERTURE_CNTL => self.aperture_cntl = value,
            EXT_INT_ENABLE => {
                self.int_enable = value;
                self.access_mode &= !0x08;
                if self.mode() == DisplayMode::Bpp16 {
                    self.aperture_cntl = 0;
                }
            }
            EXT_INT_STATUS => self.int_status.remove(InterruptStatus::from_bits_truncate(value)),
            EXT_VM_CONTROL => self.vm_control = value,
            EXT_APERTURE_INDEX => {
                self.aperture_index = value;
                self.bank = if self.op_mode & 7 < 4 {
                    0
                } else {
                    u32::from(value & 0x3f) << 16
                };
            }
            EXT_ACCESS_MODE => self.access_mode = value,
            EXT_INDEX => self.index = value,
            0x0b..=0x0f => self.write_indexed(value, bus),
            _ => trace!(offset, value, "write to unused extended register"),
        }
    }

    fn read_indexed(&mut self) -> u8 {
        let lo = |v: u32| v as u8;
        let hi = |v: u32| (v >> 8) as u8;
        match self.index {
            // Bus type: ISA.
            0x04 => 0,
            0x10 => lo(self.htotal.into()),
            0x11 => hi(self.htotal.into()),
            0x12 => lo(self.hdisp.into()),
            0x13 => hi(self.hdisp.into()),
            0x20 => lo(self.vtotal.into()),
            0x21 => hi(self.vtotal.into()),
            0x22 => lo(self.vdispend.into()),
            0x23 => hi(self.vdispend.into()),
            0x24 => lo(self.vblankstart.into()),
            0x25 => hi(self.vblankstart.into()),
            0x28 => lo(self.vsyncstart.into()),
            0x29 => hi(self.vsyncstart.into()),
            0x2c => lo(self.linecmp.into()),
            0x2d => hi(self.linecmp.into()),
            0x30 => lo(self.cursor.x.into()),
            0x31 => hi(self.cursor.x.into()),
            0x32 => self.cursor.hot_x,
            0x33 => lo(self.cursor.y.into()),
            0x34 => hi(self.cursor.y.into()),
            0x35 => self.cursor.hot_y,
            0x36 => self.regs[0x36],
            0x38..=0x3a => (self.cursor_color[0] >> (8 * u32::from(self.index - 0x38))) as u8,
            0x3b..=0x3d => (self.cursor_color[1] >> (8 * u32::from(self.index - 0x3b))) as u8,
            0x40 => lo(self.disp_start),
            0x41 => hi(self.disp_start),
            0x42 => (self.disp_start >> 16) as u8,
            0x43 => lo(self.pix_map_width.into()),
            0x44 => hi(self.pix_map_width.into()),
            0x50 => (self.disp_cntl_1 | DisplayControl1::READ_BACK).bits(),
            0x51 => self.disp_cntl_2,
            0x52 => match self.kind {
                XgaKind::Xga => 0xea,
                XgaKind::Xga2 => 0xfa,
            },
            0x53 => match self.kind {
                XgaKind::Xga => 0x30,
                XgaKind::Xga2 => 0x53,
            },
            0x54 => self.clk_sel_1,
            0x59 => self.direct_color,
            0x60 => lo(self.sprite_index.into()),
            0x61 => hi(self.sprite_index.into()),
            0x62 => lo(self.prefetch_index.into()),
            0x63 => hi(self.prefetch_index.into()),
            0x64 => self.pal_mask,
            0x65 => {
                let entry = self.palette[usize::from(self.pal_index)];
                let value = entry[usize::from(self.pal_pos)];
                self.advance_palette_pos();
                value
            }
            0x66 => self.pal_seq,
            0x67 => self.pal_latch[0],
            0x68 => self.pal_latch[2],
            0x69 => self.pal_latch[1],
            0x6a => {
                let value = self.sprite[usize::from(self.prefetch_pos)];
                self.prefetch_pos = (self.prefetch_pos + 1) & 0x3ff;
                value
            }
            0x70 => self.clk_sel_2,
            idx => self.regs[usize::from(idx)],
        }
    }

    fn advance_palette_pos(&mut self) {
        self.pal_pos += 1;
        if self.pal_pos == 3 {
            self.pal_pos = 0;
            self.pal_index = self.pal_index.wrapping_add(1);
        }
    }

    fn write_indexed<D>(&mut self, value: u8, bus: &mut IsaBus<D>) {
        let idx = self.index;
        self.regs[usize::from(idx)] = value;
        let set_lo = |reg: &mut u16, v: u8| *reg = (*reg & 0xff00) | u16::from(v);
        let set_hi = |reg: &mut u16, v: u8| *reg = (*reg & 0x00ff) | (u16::from(v) << 8);

        match idx {
            0x10 => set_lo(&mut self.htotal, value),
            0x11 => set_hi(&mut self.htotal, value),
            0x12 => set_lo(&mut self.hdisp, value),
            0x13 => set_hi(&mut self.hdisp, value),
            0x20 => set_lo(&mut self.vtotal, value),
            0x21 => set_hi(&mut self.vtotal, value),
            0x22 => set_lo(&mut self.vdispend, value),
            0x23 => set_hi(&mut self.vdispend, value),
            0x24 => set_lo(&mut self.vblankstart, value),
            0x25 => set_hi(&mut self.vblankstart, value),
            0x28 => set_lo(&mut self.vsyncstart, value),
            0x29 => set_hi(&mut self.vsyncstart, value),
            0x2c => set_lo(&mut self.linecmp, value),
            0x2d => set_hi(&mut self.linecmp, value),
            0x30 => set_lo(&mut self.cursor.x, value),
            0x31 => set_hi(&mut self.cursor.x, value & 0x07),
            0x32 => self.cursor.hot_x = value & 0x3f,
            0x33 => set_lo(&mut self.cursor.y, value),
            0x34 => set_hi(&mut self.cursor.y, value & 0x07),
            0x35 => self.cursor.hot_y = value & 0x3f,
            0x36 => self.cursor.enabled = value & 0x01 != 0,
            0x38..=0x3a => set_color_lane(&mut self.cursor_color[0], idx - 0x38, value),
            0x3b..=0x3d => set_color_lane(&mut self.cursor_color[1], idx - 0x3b, value),
            0x40 => self.disp_start = (self.disp_start & 0x7ff00) | u32::from(value),
            0x41 => self.disp_start = (self.disp_start & 0x700ff) | (u32::from(value) << 8),
            0x42 => self.disp_start = (self.disp_start & 0x0ffff) | (u32::from(value & 0x07) << 16),
            0x43 => set_lo(&mut self.pix_map_width, value),
            0x44 => set_hi(&mut self.pix_map_width, value & 0x07),
            0x50 => self.disp_cntl_1 = DisplayControl1::from_bits_retain(value),
            0x51 => {
                let was = self.mode();
                self.disp_cntl_2 = value;
                let now = self.mode();
                if was.is_extended() != now.is_extended() {
                    debug!(mode = ?now, "xga display mode change");
                }
            }
            0x54 => self.clk_sel_1 = value,
            0x59 => self.direct_color = value,
            0x60 => {
                self.sprite_index = (self.sprite_index & 0x3f00) | u16::from(value);
                self.pal_index = value;
                self.pal_pos = 0;
            }
            0x61 => {
                self.sprite_index = (self.sprite_index & 0x00ff) | (u16::from(value & 0x3f) << 8);
                self.sprite_pos = self.sprite_index & 0x1ff;
            }
            0x62 => {
                self.prefetch_index = (self.prefetch_index & 0x3f00) | u16::from(value);
                self.pal_index = value;
                self.pal_pos = 0;
            }
            0x63 => {
                self.prefetch_index = (self.prefetch_index & 0x00ff) | (u16::from(value & 0x3f) << 8);
                self.prefetch_pos = self.prefetch_index & 0x1ff;
            }
            0x64 => {
                self.pal_mask = value;
                self.full_redraw = CHANGE_FRAMES;
            }
            0x65 => {
                self.pal_latch[usize::from(self.pal_pos)] = value;
                if self.pal_pos == 2 {
                    self.palette[usize::from(self.pal_index)] = self.pal_latch;
                }
                self.advance_palette_pos();
                self.full_redraw = CHANGE_FRAMES;
            }
            0x66 => self.pal_seq = value,
            0x67 => self.pal_latch[0] = value,
            0x68 => self.pal_latch[2] = value,
            0x69 => self.pal_latch[1] = value,
            0x6a => {
                self.sprite[usize::from(self.sprite_pos)] = value;
                self.sprite_pos = (self.sprite_pos + 1) & 0x3ff;
            }
            0x70 => self.clk_sel_2 = value,
            _ => {}
        }

        if matches!(
            idx,
            0x10..=0x13 | 0x20..=0x25 | 0x28 | 0x29 | 0x2c | 0x2d | 0x40..=0x42 | 0x50 | 0x51 | 0x54 | 0x70
        ) {
            self.recalc_timings();
            self.sync_timer(bus);
        }
    }

    pub fn recalc_timings(&mut self) {
        let interlace = self.disp_cntl_1.contains(DisplayControl1::INTERLACE);
        let halve = |v: u32| if interlace { v >> 1 } else { v };

        let htotal = u32::from(or_default(self.htotal, DEFAULT_HTOTAL));
        let hdisp = u32::from(or_default(self.hdisp, DEFAULT_HDISP));
        let h_total = (htotal + 1) * 8;
        let h_disp = ((hdisp + 1) * 8).min(MAX_WIDTH);

        let pixel_clock_hz = match self.clk_sel_1 & 0x0c {
            0 if self.clk_sel_2 & 0x80 != 0 => 41_539_000,
            0 => 25_175_000,
            0x04 => 28_322_000,
            0x0c => 44_900_000,
            _ => self.timings.pixel_clock_hz,
        };
        let ns = |pixels: u32| (u64::from(pixels) * 1_000_000_000 / u64::from(pixel_clock_hz)).max(1);
        let dispon_ns = ns(h_disp.min(h_total));
        let dispoff_ns = ns(h_total.saturating_sub(h_disp)).max(1);

        self.timings = Timings {
            h_total,
            h_disp,
            v_total: halve(u32::from(or_default(self.vtotal, DEFAULT_VTOTAL)) + 1),
            dispend: halve(u32::from(or_default(self.vdispend, DEFAULT_VDISPEND)) + 1),
            v_syncstart: halve(u32::from(or_default(self.vsyncstart, DEFAULT_VSYNCSTART)) + 1),
            v_blankstart: halve(u32::from(or_default(self.vblankstart, DEFAULT_VBLANKSTART)) + 1),
            split: halve(u32::from(or_default(self.linecmp, NO_SPLIT)) + 1),
            rowoffset: hdisp + 1,
            rowcount: u32::from(self.disp_cntl_2 >> 6) & 3,
            interlace,
            pixel_clock_hz,
            dispon_ns,
            dispoff_ns,
        };
        self.ma_latch = self.disp_start;

        let lines = if interlace {
            self.timings.dispend * 2
        } else {
            self.timings.dispend
        };
        let (width, height) = (h_disp.max(1), lines.clamp(1, MAX_HEIGHT));
        if self.frame.width != width || self.frame.height != height {
            debug!(width, height, clock = pixel_clock_hz, "xga display geometry");
            self.frame = Framebuffer::new(width, height);
            self.full_redraw = CHANGE_FRAMES;
        }
    }

    /// Runs the scanline timer only while an extended mode is displayed.
    fn sync_timer<D>(&mut self, bus: &mut IsaBus<D>) {
        let extended = self.mode().is_extended();
        if extended && self.timer.is_none() {
            self.vc = 0;
            self.sc = 0;
            self.displine = 0;
            self.dispon = true;
            self.line_start = true;
            self.ma = self.ma_latch << 2;
            self.maback = self.ma;
            let at = bus.now_ns() + self.timings.dispoff_ns;
            self.timer = Some(bus.schedule(at, DeviceTimer::XgaScanline));
        } else if !extended && self.timer.is_some() {
            bus.cancel(&mut self.timer);
        }
    }

    fn bytes_per_pixel(&self) -> u32 {
        if self.mode() == DisplayMode::Bpp16 {
            2
        } else {
            1
        }
    }

    /// One half of a scanline: the start of the active region renders the line, its end
    /// advances the row and vertical counters.
    pub fn handle_timer_event<D>(
        &mut self,
        ev: &TimerEvent<DeviceTimer>,
        vram: &mut Vram,
        bus: &mut IsaBus<D>,
    ) {
        if ev.payload != DeviceTimer::XgaScanline || Some(ev.id) != self.timer {
            return;
        }

        let t = self.timings;
        let delay = if self.line_start {
            self.start_line(vram);
            t.dispon_ns
        } else {
            self.end_line(vram);
            t.dispoff_ns
        };
        self.line_start = !self.line_start;
        self.timer = Some(bus.schedule(ev.deadline_ns + delay.max(1), DeviceTimer::XgaScanline));
    }

    fn start_line(&mut self, vram: &mut Vram) {
        let t = self.timings;
        if self.cursor_latch.enabled && self.displine == u32::from(self.cursor_latch.y) {
            self.cursor_rows_left = CURSOR_SIZE;
        }

        if self.dispon {
            self.ma &= vram.mask();
            let line_bytes = t.h_disp * self.bytes_per_pixel();
            if self.cursor_rows_left > 0 {
                vram.mark_changed(self.ma, line_bytes);
            }
            let redraw = self.full_redraw > 0 || vram.range_changed(self.ma, line_bytes);
            if redraw && self.displine < self.frame.height {
                self.render_line(vram);
                self.draw_cursor_row();
                self.frame.dirty[self.displine as usize] = true;
            }
            if self.cursor_rows_left > 0 {
                let step = if t.interlace { 2 } else { 1 };
                self.cursor_rows_left = self.cursor_rows_left.saturating_sub(step);
            }
        }

        self.displine += if t.interlace { 2 } else { 1 };
        if self.displine > MAX_DISPLINE {
            self.displine = 0;
        }
    }

    fn render_line(&mut self, vram: &Vram) {
        let mode = self.mode();
        let width = self.frame.width as usize;
        let start = self.displine as usize * width;
        let row = &mut self.frame.pixels[start..start + width];
        match mode {
            DisplayMode::Bpp8 => {
                for (x, px) in row.iter_mut().enumerate() {
                    let index = vram.read(self.ma.wrapping_add(x as u32)) & self.pal_mask;
                    let [r, g, b] = self.palette[usize::from(index)];
                    *px = rgba(r, g, b);
                }
            }
            DisplayMode::Bpp16 => {
                for (x, px) in row.iter_mut().enumerate() {
                    *px = rgb565(vram.read_u16_le(self.ma.wrapping_add(2 * x as u32)));
                }
            }
            DisplayMode::Vga | DisplayMode::Other(_) => row.fill(0),
        }
    }

    /// Composites one 64-pixel cursor row: 0 and 1 pick a colour, 2 is transparent and
    /// 3 inverts.
    fn draw_cursor_row(&mut self) {
        if self.cursor_rows_left == 0 {
            return;
        }
        let row = CURSOR_SIZE - self.cursor_rows_left;
        let left = i32::from(self.cursor_latch.x) - i32::from(self.cursor_latch.hot_x);
        let width = self.frame.width as i32;
        let line = self.displine as usize * self.frame.width as usize;
        for x in 0..CURSOR_SIZE {
            let byte = self.sprite[((row * SPRITE_ROW_BYTES + x / 4) & 0x3ff) as usize];
            let code = (byte >> ((x & 3) * 2)) & 3;
            let col = left + x as i32;
            if col < 0 || col >= width {
                continue;
            }
            let px = &mut self.frame.pixels[line + col as usize];
            match code {
                0 => *px = packed_rgb(self.cursor_color[0]),
                1 => *px = packed_rgb(self.cursor_color[1]),
                3 => *px ^= 0x00ff_ffff,
                _ => {}
            }
        }
    }

    fn end_line(&mut self, vram: &mut Vram) {
        let t = self.timings;
        let mask = vram.mask();

        if self.dispon {
            if self.sc == t.rowcount {
                self.sc = 0;
                let shift = if self.mode() == DisplayMode::Bpp16 { 4 } else { 3 };
                let mut step = t.rowoffset << shift;
                if t.interlace {
                    step *= 2;
                }
                self.maback = self.maback.wrapping_add(step) & mask;
                self.ma = self.maback;
            } else {
                self.sc = (self.sc + 1) & 0x1f;
                self.ma = self.maback;
            }
        }

        self.vc = (self.vc + 1) & 2047;

        if self.vc == t.split {
            let start = if t.interlace && self.oddeven {
                t.rowoffset << 1
            } else {
                0
            };
            self.ma = start << 2;
            self.maback = self.ma;
            self.sc = 0;
        }
        if self.vc == t.dispend {
            self.dispon = false;
            self.int_status |= InterruptStatus::START_OF_BLANKING;
            vram.age_changes();
            self.full_redraw = self.full_redraw.saturating_sub(1);
        }
        if self.vc == t.v_syncstart {
            self.dispon = false;
            self.completed = Some(self.frame.clone());
            self.frame.dirty.fill(false);
            self.oddeven = !self.oddeven;
            let start = if t.interlace && self.oddeven {
                self.ma_latch + (t.rowoffset << 1)
            } else {
                self.ma_latch
            };
            self.ma = (start << 2) & mask;
            self.maback = self.ma;
        }
        if self.vc == t.v_total {
            self.vc = 0;
            self.sc = 0;
            self.dispon = true;
            self.displine = u32::from(t.interlace && self.oddeven);
            self.cursor_latch = self.cursor;
            self.cursor_rows_left = 0;
            self.int_status |= InterruptStatus::START_OF_PICTURE;
        }
    }
}

fn set_color_lane(reg: &mut u32, lane: u8, value: u8) {
    let shift = 8 * u32::from(lane);
    *reg = (*reg & !(0xff << shift)) | (u32::from(value) << shift);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb565_expands_to_full_range() {
        assert_eq!(rgb565(0xffff), rgba(0xff, 0xff, 0xff));
        assert_eq!(rgb565(0xf800), rgba(0xff, 0, 0));
        assert_eq!(rgb565(0x07e0), rgba(0, 0xff, 0));
        assert_eq!(rgb565(0x001f), rgba(0, 0, 0xff));
    }

    #[test]
    fn default_geometry_is_vga_like() {
        let display = XgaDisplay::new(XgaKind::Xga);
        let t = display.timings();
        assert_eq!(t.h_disp, 640);
        assert_eq!(t.h_total, 800);
        assert_eq!(t.dispend, 480);
        assert_eq!(t.v_total, 525);
        assert_eq!(t.line_ns(), 800 * 1_000_000_000 / 25_175_000 + 1);
    }
}
