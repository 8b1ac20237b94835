//! IBM XGA / XGA-2 display adapter: the drawing coprocessor, its memory-mapped register file
//! and the extended-mode display pipeline.
//!
//! The coprocessor is synchronous. A write to the pixel operation register (or a dword write to
//! the short-stroke register) runs the whole operation against [`Vram`] before the write returns.
//! Display refresh is timer-driven through [`DeviceTimer::XgaScanline`] and produces
//! [`Framebuffer`]s the host collects with [`Xga::take_frame`].

pub mod accel;
pub mod display;
pub mod pixmap;
pub mod regs;
pub mod rop;
pub mod vram;

pub use display::{DisplayMode, Framebuffer, InterruptStatus, XgaDisplay};
pub use pixmap::PixelOrder;
pub use regs::{AccelRegs, Command, PixelDepth, PixelMap};
pub use vram::Vram;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use vintage_platform::io::{split_read, split_write};
use vintage_platform::{DeviceSlot, DeviceTimer, DmaController, IoPortBus, IsaBus, PortIoDevice};
use vintage_time::TimerEvent;

use crate::accel::Engine;
use crate::display::{EXT_PORT_BASE, EXT_PORT_COUNT};
use crate::regs::{REG_COMMAND, REG_SHORT_STROKE};

/// Size of the ROM plus register window.
pub const ROM_WINDOW: u32 = 0x2000;
/// Offsets at and above this in the window decode the coprocessor registers.
pub const REGISTER_WINDOW: u32 = 0x1800;
pub const BANK_SIZE: u32 = 0x1_0000;

pub const POS_PORT_BASE: u16 = 0x100;
pub const POS_PORT_COUNT: u16 = 8;

const MIN_VRAM: usize = 64 * 1024;
const MAX_INSTANCE: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XgaKind {
    Xga,
    Xga2,
}

impl XgaKind {
    fn board_id(self) -> [u8; 2] {
        match self {
            XgaKind::Xga => [0xdb, 0x8f],
            XgaKind::Xga2 => [0xda, 0x8f],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XgaConfig {
    pub kind: XgaKind,
    pub vram_size: usize,
    /// Selects the extended register window at `0x2100 + instance * 0x10`.
    pub instance: u8,
    /// Optional BIOS image mapped at the start of the ROM window.
    pub bios_rom: Option<Vec<u8>>,
}

impl Default for XgaConfig {
    fn default() -> Self {
        Self {
            kind: XgaKind::Xga,
            vram_size: 1024 * 1024,
            instance: 6,
            bios_rom: None,
        }
    }
}

impl XgaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.vram_size.is_power_of_two() || self.vram_size < MIN_VRAM {
            return Err(ConfigError::VramSize(self.vram_size));
        }
        if self.instance > MAX_INSTANCE {
            return Err(ConfigError::InvalidInstance(self.instance));
        }
        if let Some(rom) = &self.bios_rom {
            if rom.len() > REGISTER_WINDOW as usize {
                return Err(ConfigError::RomTooLarge(rom.len()));
            }
        }
        Ok(())
    }

    pub fn ext_port_base(&self) -> u16 {
        EXT_PORT_BASE + u16::from(self.instance) * EXT_PORT_COUNT
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Platform(#[from] vintage_platform::ConfigError),
    #[error("VRAM size {0:#x} is not a power of two of at least 64 KiB")]
    VramSize(usize),
    #[error("XGA instance {0} is out of range 0..=7")]
    InvalidInstance(u8),
    #[error("BIOS image of {0} bytes does not fit below the register window")]
    RomTooLarge(usize),
}

pub struct Xga {
    config: XgaConfig,
    regs: AccelRegs,
    vram: Vram,
    display: XgaDisplay,
    rom: Box<[u8]>,
    pos: [u8; 8],
    linear_endian_reverse: bool,
}

impl Xga {
    pub fn try_new(config: XgaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// A board of `kind` with the default 1 MiB of VRAM at instance 6.
    pub fn new(kind: XgaKind) -> Self {
        Self::build(XgaConfig {
            kind,
            ..XgaConfig::default()
        })
    }

    fn build(config: XgaConfig) -> Self {
        let mut rom = vec![0xff; REGISTER_WINDOW as usize].into_boxed_slice();
        if let Some(image) = &config.bios_rom {
            rom[..image.len()].copy_from_slice(image);
        }

        let mut pos = [0; 8];
        pos[..2].copy_from_slice(&config.kind.board_id());
        pos[2] = 0xf0 | (config.instance << 1) | 1;
        pos[4] = 0x03;

        Self {
            regs: AccelRegs::new(),
            vram: Vram::new(config.vram_size),
            display: XgaDisplay::new(config.kind),
            rom,
            pos,
            linear_endian_reverse: false,
            config,
        }
    }

    /// Registers the extended window and the POS registers on `io`.
    pub fn attach<D>(self, io: &mut IoPortBus<IsaBus<D>>) -> Result<DeviceSlot, ConfigError>
    where
        D: DmaController + 'static,
    {
        let windows = [
            (self.config.ext_port_base(), EXT_PORT_COUNT),
            (POS_PORT_BASE, POS_PORT_COUNT),
        ];
        Ok(io.register_ranges(&windows, Box::new(self))?)
    }

    pub fn config(&self) -> &XgaConfig {
        &self.config
    }

    pub fn regs(&self) -> &AccelRegs {
        &self.regs
    }

    pub fn vram(&self) -> &Vram {
        &self.vram
    }

    pub fn display(&self) -> &XgaDisplay {
        &self.display
    }

    /// The byte-order override some drivers set through the memory access mode.
    pub fn set_linear_endian_reverse(&mut self, on: bool) {
        self.linear_endian_reverse = on;
    }

    fn pixel_order(&self) -> PixelOrder {
        PixelOrder {
            access_mode: self.display.access_mode(),
            linear_endian_reverse: self.linear_endian_reverse,
        }
    }

    fn engine(&mut self) -> Engine<'_> {
        let order = self.pixel_order();
        Engine {
            regs: &mut self.regs,
            vram: &mut self.vram,
            order,
            h_disp: self.display.timings().h_disp,
        }
    }

    /// A read of `size` bytes at `offset` into the 8 KiB ROM/register window.
    pub fn read_register(&self, offset: u32, size: u8) -> u32 {
        (0..u32::from(size)).fold(0, |acc, i| {
            acc | (u32::from(self.read_window_byte(offset.wrapping_add(i))) << (8 * i))
        })
    }

    fn read_window_byte(&self, offset: u32) -> u8 {
        let offset = offset & (ROM_WINDOW - 1);
        if offset < REGISTER_WINDOW {
            self.rom[offset as usize]
        } else {
            self.regs.read_byte(offset & 0x7f)
        }
    }

    /// A write of `size` bytes at `offset` into the window. Writes complete the register update
    /// before any operation they trigger runs.
    pub fn write_register(&mut self, offset: u32, value: u32, size: u8) {
        let offset = offset & (ROM_WINDOW - 1);
        if offset < REGISTER_WINDOW {
            trace!(offset, value, "write to XGA ROM ignored");
            return;
        }
        let reg = offset & 0x7f;
        for i in 0..u32::from(size) {
            self.regs.write_byte((reg + i) & 0x7f, (value >> (8 * i)) as u8);
        }

        match (reg, size) {
            (REG_SHORT_STROKE, 4) => {
                self.engine().short_strokes();
                self.display.flag_op_complete();
            }
            (REG_COMMAND, 4) | (0x7e, 2) | (0x7f, 1) => {
                self.engine().execute();
                self.display.flag_op_complete();
            }
            _ => {}
        }
    }

    /// Linear aperture access, wrapped to the installed VRAM.
    pub fn vram_read(&self, addr: u32) -> u8 {
        self.vram.read(addr)
    }

    pub fn vram_write(&mut self, addr: u32, value: u8) {
        self.vram.write(addr, value);
    }

    /// 64 KiB banked aperture access, offset by the aperture index.
    pub fn banked_read(&self, addr: u32) -> u8 {
        self.vram.read((addr & (BANK_SIZE - 1)) + self.display.bank_offset())
    }

    pub fn banked_write(&mut self, addr: u32, value: u8) {
        let addr = (addr & (BANK_SIZE - 1)) + self.display.bank_offset();
        self.vram.write(addr, value);
    }

    pub fn read_u8<D>(&mut self, port: u16, _bus: &mut IsaBus<D>) -> u8 {
        let ext = self.config.ext_port_base();
        if (POS_PORT_BASE..POS_PORT_BASE + POS_PORT_COUNT).contains(&port) {
            let idx = usize::from(port & 7);
            // The mapping enable bit always reads set.
            if idx == 3 {
                self.pos[idx] | 1
            } else {
                self.pos[idx]
            }
        } else if (ext..ext + EXT_PORT_COUNT).contains(&port) {
            self.display.read_u8(port - ext)
        } else {
            0xff
        }
    }

    pub fn write_u8<D>(&mut self, port: u16, value: u8, bus: &mut IsaBus<D>) {
        let ext = self.config.ext_port_base();
        if (ext..ext + EXT_PORT_COUNT).contains(&port) {
            self.display.write_u8(port - ext, value, bus);
        } else {
            trace!(port, value, "ignored XGA port write");
        }
    }

    pub fn handle_timer_event<D>(&mut self, ev: &TimerEvent<DeviceTimer>, bus: &mut IsaBus<D>) {
        self.display.handle_timer_event(ev, &mut self.vram, bus);
    }

    /// The most recent frame completed at vertical sync, if any since the last call.
    pub fn take_frame(&mut self) -> Option<Framebuffer> {
        self.display.take_frame()
    }

    pub fn reset<D>(&mut self, bus: &mut IsaBus<D>) {
        debug!(kind = ?self.config.kind, "XGA reset");
        self.display.reset(bus);
        self.regs = AccelRegs::new();
        self.linear_endian_reverse = false;
    }
}

impl<D: DmaController> PortIoDevice<IsaBus<D>> for Xga {
    fn read(&mut self, port: u16, size: u8, bus: &mut IsaBus<D>) -> u32 {
        split_read(port, size, |p| self.read_u8(p, bus))
    }

    fn write(&mut self, port: u16, size: u8, value: u32, bus: &mut IsaBus<D>) {
        split_write(port, size, value, |p, v| self.write_u8(p, v, bus));
    }

    fn reset(&mut self, bus: &mut IsaBus<D>) {
        Xga::reset(self, bus);
    }
}
