//! ISA DMA: the channel interface consumed by sound devices and a dual Intel 8237 model.

use bitflags::bitflags;

/// Outcome of a single DMA cycle requested by a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaTransfer {
    /// The cycle ran. `terminal_count` is set when the controller's count register rolled
    /// over on this cycle (auto-init channels reload, others mask themselves).
    Data { value: u16, terminal_count: bool },
    /// The channel is masked, disabled, or programmed for the other direction.
    NoData,
}

impl DmaTransfer {
    pub fn value(self) -> Option<u16> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::NoData => None,
        }
    }

    pub fn is_no_data(self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// Device-side view of the DMA controller.
///
/// Channels 0..=3 move bytes, 4..=7 move words. `read` moves memory to the device and `write`
/// moves device data to memory.
pub trait DmaController {
    fn read(&mut self, channel: u8) -> DmaTransfer;
    fn write(&mut self, channel: u8, value: u16) -> DmaTransfer;
}

impl<T: DmaController + ?Sized> DmaController for &mut T {
    fn read(&mut self, channel: u8) -> DmaTransfer {
        (**self).read(channel)
    }

    fn write(&mut self, channel: u8, value: u16) -> DmaTransfer {
        (**self).write(channel, value)
    }
}

pub const MODE_TRANSFER_MASK: u8 = 0x0c;
/// Device to memory.
pub const MODE_TRANSFER_WRITE: u8 = 0x04;
/// Memory to device.
pub const MODE_TRANSFER_READ: u8 = 0x08;
pub const MODE_AUTOINIT: u8 = 0x10;
pub const MODE_DECREMENT: u8 = 0x20;
pub const MODE_SINGLE: u8 = 0x40;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DmaCommand: u8 {
        const MEM_TO_MEM = 0x01;
        const DISABLE = 0x04;
    }
}

/// Port windows decoded by [`Isa8237`]: `(start, len)`.
pub const DMA_PORT_RANGES: [(u16, u16); 3] = [(0x00, 0x10), (0x80, 0x10), (0xc0, 0x20)];

/// Page register offset (port & 0x0f) to channel. `None` for the unused registers.
const PAGE_TO_CHANNEL: [Option<u8>; 16] = [
    None,
    Some(2),
    Some(3),
    Some(1),
    None,
    None,
    None,
    Some(0),
    None,
    Some(6),
    Some(7),
    Some(5),
    None,
    None,
    None,
    Some(4),
];

#[derive(Clone, Copy, Debug, Default)]
struct Channel {
    base_addr: u32,
    cur_addr: u32,
    base_count: u16,
    cur_count: i32,
    mode: u8,
}

impl Channel {
    fn step_addr(&mut self, word: bool) {
        let down = self.mode & MODE_DECREMENT != 0;
        if word {
            let off = if down {
                self.cur_addr.wrapping_sub(2)
            } else {
                self.cur_addr.wrapping_add(2)
            };
            self.cur_addr = (self.cur_addr & 0xfffe_0000) | (off & 0x1_ffff);
        } else {
            let off = if down {
                self.cur_addr.wrapping_sub(1)
            } else {
                self.cur_addr.wrapping_add(1)
            };
            self.cur_addr = (self.cur_addr & 0xffff_0000) | (off & 0xffff);
        }
    }
}

/// Two cascaded 8237 controllers over a flat guest memory image.
#[derive(Debug, Clone)]
pub struct Isa8237 {
    channels: [Channel; 8],
    flip_flop: [bool; 2],
    command: [DmaCommand; 2],
    mask: u8,
    terminal: u8,
    request: u8,
    pages: [u8; 16],
    memory: Vec<u8>,
}

impl Isa8237 {
    /// Creates a controller with `memory_size` bytes of guest memory. All channels start masked.
    pub fn new(memory_size: usize) -> Self {
        Self {
            channels: [Channel::default(); 8],
            flip_flop: [false; 2],
            command: [DmaCommand::empty(); 2],
            mask: 0xff,
            terminal: 0,
            request: 0,
            pages: [0; 16],
            memory: vec![0; memory_size],
        }
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    pub fn is_masked(&self, channel: u8) -> bool {
        self.mask & (1 << (channel & 7)) != 0
    }

    /// Programs a channel the way a driver would, through the controller's ports.
    ///
    /// `addr` is the physical byte address; for word channels it must be even. `count` is the
    /// number of transfer units minus one. The channel is unmasked afterwards.
    pub fn program_channel(&mut self, channel: u8, mode: u8, addr: u32, count: u16) {
        let channel = channel & 7;
        let sel = channel & 3;
        let (base, shift, page) = if channel < 4 {
            (0x00u16, 0u16, (addr >> 16) as u8)
        } else {
            (0xc0u16, 1u16, ((addr >> 16) as u8) & 0xfe)
        };
        let port = |reg: u16| base + (reg << shift);
        let unit_addr = if channel < 4 { addr } else { addr >> 1 };

        self.port_write(port(0x0a), 0x04 | sel);
        self.port_write(port(0x0b), (mode & !3) | sel);
        self.port_write(port(0x0c), 0);
        self.port_write(port(u16::from(sel) * 2), unit_addr as u8);
        self.port_write(port(u16::from(sel) * 2), (unit_addr >> 8) as u8);
        self.port_write(port(u16::from(sel) * 2 + 1), count as u8);
        self.port_write(port(u16::from(sel) * 2 + 1), (count >> 8) as u8);
        if let Some(page_port) = PAGE_TO_CHANNEL.iter().position(|&c| c == Some(channel)) {
            self.port_write(0x80 + page_port as u16, page);
        }
        self.port_write(port(0x0a), sel);
    }

    pub fn port_read(&mut self, port: u16) -> u8 {
        match port {
            0x00..=0x0f => self.ctrl_read(0, port & 0x0f),
            0x80..=0x8f => self.pages[usize::from(port & 0x0f)],
            0xc0..=0xdf => self.ctrl_read(1, (port >> 1) & 0x0f),
            _ => 0xff,
        }
    }

    pub fn port_write(&mut self, port: u16, value: u8) {
        match port {
            0x00..=0x0f => self.ctrl_write(0, port & 0x0f, value),
            0x80..=0x8f => self.page_write(port & 0x0f, value),
            0xc0..=0xdf => self.ctrl_write(1, (port >> 1) & 0x0f, value),
            _ => {}
        }
    }

    fn ctrl_read(&mut self, ctrl: usize, reg: u16) -> u8 {
        let word = ctrl == 1;
        let channel = usize::from((reg >> 1) & 3) + ctrl * 4;
        match reg {
            0 | 2 | 4 | 6 => {
                self.flip_flop[ctrl] = !self.flip_flop[ctrl];
                let addr = if word {
                    self.channels[channel].cur_addr >> 1
                } else {
                    self.channels[channel].cur_addr
                };
                if self.flip_flop[ctrl] {
                    addr as u8
                } else {
                    (addr >> 8) as u8
                }
            }
            1 | 3 | 5 | 7 => {
                self.flip_flop[ctrl] = !self.flip_flop[ctrl];
                let count = self.channels[channel].cur_count as u16;
                if self.flip_flop[ctrl] {
                    count as u8
                } else {
                    (count >> 8) as u8
                }
            }
            8 => {
                let shift = ctrl * 4;
                let status =
                    (((self.request >> shift) & 0x0f) << 4) | ((self.terminal >> shift) & 0x0f);
                self.terminal &= !(0x0f << shift);
                status
            }
            _ => 0,
        }
    }

    fn ctrl_write(&mut self, ctrl: usize, reg: u16, value: u8) {
        let word = ctrl == 1;
        let shift = ctrl * 4;
        let channel = usize::from((reg >> 1) & 3) + ctrl * 4;
        match reg {
            0 | 2 | 4 | 6 => {
                self.flip_flop[ctrl] = !self.flip_flop[ctrl];
                let ch = &mut self.channels[channel];
                let v = u32::from(value);
                ch.base_addr = match (word, self.flip_flop[ctrl]) {
                    (false, true) => (ch.base_addr & 0xffff_ff00) | v,
                    (false, false) => (ch.base_addr & 0xffff_00ff) | (v << 8),
                    (true, true) => (ch.base_addr & 0xffff_fe00) | (v << 1),
                    (true, false) => (ch.base_addr & 0xfffe_01ff) | (v << 9),
                };
                ch.cur_addr = ch.base_addr;
            }
            1 | 3 | 5 | 7 => {
                self.flip_flop[ctrl] = !self.flip_flop[ctrl];
                let ch = &mut self.channels[channel];
                ch.base_count = if self.flip_flop[ctrl] {
                    (ch.base_count & 0xff00) | u16::from(value)
                } else {
                    (ch.base_count & 0x00ff) | (u16::from(value) << 8)
                };
                ch.cur_count = i32::from(ch.base_count);
            }
            8 => self.command[ctrl] = DmaCommand::from_bits_retain(value),
            9 => {
                let bit = 1 << ((value & 3) as usize + shift);
                if value & 4 != 0 {
                    self.request |= bit;
                } else {
                    self.request &= !bit;
                }
            }
            0x0a => {
                let bit = 1 << ((value & 3) as usize + shift);
                if value & 4 != 0 {
                    self.mask |= bit;
                } else {
                    self.mask &= !bit;
                }
            }
            0x0b => {
                let channel = usize::from(value & 3) + ctrl * 4;
                self.channels[channel].mode = value;
            }
            0x0c => self.flip_flop[ctrl] = false,
            0x0d => {
                self.flip_flop[ctrl] = false;
                self.mask |= 0x0f << shift;
                self.request &= !(0x0f << shift);
            }
            0x0e => self.mask &= !(0x0f << shift),
            0x0f => self.mask = (self.mask & !(0x0f << shift)) | ((value & 0x0f) << shift),
            _ => {}
        }
    }

    fn page_write(&mut self, reg: u16, value: u8) {
        self.pages[usize::from(reg)] = value;
        let Some(channel) = PAGE_TO_CHANNEL[usize::from(reg)] else {
            return;
        };
        let ch = &mut self.channels[usize::from(channel)];
        if channel >= 4 {
            let page = u32::from(value & 0xfe) << 16;
            ch.base_addr = (ch.base_addr & 0xff01_ffff) | page;
            ch.cur_addr = (ch.cur_addr & 0xff01_ffff) | page;
        } else {
            let page = u32::from(value) << 16;
            ch.base_addr = (ch.base_addr & 0xff00_ffff) | page;
            ch.cur_addr = (ch.cur_addr & 0xff00_ffff) | page;
        }
    }

    fn can_transfer(&self, channel: u8, direction: u8) -> bool {
        let ctrl = usize::from(channel >> 2);
        !self.command[ctrl].contains(DmaCommand::DISABLE)
            && !self.is_masked(channel)
            && self.channels[usize::from(channel)].mode & MODE_TRANSFER_MASK == direction
    }

    /// Decrements the count and handles terminal count. Returns whether it was reached.
    fn finish_cycle(&mut self, channel: u8) -> bool {
        let bit = 1u8 << channel;
        self.request &= !bit;
        let ch = &mut self.channels[usize::from(channel)];
        ch.cur_count -= 1;
        if ch.cur_count >= 0 {
            return false;
        }
        if ch.mode & MODE_AUTOINIT != 0 {
            ch.cur_count = i32::from(ch.base_count);
            ch.cur_addr = ch.base_addr;
        } else {
            self.mask |= bit;
        }
        self.terminal |= bit;
        tracing::debug!(channel, "dma terminal count");
        true
    }

    fn mem_read(&self, addr: u32) -> u8 {
        self.memory.get(addr as usize).copied().unwrap_or(0xff)
    }

    fn mem_write(&mut self, addr: u32, value: u8) {
        if let Some(b) = self.memory.get_mut(addr as usize) {
            *b = value;
        }
    }
}

impl DmaController for Isa8237 {
    fn read(&mut self, channel: u8) -> DmaTransfer {
        let channel = channel & 7;
        if !self.can_transfer(channel, MODE_TRANSFER_READ) {
            return DmaTransfer::NoData;
        }
        let word = channel >= 4;
        let addr = self.channels[usize::from(channel)].cur_addr;
        let value = if word {
            u16::from_le_bytes([self.mem_read(addr), self.mem_read(addr.wrapping_add(1))])
        } else {
            u16::from(self.mem_read(addr))
        };
        self.channels[usize::from(channel)].step_addr(word);
        let terminal_count = self.finish_cycle(channel);
        DmaTransfer::Data {
            value,
            terminal_count,
        }
    }

    fn write(&mut self, channel: u8, value: u16) -> DmaTransfer {
        let channel = channel & 7;
        if !self.can_transfer(channel, MODE_TRANSFER_WRITE) {
            return DmaTransfer::NoData;
        }
        let word = channel >= 4;
        let addr = self.channels[usize::from(channel)].cur_addr;
        let [lo, hi] = value.to_le_bytes();
        self.mem_write(addr, lo);
        if word {
            self.mem_write(addr.wrapping_add(1), hi);
        }
        self.channels[usize::from(channel)].step_addr(word);
        let terminal_count = self.finish_cycle(channel);
        DmaTransfer::Data {
            value,
            terminal_count,
        }
    }
}
