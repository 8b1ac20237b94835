//! AD1848 / CS4248 / CS423x SoundPort codec.
//!
//! A four-port window: index, indexed data, status and PIO data. Playback is a timer-driven pump
//! at the rate selected by register 8; the 16-bit count in registers 14/15 paces the interrupt.

mod g711;

pub use g711::{alaw_to_linear, mulaw_to_linear};

use std::sync::OnceLock;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use vintage_platform::io::{split_read, split_write};
use vintage_platform::{
    validate_dma_channel, validate_irq, DeviceSlot, DeviceTimer, DmaController, IoPortBus, IsaBus,
    PortIoDevice,
};
use vintage_time::{latch_from_rate_hz, TimerEvent, TimerId, TIMER_USEC};

use crate::buffer::{to_f32, SampleBuffer};
use crate::sink::AudioSink;
use crate::{ConfigError, StereoFrame};

const XTAL_24M: u32 = 24_576_000;
const XTAL_16M: u32 = 16_934_400;
const RATE_DIVISORS: [u32; 8] = [3072, 1536, 896, 768, 448, 384, 512, 2560];

/// Poll period used while no rate is programmed.
const IDLE_LATCH: u64 = TIMER_USEC * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    Ad1848,
    Cs4248,
    Cs4231,
    Cs4232,
    Cs4236,
}

impl CodecKind {
    /// CS4231 and later implement MODE2 and the upper sixteen registers.
    pub fn has_mode2(self) -> bool {
        self >= CodecKind::Cs4231
    }

    fn version_id(self) -> u8 {
        match self {
            CodecKind::Ad1848 | CodecKind::Cs4248 => 0,
            CodecKind::Cs4231 => 0xa0,
            CodecKind::Cs4232 => 0xa2,
            CodecKind::Cs4236 => 0x03,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub kind: CodecKind,
    pub base: u16,
    pub irq: u8,
    pub dma: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            kind: CodecKind::Ad1848,
            base: 0x530,
            irq: 10,
            dma: 0,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_irq(self.irq)?;
        validate_dma_channel(self.dma)?;
        Ok(())
    }
}

bitflags! {
    /// Latches held in the index register alongside the register index.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IndexFlags: u8 {
        const TRD = 0x20;
        const MCE = 0x40;
        const INIT = 0x80;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CodecStatus: u8 {
        const INT = 0x01;
        const PRDY = 0x02;
        const PLR = 0x04;
        const PUL = 0x08;
        const SER = 0x10;
        const CRDY = 0x20;
        const CLR = 0x40;
        const CUL = 0x80;
    }
}

const STATUS_RESET: CodecStatus = CodecStatus::from_bits_truncate(0xcc);

/// 16.16 gain for each 6-bit attenuation code (bits weigh 1.5, 3, 6, 12, 24 and 48 dB).
pub fn attenuation_table() -> &'static [i32; 64] {
    static TABLE: OnceLock<[i32; 64]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0i32; 64];
        for (code, gain) in table.iter_mut().enumerate() {
            let mut db = 0.0f64;
            for (bit, step) in [1.5, 3.0, 6.0, 12.0, 24.0, 48.0].iter().enumerate() {
                if code & (1 << bit) != 0 {
                    db -= step;
                }
            }
            *gain = (10f64.powf(db / 10.0) * 65536.0) as i32;
        }
        table
    })
}

fn attenuate(sample: i16, reg: u8) -> i16 {
    if reg & 0x80 != 0 {
        return 0;
    }
    let gain = attenuation_table()[usize::from(reg & 0x3f)];
    ((i32::from(sample) * gain) >> 16) as i16
}

pub struct Ad1848 {
    config: CodecConfig,
    index: u8,
    flags: IndexFlags,
    regs: [u8; 32],
    xregs: [u8; 32],
    /// Extended register selected through R23, consumed by the next R23 data access.
    xindex: Option<u8>,
    status: CodecStatus,

    enable: bool,
    count: i32,
    freq: u32,
    latch: u64,
    timer: Option<TimerId>,

    raw: StereoFrame,
    out: StereoFrame,
    buffer: SampleBuffer,
}

impl Ad1848 {
    pub fn try_new(config: CodecConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    pub fn new(kind: CodecKind) -> Self {
        Self::build(CodecConfig {
            kind,
            ..CodecConfig::default()
        })
    }

    fn build(config: CodecConfig) -> Self {
        let mut codec = Self {
            config,
            index: 0,
            flags: IndexFlags::MCE,
            regs: [0; 32],
            xregs: [0; 32],
            xindex: None,
            status: STATUS_RESET,
            enable: false,
            count: 0,
            freq: 0,
            latch: 0,
            timer: None,
            raw: [0; 2],
            out: [0; 2],
            buffer: SampleBuffer::new(0),
        };
        codec.reset_registers();
        codec
    }

    fn reset_registers(&mut self) {
        let kind = self.config.kind;
        self.index = 0;
        self.flags = IndexFlags::MCE;
        self.regs = [0; 32];
        self.regs[2..=7].fill(0x80);
        self.regs[9] = 0x08;
        self.regs[12] = if kind.has_mode2() { 0x8a } else { 0x0a };
        self.regs[25] = kind.version_id();
        self.xregs = [0; 32];
        self.xindex = None;
        self.status = STATUS_RESET;
        self.update_rate();
    }

    pub fn reset<D>(&mut self, bus: &mut IsaBus<D>) {
        debug!(kind = ?self.config.kind, "codec reset");
        bus.cancel(&mut self.timer);
        self.enable = false;
        self.count = 0;
        self.raw = [0; 2];
        self.out = [0; 2];
        self.reset_registers();
        bus.lower_irq(self.config.irq);
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn attach<D>(self, io: &mut IoPortBus<IsaBus<D>>) -> Result<DeviceSlot, ConfigError>
    where
        D: DmaController + 'static,
    {
        let base = self.config.base;
        Ok(io.register_range(base, 4, Box::new(self))?)
    }

    fn mode2(&self) -> bool {
        self.config.kind.has_mode2() && self.regs[12] & 0x40 != 0
    }

    fn index_mask(&self) -> u8 {
        if self.mode2() {
            0x1f
        } else {
            0x0f
        }
    }

    fn update_rate(&mut self) {
        let fmt = self.regs[8];
        let crystal = if fmt & 1 != 0 { XTAL_16M } else { XTAL_24M };
        let divisor = RATE_DIVISORS[usize::from((fmt >> 1) & 7)];
        self.freq = crystal / divisor;
        self.latch = latch_from_rate_hz(f64::from(crystal) / f64::from(divisor));
        debug!(freq = self.freq, latch = self.latch, "codec rate");
    }

    fn reload_count(&mut self) {
        self.count = i32::from(self.regs[15]) | i32::from(self.regs[14]) << 8;
    }

    fn write_register<D>(&mut self, value: u8, bus: &mut IsaBus<D>) {
        let idx = usize::from(self.index);
        let kind = self.config.kind;
        trace!(reg = idx, value, "codec register write");

        match idx {
            8 => {
                self.regs[8] = value;
                self.update_rate();
            }
            9 => {
                let start = value & 0x41 == 0x01;
                if !self.enable && start {
                    let at = bus.now_ns() + self.poll_period();
                    self.timer = Some(bus.schedule(at, DeviceTimer::CodecPoll));
                    debug!("codec playback started");
                }
                self.enable = start;
                if !start {
                    bus.cancel(&mut self.timer);
                    self.raw = [0; 2];
                    self.out = [0; 2];
                }
                self.regs[9] = value;
            }
            11 => trace!(value, "write to read-only codec test register"),
            12 => {
                if kind.has_mode2() {
                    self.regs[12] = 0x8a | (value & 0x40);
                } else {
                    trace!(value, "write to read-only codec id register");
                }
            }
            14 => {
                self.regs[14] = value;
                self.reload_count();
            }
            23 if kind == CodecKind::Cs4236 => self.write_extended(value),
            25 if kind.has_mode2() => trace!(value, "write to read-only codec version register"),
            _ => self.regs[idx] = value,
        }
    }

    fn write_extended(&mut self, value: u8) {
        match self.xindex.take() {
            Some(x) => {
                trace!(xreg = x, value, "codec extended register write");
                self.xregs[usize::from(x)] = value;
            }
            None => {
                self.regs[23] = value;
                if value & 0x08 != 0 {
                    let x = ((value >> 4) & 0x0f) | ((value & 0x04) << 2);
                    if x >= 26 {
                        warn!(xreg = x, "access to reserved codec extended register");
                    }
                    self.xindex = Some(x);
                }
            }
        }
    }

    fn read_register(&mut self) -> u8 {
        let idx = usize::from(self.index);
        match idx {
            11 => {
                self.regs[11] ^= 0x20;
                self.regs[11]
            }
            23 if self.config.kind == CodecKind::Cs4236 => match self.xindex.take() {
                Some(x) => self.xregs[usize::from(x)],
                None => self.regs[23],
            },
            _ => self.regs[idx],
        }
    }

    pub fn read_u8<D>(&mut self, port: u16, _bus: &mut IsaBus<D>) -> u8 {
        let value = match port.wrapping_sub(self.config.base) & 3 {
            0 => self.index | (self.flags & (IndexFlags::TRD | IndexFlags::MCE)).bits(),
            1 => self.read_register(),
            2 => self.status.bits(),
            _ => 0,
        };
        trace!(port, value, "codec read");
        value
    }

    pub fn write_u8<D>(&mut self, port: u16, value: u8, bus: &mut IsaBus<D>) {
        trace!(port, value, "codec write");
        match port.wrapping_sub(self.config.base) & 3 {
            0 => {
                self.index = value & self.index_mask();
                let flags = IndexFlags::from_bits_truncate(value) & (IndexFlags::TRD | IndexFlags::MCE);
                if self.flags.contains(IndexFlags::MCE) && !flags.contains(IndexFlags::MCE) {
                    debug!("codec mode change disabled");
                }
                self.flags = flags;
            }
            1 => self.write_register(value, bus),
            2 => {
                self.status.remove(CodecStatus::INT);
                bus.lower_irq(self.config.irq);
            }
            _ => {}
        }
    }

    fn poll_period(&self) -> u64 {
        if self.latch == 0 {
            IDLE_LATCH
        } else {
            self.latch
        }
    }

    pub fn handle_timer_event<D: DmaController>(
        &mut self,
        ev: &TimerEvent<DeviceTimer>,
        bus: &mut IsaBus<D>,
    ) {
        if ev.payload != DeviceTimer::CodecPoll || self.timer != Some(ev.id) {
            return;
        }
        let next = ev.deadline_ns + self.poll_period();
        self.timer = Some(bus.schedule(next, DeviceTimer::CodecPoll));
        self.poll(bus);
    }

    fn read_byte<D: DmaController>(&self, bus: &mut IsaBus<D>) -> Option<u8> {
        bus.dma.read(self.config.dma).value().map(|v| v as u8)
    }

    fn read_sample<D: DmaController>(&self, format: u8, bus: &mut IsaBus<D>) -> Option<i16> {
        match format {
            0 => self.read_byte(bus).map(|b| (u16::from(b ^ 0x80) << 8) as i16),
            1 => self.read_byte(bus).map(mulaw_to_linear),
            2 => {
                let lo = self.read_byte(bus)?;
                let hi = self.read_byte(bus)?;
                Some(i16::from_le_bytes([lo, hi]))
            }
            _ => self.read_byte(bus).map(alaw_to_linear),
        }
    }

    fn poll<D: DmaController>(&mut self, bus: &mut IsaBus<D>) {
        self.buffer.fill_to(bus.now_ns(), self.out);

        if !self.enable {
            self.out = [0; 2];
            return;
        }

        let fmt = self.regs[8];
        let format = (fmt >> 5) & 3;
        let frame = if fmt & 0x10 != 0 {
            self.read_sample(format, bus)
                .and_then(|l| self.read_sample(format, bus).map(|r| [l, r]))
        } else {
            self.read_sample(format, bus).map(|s| [s, s])
        };
        let Some(frame) = frame else {
            return;
        };
        self.raw = frame;
        self.out = [attenuate(frame[0], self.regs[6]), attenuate(frame[1], self.regs[7])];

        if self.count < 0 {
            self.reload_count();
            if !self.status.contains(CodecStatus::INT) {
                self.status.insert(CodecStatus::INT);
                if self.regs[10] & 0x02 != 0 {
                    debug!(irq = self.config.irq, "codec playback interrupt");
                    bus.raise_irq(self.config.irq);
                }
            }
        }
        self.count -= 1;
    }

    pub fn fill_frame(&mut self, end_ns: u64, sink: &mut impl AudioSink) {
        self.buffer.fill_to(end_ns, self.out);
        let mut out = Vec::with_capacity(self.buffer.len() * 2);
        for [l, r] in self.buffer.take() {
            out.push(to_f32(f64::from(l)));
            out.push(to_f32(f64::from(r)));
        }
        sink.push_interleaved_f32(&out);
    }

    pub fn latch(&self) -> u64 {
        self.latch
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.freq
    }

    pub fn is_playing(&self) -> bool {
        self.enable
    }

    pub fn status(&self) -> CodecStatus {
        self.status
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn register(&self, idx: u8) -> u8 {
        self.regs[usize::from(idx & 0x1f)]
    }

    pub fn extended_register(&self, idx: u8) -> u8 {
        self.xregs[usize::from(idx & 0x1f)]
    }

    /// Last frame fetched from DMA, before attenuation.
    pub fn raw_frame(&self) -> StereoFrame {
        self.raw
    }

    pub fn output_frame(&self) -> StereoFrame {
        self.out
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }
}

impl<D: DmaController> PortIoDevice<IsaBus<D>> for Ad1848 {
    fn read(&mut self, port: u16, size: u8, bus: &mut IsaBus<D>) -> u32 {
        split_read(port, size, |p| self.read_u8(p, bus))
    }

    fn write(&mut self, port: u16, size: u8, value: u32, bus: &mut IsaBus<D>) {
        split_write(port, size, value, |p, v| self.write_u8(p, v, bus));
    }

    fn reset(&mut self, bus: &mut IsaBus<D>) {
        Ad1848::reset(self, bus);
    }
}
