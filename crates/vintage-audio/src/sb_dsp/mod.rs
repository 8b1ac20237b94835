//! Sound Blaster DSP (SB 1.x through AWE64).
//!
//! The DSP is a byte-serial command processor behind the write port at `base + 0xC`. Commands
//! configure sample rates and start DMA streams; once a stream runs, the output and input timers
//! each move one sample (or one stereo pair) per tick between the DMA channel and the DAC/ADC
//! registers.
//!
//! The device owns no references to the rest of the machine. Every port access and timer event is
//! handed the [`IsaBus`] so the DSP can reach its DMA channels, raise its IRQ and schedule itself.

pub mod adpcm;
mod commands;

pub use commands::data_len;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use vintage_platform::io::{split_read, split_write};
use vintage_platform::{
    validate_dma_channel, validate_irq, DeviceSlot, DeviceTimer, DmaController, DmaTransfer,
    IoPortBus, IsaBus, PortIoDevice,
};
use vintage_time::{TimerEvent, TimerId, TIMER_USEC};

use self::adpcm::{AdpcmDecoder, AdpcmKind};
use self::commands::{COPYRIGHT, E2_TABLE};
use crate::buffer::{to_f32, SampleBuffer};
use crate::filter::LowPassFir;
use crate::sink::AudioSink;
use crate::{ConfigError, StereoFrame};

const READ_BUFFER_LEN: usize = 256;
const RECORD_BUFFER_LEN: usize = 0x1_0000;
/// Distance the record write cursor starts ahead of the read cursor, in buffer entries.
const RECORD_SAFETY_MARGIN: usize = 4096;
const ASP_RAM_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SbModel {
    Sb1,
    Sb15,
    Sb2,
    SbPro,
    SbPro2,
    Sb16,
    Awe32,
    Awe64,
}

impl SbModel {
    /// Value returned by command 0xE1, major in the high byte.
    pub const fn dsp_version(self) -> u16 {
        match self {
            SbModel::Sb1 => 0x105,
            SbModel::Sb15 => 0x200,
            SbModel::Sb2 => 0x201,
            SbModel::SbPro => 0x300,
            SbModel::SbPro2 => 0x302,
            SbModel::Sb16 => 0x405,
            SbModel::Awe32 => 0x40d,
            SbModel::Awe64 => 0x410,
        }
    }

    pub fn is_sb16_class(self) -> bool {
        self >= SbModel::Sb16
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SbConfig {
    pub model: SbModel,
    pub base: u16,
    pub irq: u8,
    pub dma8: u8,
    pub dma16: u8,
    /// SB Pro mixer stereo switch. Mono DMA formats then alternate between channels.
    pub mixer_stereo: bool,
}

impl Default for SbConfig {
    fn default() -> Self {
        Self {
            model: SbModel::Sb16,
            base: 0x220,
            irq: 5,
            dma8: 1,
            dma16: 5,
            mixer_stereo: false,
        }
    }
}

impl SbConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_irq(self.irq)?;
        validate_dma_channel(self.dma8)?;
        if self.model.is_sb16_class() {
            validate_dma_channel(self.dma16)?;
            if self.dma16 < 4 {
                return Err(ConfigError::Dma16OnByteChannel(self.dma16));
            }
        }
        Ok(())
    }
}

bitflags! {
    /// Pending interrupt sources behind the shared DSP IRQ line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IrqStatus: u8 {
        const DSP_8 = 1 << 0;
        const DSP_16 = 1 << 1;
        const MPU401 = 1 << 2;
    }
}

/// Sample layout of a DMA stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    Pcm { stereo: bool, signed: bool },
    Adpcm(AdpcmKind),
}

impl StreamFormat {
    /// Decodes the SB16 mode byte of the `0xBx`/`0xCx` commands (bit 4 signed, bit 5 stereo).
    pub fn from_mode(mode: u8) -> Self {
        StreamFormat::Pcm {
            stereo: mode & 0x20 != 0,
            signed: mode & 0x10 != 0,
        }
    }

    const UNSIGNED_MONO: Self = StreamFormat::Pcm {
        stereo: false,
        signed: false,
    };
}

#[derive(Debug, Clone, Copy)]
struct Stream {
    enable: bool,
    pause: bool,
    autoinit: bool,
    output: bool,
    /// Remaining transfers minus one; a negative value ends the block.
    length: i32,
    block_len: i32,
    format: StreamFormat,
}

impl Stream {
    fn new() -> Self {
        Self {
            enable: false,
            pause: false,
            autoinit: false,
            output: false,
            length: 0xffff,
            block_len: 0xffff,
            format: StreamFormat::UNSIGNED_MONO,
        }
    }

    fn runs(&self, output: bool, pausetime: i32) -> bool {
        self.enable && !self.pause && pausetime < 0 && self.output == output
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MidiMode {
    in_poll: bool,
    uart_irq: bool,
    uart: bool,
    one_byte: bool,
}

pub struct SbDsp {
    config: SbConfig,

    command: u8,
    data: [u8; 3],
    /// Data bytes collected for `command`; `None` while waiting for a command byte.
    data_stat: Option<u8>,
    commands_executed: u64,

    read_data: [u8; READ_BUFFER_LEN],
    read_rp: u8,
    read_wp: u8,
    last_read: u8,

    reset_latch: u8,
    write_busy_until_ns: u64,
    busy_count: u8,

    dma8: Stream,
    dma16: Stream,
    pausetime: i32,

    time_out: u32,
    time_in: u32,
    latch_out: u64,
    latch_in: u64,
    freq: u32,
    out_timer: Option<TimerId>,
    in_timer: Option<TimerId>,

    speaker: bool,
    muted: bool,
    stereo: bool,
    left_right: bool,
    out: StereoFrame,
    adpcm: AdpcmDecoder,
    adpcm_fetch_pending: bool,

    irq_status: IrqStatus,
    irq_mask: IrqStatus,

    test_reg: u8,
    e2_value: u8,
    e2_count: u8,

    asp_mode: u8,
    asp_ram_index: usize,
    asp_regs: [u8; 256],
    asp_ram: Box<[u8]>,
    asp_data_len: u32,
    ram_8051: [u8; 256],

    midi: MidiMode,
    midi_out: Vec<u8>,

    record: Box<[i16]>,
    record_read: usize,
    record_write: usize,

    buffer: SampleBuffer,
    playback_fir: LowPassFir,
    record_fir: LowPassFir,
}

impl SbDsp {
    pub fn try_new(config: SbConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// A DSP of `model` at the default resources of [`SbConfig`].
    pub fn new(model: SbModel) -> Self {
        Self::build(SbConfig {
            model,
            ..SbConfig::default()
        })
    }

    fn build(config: SbConfig) -> Self {
        let mut ram_8051 = [0u8; 256];
        ram_8051[0x0e] = 0xff;
        ram_8051[0x0f] = 0x07;
        ram_8051[0x37] = 0x38;

        let stereo = config.mixer_stereo;
        let mut dsp = Self {
            config,
            command: 0,
            data: [0; 3],
            data_stat: None,
            commands_executed: 0,
            read_data: [0; READ_BUFFER_LEN],
            read_rp: 0,
            read_wp: 0,
            last_read: 0,
            reset_latch: 0,
            write_busy_until_ns: 0,
            busy_count: 0,
            dma8: Stream::new(),
            dma16: Stream::new(),
            pausetime: -1,
            time_out: 0,
            time_in: 0,
            latch_out: 0,
            latch_in: 0,
            freq: 0,
            out_timer: None,
            in_timer: None,
            speaker: false,
            muted: false,
            stereo,
            left_right: false,
            out: [0; 2],
            adpcm: AdpcmDecoder::new(AdpcmKind::Bits4),
            adpcm_fetch_pending: false,
            irq_status: IrqStatus::empty(),
            irq_mask: IrqStatus::empty(),
            test_reg: 0,
            e2_value: 0xaa,
            e2_count: 0,
            asp_mode: 0,
            asp_ram_index: 0,
            asp_regs: [0; 256],
            asp_ram: vec![0xff; ASP_RAM_LEN].into_boxed_slice(),
            asp_data_len: 0,
            ram_8051,
            midi: MidiMode::default(),
            midi_out: Vec::new(),
            record: vec![0; RECORD_BUFFER_LEN].into_boxed_slice(),
            record_read: 0,
            record_write: RECORD_SAFETY_MARGIN,
            buffer: SampleBuffer::new(0),
            // 8-bit cards roll off around 3.2 kHz; start the SB16 path there too.
            playback_fir: LowPassFir::new(3_200 * 2),
            record_fir: LowPassFir::new(44_100),
        };
        dsp.speed_changed();
        dsp.asp_regs[5] = 0x01;
        dsp.asp_regs[9] = 0xf8;
        dsp
    }

    pub fn config(&self) -> &SbConfig {
        &self.config
    }

    pub fn model(&self) -> SbModel {
        self.config.model
    }

    fn sb16(&self) -> bool {
        self.config.model.is_sb16_class()
    }

    /// Port ranges decoded by the DSP: the reset port pair and the data/status block.
    pub fn port_ranges(&self) -> [(u16, u16); 2] {
        let base = self.config.base;
        [(base + 0x6, 2), (base + 0xa, 6)]
    }

    /// Registers the DSP on a port bus at its configured base.
    pub fn attach<D>(self, io: &mut IoPortBus<IsaBus<D>>) -> Result<DeviceSlot, ConfigError>
    where
        D: DmaController + 'static,
    {
        let ranges = self.port_ranges();
        Ok(io.register_ranges(&ranges, Box::new(self))?)
    }

    /// DSP reset as triggered through the reset port.
    pub fn reset<D>(&mut self, bus: &mut IsaBus<D>) {
        debug!("sb dsp reset");
        self.midi_out.clear();
        bus.cancel(&mut self.out_timer);
        bus.cancel(&mut self.in_timer);

        self.command = 0;
        self.dma8.length = 0xffff;
        self.dma8.block_len = 0xffff;
        self.dma16.pause = false;
        self.irq_status = IrqStatus::empty();
        self.read_rp = 0;
        self.read_wp = 0;
        self.data_stat = None;
        self.speaker = false;
        self.pausetime = -1;
        self.e2_value = 0xaa;
        self.e2_count = 0;
        self.reset_latch = 0;
        self.record_read = 0;
        self.record_write = RECORD_SAFETY_MARGIN;
        self.asp_data_len = 0;
        bus.lower_irq(self.config.irq);
    }

    /// Power-on reset: a DSP reset plus the ASP state.
    pub fn full_reset<D>(&mut self, bus: &mut IsaBus<D>) {
        self.reset(bus);
        self.asp_mode = 0;
        self.asp_ram_index = 0;
        self.asp_regs = [0; 256];
        self.asp_regs[5] = 0x01;
        self.asp_regs[9] = 0xf8;
    }

    fn speed_changed(&mut self) {
        self.latch_out = latch_for_time_constant(self.time_out);
        self.latch_in = latch_for_time_constant(self.time_in);
    }

    fn add_data(&mut self, value: u8) {
        self.read_data[usize::from(self.read_wp)] = value;
        self.read_wp = self.read_wp.wrapping_add(1);
    }

    fn update_status<D>(&mut self, source: IrqStatus, set: bool, bus: &mut IsaBus<D>) {
        if set {
            self.irq_status.insert(source);
            if !self.irq_mask.intersects(source) {
                debug!(?source, irq = self.config.irq, "sb irq raised");
                bus.raise_irq(self.config.irq);
            }
        } else {
            self.irq_status.remove(source);
            bus.lower_irq(self.config.irq);
        }
    }

    /// Sets which sources may drive the IRQ line. Masking a source that was unmasked lowers it.
    pub fn set_irq_mask<D>(&mut self, mask: IrqStatus, bus: &mut IsaBus<D>) {
        let newly_masked = mask - self.irq_mask;
        self.irq_mask = mask;
        if !newly_masked.is_empty() {
            bus.lower_irq(self.config.irq);
        }
    }

    /// Interrupt request from an MPU-401 sharing the DSP's IRQ line.
    pub fn set_mpu_irq<D>(&mut self, set: bool, bus: &mut IsaBus<D>) {
        self.update_status(IrqStatus::MPU401, set, bus);
    }

    pub fn irq_status(&self) -> IrqStatus {
        self.irq_status
    }

    /// SB Pro mixer stereo switch.
    pub fn set_stereo(&mut self, stereo: bool) {
        self.stereo = stereo;
    }

    fn arm_output<D>(&mut self, bus: &mut IsaBus<D>) {
        if !bus.is_armed(self.out_timer) {
            let at = bus.now_ns() + self.latch_out.max(1);
            self.out_timer = Some(bus.schedule(at, DeviceTimer::DspOutput));
        }
    }

    fn arm_input<D>(&mut self, bus: &mut IsaBus<D>) {
        if !bus.is_armed(self.in_timer) {
            let at = bus.now_ns() + self.latch_in.max(1);
            self.in_timer = Some(bus.schedule(at, DeviceTimer::DspInput));
        }
    }

    fn start_dma<D>(
        &mut self,
        dma8: bool,
        autoinit: bool,
        format: StreamFormat,
        len: i32,
        bus: &mut IsaBus<D>,
    ) {
        self.pausetime = -1;
        debug!(dma8, autoinit, ?format, len, "sb output dma started");

        let (stream, other) = if dma8 {
            (&mut self.dma8, &mut self.dma16)
        } else {
            (&mut self.dma16, &mut self.dma8)
        };
        *stream = Stream {
            enable: true,
            pause: false,
            autoinit,
            output: true,
            length: len,
            block_len: stream.block_len,
            format,
        };
        if other.enable && other.output {
            other.enable = false;
        }

        self.arm_output(bus);
        if dma8 {
            self.left_right = false;
            self.adpcm_fetch_pending = false;
            if let StreamFormat::Adpcm(kind) = format {
                self.adpcm.restart(kind);
            }
        }
    }

    fn start_dma_input<D>(
        &mut self,
        dma8: bool,
        autoinit: bool,
        format: StreamFormat,
        len: i32,
        bus: &mut IsaBus<D>,
    ) {
        debug!(dma8, autoinit, ?format, len, "sb input dma started");

        let (stream, other) = if dma8 {
            (&mut self.dma8, &mut self.dma16)
        } else {
            (&mut self.dma16, &mut self.dma8)
        };
        *stream = Stream {
            enable: true,
            pause: false,
            autoinit,
            output: false,
            length: len,
            block_len: stream.block_len,
            format,
        };
        if other.enable && !other.output {
            other.enable = false;
        }

        self.arm_input(bus);
        self.record.fill(0);
    }

    /// Reads one encoded byte for the ADPCM decoder, counting it against the block.
    fn fetch_adpcm<D: DmaController>(&mut self, bus: &mut IsaBus<D>) -> bool {
        match bus.dma.read(self.config.dma8) {
            DmaTransfer::Data { value, .. } => {
                self.adpcm.load(value as u8);
                self.dma8.length -= 1;
                self.adpcm_fetch_pending = false;
                true
            }
            DmaTransfer::NoData => {
                self.adpcm_fetch_pending = true;
                false
            }
        }
    }

    fn start_adpcm<D: DmaController>(
        &mut self,
        kind: AdpcmKind,
        autoinit: bool,
        with_reference: bool,
        bus: &mut IsaBus<D>,
    ) {
        let mut reference_read = false;
        if with_reference {
            if let Some(reference) = bus.dma.read(self.config.dma8).value() {
                self.adpcm.set_reference(reference as u8);
                reference_read = true;
            }
        }
        self.start_dma(true, autoinit, StreamFormat::Adpcm(kind), self.data_u16(0), bus);
        self.fetch_adpcm(bus);
        if reference_read {
            self.dma8.length -= 1;
        }
    }

    fn data_u16(&self, first: usize) -> i32 {
        i32::from(self.data[first]) | i32::from(self.data[first + 1]) << 8
    }

    fn exec_command<D: DmaController>(&mut self, bus: &mut IsaBus<D>) {
        let cmd = self.command;
        let model = self.config.model;
        trace!(cmd, data = ?self.data, "sb dsp command");
        self.commands_executed += 1;

        if self.sb16() {
            self.ram_8051[0x20] = cmd;
        }

        match cmd {
            0x01 => {
                if self.sb16() {
                    self.asp_data_len = self.data_u16(0) as u32 + 1;
                }
            }
            0x03 => {
                if self.sb16() {
                    self.add_data(0);
                }
            }
            0x04 => {
                if self.sb16() {
                    self.asp_mode = self.data[0];
                    if self.asp_mode & 4 != 0 {
                        self.asp_ram_index = 0;
                    }
                    debug!(mode = self.asp_mode, "sb16 asp mode");
                }
            }
            0x05 => {
                if self.sb16() {
                    debug!(p0 = self.data[0], p1 = self.data[1], "sb16 asp codec parameters");
                }
            }
            0x07 | 0xff | 0xe7 | 0x28 | 0x32 | 0x33 | 0x36 | 0x37 | 0x45 | 0x47 => {}
            0x08 => {
                if model == SbModel::Awe64 {
                    self.add_data(0xff);
                } else if self.sb16() {
                    self.add_data(0x18);
                }
            }
            0x0e => {
                if self.sb16() {
                    let reg = usize::from(self.data[0]);
                    self.asp_regs[reg] = self.data[1];
                    if reg == 0x83 && self.asp_mode & 0x88 == 0x88 {
                        self.asp_ram_index = 0;
                        self.asp_ram[self.asp_ram_index] = self.data[1];
                        if self.asp_mode & 2 != 0 {
                            self.asp_ram_index = (self.asp_ram_index + 1) % ASP_RAM_LEN;
                        }
                    }
                }
            }
            0x0f => {
                if self.sb16() {
                    let reg = usize::from(self.data[0]);
                    if reg == 0x83 && self.asp_mode & 0x88 == 0x88 {
                        self.asp_ram_index = 0;
                        self.asp_regs[0x83] = self.asp_ram[self.asp_ram_index];
                        if self.asp_mode & 1 != 0 {
                            self.asp_ram_index = (self.asp_ram_index + 1) % ASP_RAM_LEN;
                        }
                    } else if reg == 0x83 {
                        self.asp_regs[0x83] = 0x18;
                    }
                    self.add_data(self.asp_regs[reg]);
                }
            }
            0x10 => {
                self.update_buffer(bus.now_ns());
                let s = (u16::from(self.data[0] ^ 0x80) << 8) as i16;
                self.out = [s, s];
            }
            0x14 => self.start_dma(true, false, StreamFormat::UNSIGNED_MONO, self.data_u16(0), bus),
            0x16 => self.start_adpcm(AdpcmKind::Bits2, false, false, bus),
            0x17 => self.start_adpcm(AdpcmKind::Bits2, false, true, bus),
            0x1c => {
                if model >= SbModel::Sb15 {
                    let len = self.dma8.block_len;
                    self.start_dma(true, true, StreamFormat::UNSIGNED_MONO, len, bus);
                }
            }
            0x1f => {
                if model >= SbModel::Sb15 {
                    self.start_adpcm(AdpcmKind::Bits2, true, false, bus);
                }
            }
            0x20 => {
                let sample = self.record[self.record_read];
                self.add_data(((sample >> 8) as u8) ^ 0x80);
                // Direct ADC still needs the input timer to walk the record buffer.
                if !bus.is_armed(self.in_timer) {
                    self.time_in = 256 - 22;
                    self.latch_in = TIMER_USEC * 22;
                    self.freq = 1_000_000 / 22;
                    self.arm_input(bus);
                }
            }
            0x24 => {
                self.start_dma_input(true, false, StreamFormat::UNSIGNED_MONO, self.data_u16(0), bus)
            }
            0x2c => {
                if model >= SbModel::Sb15 {
                    let len = self.data_u16(0);
                    self.start_dma_input(true, true, StreamFormat::UNSIGNED_MONO, len, bus);
                }
            }
            0x30 => {
                self.midi.in_poll = true;
                self.midi.uart_irq = false;
            }
            0x31 => {
                self.midi.in_poll = false;
                self.midi.uart_irq = true;
            }
            0x34 | 0x35 => {
                if model >= SbModel::Sb2 {
                    let irq = cmd == 0x35;
                    debug!(irq, "sb midi uart mode");
                    self.midi.in_poll = !irq;
                    self.midi.uart = true;
                    self.midi.uart_irq = irq;
                }
            }
            0x38 => self.midi.one_byte = true,
            0x40 => {
                let tc = self.data[0];
                self.time_out = u32::from(tc);
                self.time_in = u32::from(tc);
                self.latch_out = TIMER_USEC * (256 - u64::from(tc));
                self.latch_in = self.latch_out;
                let freq = 1_000_000 / (256 - u32::from(tc));
                debug!(freq, latch = self.latch_out, "sb time constant");
                if freq != self.freq && self.sb16() {
                    self.playback_fir.retune(freq);
                }
                self.freq = freq;
            }
            0x41 | 0x42 => {
                if self.sb16() {
                    let freq = u32::from(self.data[1]) | u32::from(self.data[0]) << 8;
                    self.latch_out = vintage_time::latch_from_rate_hz(f64::from(freq));
                    self.latch_in = self.latch_out;
                    self.time_out = 256 + freq;
                    self.time_in = self.time_out;
                    debug!(freq, latch = self.latch_out, "sb sample rate");
                    if freq != self.freq {
                        self.playback_fir.retune(freq);
                    }
                    self.freq = freq;
                    self.ram_8051[0x13] = freq as u8;
                    self.ram_8051[0x14] = (freq >> 8) as u8;
                }
            }
            0x48 => self.dma8.block_len = self.data_u16(0),
            0x74 => self.start_adpcm(AdpcmKind::Bits4, false, false, bus),
            0x75 => self.start_adpcm(AdpcmKind::Bits4, false, true, bus),
            0x76 => self.start_adpcm(AdpcmKind::Bits26, false, false, bus),
            0x77 => self.start_adpcm(AdpcmKind::Bits26, false, true, bus),
            0x7d => {
                if model >= SbModel::Sb15 {
                    self.start_adpcm(AdpcmKind::Bits4, true, false, bus);
                }
            }
            0x7f => {
                if model >= SbModel::Sb15 {
                    self.start_adpcm(AdpcmKind::Bits26, true, false, bus);
                }
            }
            0x80 => {
                self.pausetime = self.data_u16(0);
                debug!(ticks = self.pausetime, "sb pause dac");
                self.arm_output(bus);
            }
            0x90 | 0x91 => {
                if model >= SbModel::Sb2 {
                    let len = self.dma8.block_len;
                    self.start_dma(true, cmd == 0x90, StreamFormat::UNSIGNED_MONO, len, bus);
                }
            }
            0x98 | 0x99 => {
                if model >= SbModel::Sb2 {
                    let len = self.dma8.block_len;
                    self.start_dma_input(true, cmd == 0x98, StreamFormat::UNSIGNED_MONO, len, bus);
                }
            }
            0xa0 | 0xa8 => {}
            0xb0..=0xcf => {
                if self.sb16() {
                    let dma8 = cmd >= 0xc0;
                    let input = cmd & 0x08 != 0;
                    let autoinit = cmd & 0x04 != 0;
                    let format = StreamFormat::from_mode(self.data[0]);
                    let len = self.data_u16(1);
                    if input {
                        self.start_dma_input(dma8, autoinit, format, len, bus);
                    } else {
                        self.start_dma(dma8, autoinit, format, len, bus);
                    }
                    if dma8 {
                        self.dma8.block_len = len;
                    } else {
                        self.dma16.block_len = len;
                    }
                }
            }
            0xd0 => self.dma8.pause = true,
            0xd1 | 0xd3 => {
                let on = cmd == 0xd1;
                if model < SbModel::Sb15 {
                    self.dma8.pause = true;
                } else if !self.sb16() {
                    self.muted = !on;
                }
                self.speaker = on;
            }
            0xd4 => self.dma8.pause = false,
            0xd5 => {
                if self.sb16() {
                    self.dma16.pause = true;
                }
            }
            0xd6 => {
                if self.sb16() {
                    self.dma16.pause = false;
                }
            }
            0xd8 => self.add_data(if self.speaker { 0xff } else { 0 }),
            0xd9 => {
                if self.sb16() {
                    self.dma16.autoinit = false;
                }
            }
            0xda => self.dma8.autoinit = false,
            0xe0 => self.add_data(!self.data[0]),
            0xe1 => {
                let version = model.dsp_version();
                self.add_data((version >> 8) as u8);
                self.add_data(version as u8);
            }
            0xe2 => {
                let row = &E2_TABLE[usize::from(self.e2_count & 3)];
                let mut value = i32::from(self.e2_value);
                for (bit, add) in row.iter().take(8).enumerate() {
                    if self.data[0] & (1 << bit) != 0 {
                        value += i32::from(*add);
                    }
                }
                value += i32::from(row[8]);
                self.e2_value = value as u8;
                self.e2_count = self.e2_count.wrapping_add(1);
                bus.dma.write(self.config.dma8, u16::from(self.e2_value));
            }
            0xe3 => {
                if self.sb16() {
                    for &b in COPYRIGHT {
                        self.add_data(b);
                    }
                    self.add_data(0);
                }
            }
            0xe4 => self.test_reg = self.data[0],
            0xe8 => self.add_data(self.test_reg),
            0xf2 => self.update_status(IrqStatus::DSP_8, true, bus),
            0xf3 => self.update_status(IrqStatus::DSP_16, true, bus),
            0xf8 => {
                if !self.sb16() {
                    self.add_data(0);
                }
            }
            0xf9 => {
                if self.sb16() {
                    self.add_data(self.ram_8051[usize::from(self.data[0])]);
                }
            }
            0xfa => {
                if self.sb16() {
                    self.ram_8051[usize::from(self.data[0])] = self.data[1];
                }
            }
            _ => warn!(cmd, "unknown sb dsp command"),
        }

        if self.sb16() {
            self.ram_8051[0x30] = cmd;
        }
    }

    pub fn write_u8<D: DmaController>(&mut self, port: u16, value: u8, bus: &mut IsaBus<D>) {
        trace!(port, value, "sb dsp write");
        match port.wrapping_sub(self.config.base) & 0xf {
            0x6 => {
                if !self.midi.uart {
                    if value & 1 == 0 && self.reset_latch & 1 != 0 {
                        self.reset(bus);
                        self.add_data(0xaa);
                    }
                    self.reset_latch = value;
                }
                self.midi.uart = false;
                self.midi.uart_irq = false;
                self.midi.one_byte = false;
            }
            0xc => self.write_command_port(value, bus),
            _ => {}
        }
    }

    fn write_command_port<D: DmaController>(&mut self, value: u8, bus: &mut IsaBus<D>) {
        if self.midi.uart || self.midi.one_byte {
            self.midi_out.push(value);
            self.midi.one_byte = false;
            return;
        }

        self.write_busy_until_ns = bus.now_ns() + TIMER_USEC;

        if self.asp_data_len > 0 {
            self.asp_data_len -= 1;
            if self.asp_data_len == 0 {
                self.add_data(0);
            }
            return;
        }

        let collected = match self.data_stat {
            None => {
                self.command = value;
                if value == 0x01 {
                    self.add_data(0);
                }
                0
            }
            Some(n) => {
                if let Some(slot) = self.data.get_mut(usize::from(n)) {
                    *slot = value;
                }
                n + 1
            }
        };
        self.data_stat = Some(collected);

        match data_len(self.command, self.sb16()) {
            Some(need) if need != collected => {}
            _ => {
                self.exec_command(bus);
                self.data_stat = None;
            }
        }
    }

    pub fn read_u8<D>(&mut self, port: u16, bus: &mut IsaBus<D>) -> u8 {
        let value = match port.wrapping_sub(self.config.base) & 0xf {
            0xa => {
                self.last_read = self.read_data[usize::from(self.read_rp)];
                if self.read_rp != self.read_wp {
                    self.read_rp = self.read_rp.wrapping_add(1);
                }
                self.last_read
            }
            0xc => {
                self.busy_count = if self.dma8.enable || self.sb16() {
                    (self.busy_count + 1) & 3
                } else {
                    0
                };
                let latched = bus.now_ns() < self.write_busy_until_ns;
                if latched || self.busy_count & 2 != 0 {
                    0xff
                } else {
                    0x7f
                }
            }
            0xe => {
                bus.lower_irq(self.config.irq);
                self.irq_status.remove(IrqStatus::DSP_8 | IrqStatus::DSP_16);
                if self.read_rp == self.read_wp {
                    0x7f
                } else {
                    0xff
                }
            }
            0xf => {
                self.irq_status.remove(IrqStatus::DSP_16);
                if !self.irq_status.contains(IrqStatus::DSP_8) {
                    bus.lower_irq(self.config.irq);
                }
                0xff
            }
            _ => 0xff,
        };
        trace!(port, value, "sb dsp read");
        value
    }

    /// Services an expired DSP timer. Events for timers the DSP no longer owns are ignored.
    pub fn handle_timer_event<D: DmaController>(
        &mut self,
        ev: &TimerEvent<DeviceTimer>,
        bus: &mut IsaBus<D>,
    ) {
        match ev.payload {
            DeviceTimer::DspOutput if self.out_timer == Some(ev.id) => {
                let next = ev.deadline_ns + self.latch_out.max(1);
                self.out_timer = Some(bus.schedule(next, DeviceTimer::DspOutput));
                self.poll_output(bus);
            }
            DeviceTimer::DspInput if self.in_timer == Some(ev.id) => {
                let next = ev.deadline_ns + self.latch_in.max(1);
                self.in_timer = Some(bus.schedule(next, DeviceTimer::DspInput));
                self.poll_input(bus);
            }
            _ => {}
        }
    }

    fn set_mono(&mut self, sample: i16) {
        if self.stereo {
            let ch = if self.left_right { 0 } else { 1 };
            self.out[ch] = sample;
            self.left_right = !self.left_right;
        } else {
            self.out = [sample, sample];
        }
    }

    fn read_byte<D: DmaController>(&self, bus: &mut IsaBus<D>) -> Option<u8> {
        bus.dma.read(self.config.dma8).value().map(|v| v as u8)
    }

    fn read_word<D: DmaController>(&self, bus: &mut IsaBus<D>) -> Option<u16> {
        bus.dma.read(self.config.dma16).value()
    }

    fn poll_output<D: DmaController>(&mut self, bus: &mut IsaBus<D>) {
        if self.dma8.runs(true, self.pausetime) && self.output_8(bus) {
            self.end_of_block(true, bus);
        }
        if self.dma16.runs(true, self.pausetime) && self.output_16(bus) {
            self.end_of_block(false, bus);
        }

        if self.pausetime > -1 {
            self.pausetime -= 1;
            if self.pausetime < 0 {
                debug!("sb pause over");
                self.update_status(IrqStatus::DSP_8, true, bus);
                if !self.dma8.enable {
                    bus.cancel(&mut self.out_timer);
                }
            }
        }
    }

    /// One 8-bit output tick. Returns true when the block is exhausted.
    fn output_8<D: DmaController>(&mut self, bus: &mut IsaBus<D>) -> bool {
        self.update_buffer(bus.now_ns());

        match self.dma8.format {
            StreamFormat::Pcm { stereo: false, signed } => {
                let Some(b) = self.read_byte(bus) else {
                    return false;
                };
                self.set_mono(pcm8(b, signed));
                self.dma8.length -= 1;
            }
            StreamFormat::Pcm { stereo: true, signed } => {
                let l = self.read_byte(bus);
                let r = self.read_byte(bus);
                let (Some(l), Some(r)) = (l, r) else {
                    return false;
                };
                self.out = [pcm8(l, signed), pcm8(r, signed)];
                self.dma8.length -= 2;
            }
            StreamFormat::Adpcm(_) => {
                if self.adpcm_fetch_pending && !self.fetch_adpcm(bus) {
                    return false;
                }
                let sample = self.adpcm.decode_next();
                self.set_mono(sample);
                if self.adpcm.needs_byte() {
                    self.fetch_adpcm(bus);
                }
            }
        }
        self.dma8.length < 0
    }

    fn output_16<D: DmaController>(&mut self, bus: &mut IsaBus<D>) -> bool {
        self.update_buffer(bus.now_ns());

        let StreamFormat::Pcm { stereo, signed } = self.dma16.format else {
            return false;
        };
        let flip = if signed { 0 } else { 0x8000 };
        if stereo {
            let l = self.read_word(bus);
            let r = self.read_word(bus);
            let (Some(l), Some(r)) = (l, r) else {
                return false;
            };
            self.out = [(l ^ flip) as i16, (r ^ flip) as i16];
            self.dma16.length -= 2;
        } else {
            let Some(w) = self.read_word(bus) else {
                return false;
            };
            let s = (w ^ flip) as i16;
            self.out = [s, s];
            self.dma16.length -= 1;
        }
        self.dma16.length < 0
    }

    fn end_of_block<D>(&mut self, dma8: bool, bus: &mut IsaBus<D>) {
        let output;
        {
            let stream = if dma8 { &mut self.dma8 } else { &mut self.dma16 };
            output = stream.output;
            if stream.autoinit {
                stream.length = stream.block_len;
                debug!(dma8, len = stream.length, "sb autoinit reload");
            } else {
                stream.enable = false;
                debug!(dma8, "sb dma block done");
            }
        }
        let stopped = if dma8 { !self.dma8.enable } else { !self.dma16.enable };
        if stopped {
            if output {
                bus.cancel(&mut self.out_timer);
            } else {
                bus.cancel(&mut self.in_timer);
            }
        }
        let source = if dma8 {
            IrqStatus::DSP_8
        } else {
            IrqStatus::DSP_16
        };
        self.update_status(source, true, bus);
    }

    fn poll_input<D: DmaController>(&mut self, bus: &mut IsaBus<D>) {
        let mut processed = false;

        if self.dma8.runs(false, self.pausetime) {
            let StreamFormat::Pcm { stereo, signed } = self.dma8.format else {
                return;
            };
            let left = self.record[self.record_read];
            let right = self.record[(self.record_read + 1) % RECORD_BUFFER_LEN];
            let ch = self.config.dma8;
            if bus.dma.write(ch, u16::from(capture8(left, signed))).is_no_data() {
                return;
            }
            if stereo {
                // Only the left byte gates the tick; the frame counts as two bytes either way.
                bus.dma.write(ch, u16::from(capture8(right, signed)));
                self.dma8.length -= 2;
            } else {
                self.dma8.length -= 1;
            }
            self.advance_record_read();
            if self.dma8.length < 0 {
                self.end_of_block(true, bus);
            }
            processed = true;
        }

        if self.dma16.runs(false, self.pausetime) {
            let StreamFormat::Pcm { stereo, signed } = self.dma16.format else {
                return;
            };
            let flip = if signed { 0 } else { 0x8000 };
            let left = self.record[self.record_read] as u16 ^ flip;
            let right = self.record[(self.record_read + 1) % RECORD_BUFFER_LEN] as u16 ^ flip;
            let ch = self.config.dma16;
            if bus.dma.write(ch, left).is_no_data() {
                return;
            }
            if stereo {
                // As on the 8-bit path, the right word's result does not stall the tick.
                bus.dma.write(ch, right);
                self.dma16.length -= 2;
            } else {
                self.dma16.length -= 1;
            }
            self.advance_record_read();
            if self.dma16.length < 0 {
                self.end_of_block(false, bus);
            }
            processed = true;
        }

        if !processed {
            self.advance_record_read();
        }
    }

    fn advance_record_read(&mut self) {
        self.record_read = (self.record_read + 2) % RECORD_BUFFER_LEN;
    }

    /// Feeds one captured stereo frame into the record ring.
    ///
    /// SB16-class boards low-pass the capture at 44.1 kHz before it reaches the ring.
    pub fn push_record_frame(&mut self, left: i16, right: i16) {
        let (left, right) = if self.sb16() {
            let (l, r) = self.record_fir.process(f64::from(left), f64::from(right));
            (saturate_i16(l), saturate_i16(r))
        } else {
            (left, right)
        };
        self.record[self.record_write] = left;
        self.record[(self.record_write + 1) % RECORD_BUFFER_LEN] = right;
        self.record_write = (self.record_write + 2) % RECORD_BUFFER_LEN;
    }

    fn update_buffer(&mut self, now_ns: u64) {
        let frame = if self.muted { [0, 0] } else { self.out };
        self.buffer.fill_to(now_ns, frame);
    }

    /// Completes the output frame at `end_ns` and pushes it to `sink`.
    pub fn fill_frame(&mut self, end_ns: u64, sink: &mut impl AudioSink) {
        self.update_buffer(end_ns);
        let frames = self.buffer.take();
        let mut out = Vec::with_capacity(frames.len() * 2);
        for [l, r] in frames {
            let (l, r) = if self.sb16() {
                self.playback_fir.process(f64::from(l), f64::from(r))
            } else {
                (f64::from(l), f64::from(r))
            };
            out.push(to_f32(l));
            out.push(to_f32(r));
        }
        sink.push_interleaved_f32(&out);
    }

    /// MIDI bytes arriving at the DSP's MIDI input.
    pub fn midi_input<D>(&mut self, msg: &[u8], bus: &mut IsaBus<D>) {
        if self.midi.uart_irq {
            for &b in msg {
                self.add_data(b);
            }
            self.update_status(IrqStatus::DSP_8, true, bus);
        } else if self.midi.in_poll {
            for &b in msg {
                self.add_data(b);
            }
        } else {
            trace!(len = msg.len(), "sb midi input dropped");
        }
    }

    /// Drains bytes the guest sent to MIDI out.
    pub fn take_midi_out(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.midi_out)
    }

    pub fn output_frame(&self) -> StereoFrame {
        self.out
    }

    pub fn buffered_frames(&self) -> &[StereoFrame] {
        self.buffer.frames()
    }

    pub fn latch_out(&self) -> u64 {
        self.latch_out
    }

    pub fn latch_in(&self) -> u64 {
        self.latch_in
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.freq
    }

    pub fn playback_fir(&self) -> &LowPassFir {
        &self.playback_fir
    }

    pub fn record_fir(&self) -> &LowPassFir {
        &self.record_fir
    }

    pub fn speaker_on(&self) -> bool {
        self.speaker
    }

    pub fn dma8_length(&self) -> i32 {
        self.dma8.length
    }

    pub fn dma16_length(&self) -> i32 {
        self.dma16.length
    }

    pub fn dma8_active(&self) -> bool {
        self.dma8.enable
    }

    pub fn dma16_active(&self) -> bool {
        self.dma16.enable
    }

    pub fn pause_remaining(&self) -> Option<u32> {
        u32::try_from(self.pausetime).ok()
    }

    pub fn output_timer(&self) -> Option<TimerId> {
        self.out_timer
    }

    pub fn input_timer(&self) -> Option<TimerId> {
        self.in_timer
    }

    /// True while a command byte has been accepted and its data bytes are still being collected.
    pub fn command_pending(&self) -> bool {
        self.data_stat.is_some()
    }

    pub fn commands_executed(&self) -> u64 {
        self.commands_executed
    }

    pub fn ram_8051(&self, addr: u8) -> u8 {
        self.ram_8051[usize::from(addr)]
    }
}

fn latch_for_time_constant(tc: u32) -> u64 {
    if tc < 256 {
        TIMER_USEC * (256 - u64::from(tc))
    } else {
        vintage_time::latch_from_rate_hz(f64::from(tc - 256))
    }
}

#[inline]
fn pcm8(b: u8, signed: bool) -> i16 {
    let b = if signed { b } else { b ^ 0x80 };
    (u16::from(b) << 8) as i16
}

fn saturate_i16(v: f64) -> i16 {
    v.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

#[inline]
fn capture8(sample: i16, signed: bool) -> u8 {
    let b = (sample >> 8) as u8;
    if signed {
        b
    } else {
        b ^ 0x80
    }
}

impl<D: DmaController> PortIoDevice<IsaBus<D>> for SbDsp {
    fn read(&mut self, port: u16, size: u8, bus: &mut IsaBus<D>) -> u32 {
        split_read(port, size, |p| self.read_u8(p, bus))
    }

    fn write(&mut self, port: u16, size: u8, value: u32, bus: &mut IsaBus<D>) {
        split_write(port, size, value, |p, v| self.write_u8(p, v, bus));
    }

    fn reset(&mut self, bus: &mut IsaBus<D>) {
        self.full_reset(bus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FIR_TAPS;

    #[test]
    fn time_constant_latch() {
        assert_eq!(latch_for_time_constant(0), 256 * TIMER_USEC);
        assert_eq!(latch_for_time_constant(211), 45 * TIMER_USEC);
        assert_eq!(latch_for_time_constant(256 + 22_050), 45_351);
    }

    #[test]
    fn pcm8_conversion() {
        assert_eq!(pcm8(0x80, false), 0);
        assert_eq!(pcm8(0xff, false), 0x7f00);
        assert_eq!(pcm8(0x00, false), -0x8000);
        assert_eq!(pcm8(0x80, true), -0x8000);
        assert_eq!(capture8(0x7f00, false), 0xff);
        assert_eq!(capture8(-0x8000, true), 0x80);
    }

    #[test]
    fn sb16_capture_runs_through_record_filter() {
        let mut dsp = SbDsp::new(SbModel::Sb16);
        dsp.push_record_frame(0x4000, -0x4000);
        for _ in 1..FIR_TAPS {
            dsp.push_record_frame(0, 0);
        }

        // An impulse comes out as the (time-reversed) coefficient sequence.
        let coef = *dsp.record_fir().coefficients();
        for n in 0..FIR_TAPS {
            let at = RECORD_SAFETY_MARGIN + 2 * n;
            let expected = saturate_i16(16_384.0 * coef[FIR_TAPS - 1 - n]);
            assert_eq!(dsp.record[at], expected, "left tap {n}");
            assert_eq!(dsp.record[at + 1], saturate_i16(-16_384.0 * coef[FIR_TAPS - 1 - n]));
        }
        let peak = RECORD_SAFETY_MARGIN + 2 * (FIR_TAPS / 2);
        assert!(dsp.record[peak] > 0x1000);
        assert!(dsp.record[peak] < 0x4000);
    }

    #[test]
    fn pre_sb16_capture_is_stored_raw() {
        let mut dsp = SbDsp::new(SbModel::SbPro);
        dsp.push_record_frame(0x4000, -0x4000);
        assert_eq!(dsp.record[RECORD_SAFETY_MARGIN], 0x4000);
        assert_eq!(dsp.record[RECORD_SAFETY_MARGIN + 1], -0x4000);
    }

    #[test]
    fn sb16_requires_word_channel() {
        let cfg = SbConfig {
            dma16: 3,
            ..SbConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::Dma16OnByteChannel(3)));

        let pro = SbConfig {
            model: SbModel::SbPro,
            dma16: 3,
            ..SbConfig::default()
        };
        assert!(pro.validate().is_ok());
    }
}
