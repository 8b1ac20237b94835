//! Machine-side plumbing shared by ISA device models: port decode, DMA, IRQ lines and the
//! [`IsaBus`] resource bundle handed to devices on every access.

pub mod dma;
pub mod io;
pub mod irq;

pub use dma::{DmaController, DmaTransfer, Isa8237};
pub use io::{DeviceSlot, IoPortBus, PortIoDevice};
pub use irq::IrqLines;

use vintage_time::{Clock, Interrupt, InterruptSink, TimerEvent, TimerId, TimerQueue};

/// Identifies which device timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceTimer {
    DspOutput,
    DspInput,
    CodecPoll,
    XgaScanline,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("I/O port range at {start:#x} has zero length")]
    EmptyPortRange { start: u16 },
    #[error("I/O port range wraps past 0xFFFF: start={start:#x} len={len:#x}")]
    PortRangeWraps { start: u16, len: u16 },
    #[error("I/O port range overlaps an existing mapping: start={start:#x} len={len:#x}")]
    OverlappingPortRange { start: u16, len: u16 },
    #[error("no device registered in slot {0}")]
    UnknownDevice(usize),
    #[error("IRQ {0} is not an ISA interrupt line")]
    InvalidIrq(u8),
    #[error("DMA channel {0} does not exist")]
    InvalidDmaChannel(u8),
}

pub fn validate_irq(irq: u8) -> Result<u8, ConfigError> {
    if usize::from(irq) < irq::ISA_IRQ_LINES {
        Ok(irq)
    } else {
        Err(ConfigError::InvalidIrq(irq))
    }
}

pub fn validate_dma_channel(channel: u8) -> Result<u8, ConfigError> {
    if channel < 8 {
        Ok(channel)
    } else {
        Err(ConfigError::InvalidDmaChannel(channel))
    }
}

/// Resources a device may touch while servicing a port access or a timer event.
pub struct IsaBus<D = Isa8237> {
    pub clock: Clock,
    pub timers: TimerQueue<DeviceTimer>,
    pub dma: D,
    pub irq: IrqLines,
}

impl IsaBus<Isa8237> {
    /// A bus with an 8237 pair over `memory_size` bytes of guest memory.
    pub fn new(memory_size: usize) -> Self {
        Self::with_dma(Isa8237::new(memory_size))
    }
}

impl<D> IsaBus<D> {
    pub fn with_dma(dma: D) -> Self {
        Self {
            clock: Clock::new(),
            timers: TimerQueue::new(),
            dma,
            irq: IrqLines::new(),
        }
    }

    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    pub fn raise_irq(&mut self, irq: u8) {
        let now = self.clock.now_ns();
        self.irq.raise(Interrupt::Irq(irq), now);
    }

    pub fn lower_irq(&mut self, irq: u8) {
        let now = self.clock.now_ns();
        self.irq.lower(Interrupt::Irq(irq), now);
    }

    /// Schedules `timer` at an absolute deadline.
    pub fn schedule(&mut self, deadline_ns: u64, timer: DeviceTimer) -> TimerId {
        self.timers.schedule(deadline_ns, timer)
    }

    pub fn cancel(&mut self, id: &mut Option<TimerId>) {
        if let Some(id) = id.take() {
            self.timers.cancel(id);
        }
    }

    pub fn is_armed(&self, id: Option<TimerId>) -> bool {
        id.is_some_and(|id| self.timers.is_armed(id))
    }

    /// Pops the next timer due at or before `until_ns` and moves the clock to its deadline.
    pub fn next_event(&mut self, until_ns: u64) -> Option<TimerEvent<DeviceTimer>> {
        let ev = self.timers.pop_due(until_ns)?;
        if ev.deadline_ns > self.clock.now_ns() {
            self.clock.set_now_ns(ev.deadline_ns);
        }
        Some(ev)
    }
}

impl Default for IsaBus<Isa8237> {
    fn default() -> Self {
        Self::new(16 * 1024 * 1024)
    }
}
