use vintage_time::{Interrupt, InterruptSink};

pub const ISA_IRQ_LINES: usize = 16;

/// Level state of the sixteen ISA interrupt lines.
///
/// Stands in for the interrupt controller: it latches levels and counts rising edges, which is
/// what device tests observe.
#[derive(Clone, Debug, Default)]
pub struct IrqLines {
    asserted: u16,
    rising_edges: [u32; ISA_IRQ_LINES],
    last_change_ns: [u64; ISA_IRQ_LINES],
}

impl IrqLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_asserted(&self, irq: u8) -> bool {
        usize::from(irq) < ISA_IRQ_LINES && self.asserted & (1 << irq) != 0
    }

    /// Number of low-to-high transitions seen on `irq`.
    pub fn assert_count(&self, irq: u8) -> u32 {
        self.rising_edges
            .get(usize::from(irq))
            .copied()
            .unwrap_or(0)
    }

    pub fn last_change_ns(&self, irq: u8) -> Option<u64> {
        self.last_change_ns.get(usize::from(irq)).copied()
    }

    pub fn levels(&self) -> u16 {
        self.asserted
    }
}

impl InterruptSink for IrqLines {
    fn raise(&mut self, irq: Interrupt, at_ns: u64) {
        let Interrupt::Irq(line) = irq;
        let idx = usize::from(line);
        if idx >= ISA_IRQ_LINES {
            return;
        }
        if self.asserted & (1 << line) == 0 {
            self.asserted |= 1 << line;
            self.rising_edges[idx] = self.rising_edges[idx].saturating_add(1);
            self.last_change_ns[idx] = at_ns;
            tracing::trace!(irq = line, at_ns, "irq raised");
        }
    }

    fn lower(&mut self, irq: Interrupt, at_ns: u64) {
        let Interrupt::Irq(line) = irq;
        let idx = usize::from(line);
        if idx >= ISA_IRQ_LINES {
            return;
        }
        if self.asserted & (1 << line) != 0 {
            self.asserted &= !(1 << line);
            self.last_change_ns[idx] = at_ns;
            tracing::trace!(irq = line, at_ns, "irq lowered");
        }
    }
}
