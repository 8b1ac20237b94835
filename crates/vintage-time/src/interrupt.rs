/// An interrupt request produced by a device model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interrupt {
    /// ISA IRQ line 0..=15.
    Irq(u8),
}

/// Level-triggered interrupt input.
///
/// `raise` asserts the line and `lower` deasserts it. Both are idempotent: raising an already
/// asserted line is not a new edge.
pub trait InterruptSink {
    fn raise(&mut self, irq: Interrupt, at_ns: u64);
    fn lower(&mut self, irq: Interrupt, at_ns: u64);
}

/// Sink that drops every request. Useful for devices driven without an interrupt controller.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullInterruptSink;

impl InterruptSink for NullInterruptSink {
    fn raise(&mut self, _irq: Interrupt, _at_ns: u64) {}
    fn lower(&mut self, _irq: Interrupt, _at_ns: u64) {}
}
