use crate::ConfigError;

/// A device reachable through x86 port I/O.
///
/// `C` is the shared machine context (DMA, timers, interrupt lines) passed into every access so
/// that a port write can start a transfer or raise an interrupt without the device holding
/// references to the rest of the machine.
pub trait PortIoDevice<C> {
    fn read(&mut self, port: u16, size: u8, cx: &mut C) -> u32;
    fn write(&mut self, port: u16, size: u8, value: u32, cx: &mut C);

    /// Reset the device back to its power-on state.
    fn reset(&mut self, _cx: &mut C) {}
}

/// Index of a device registered with an [`IoPortBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceSlot(usize);

impl DeviceSlot {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug)]
struct PortRange {
    start: u16,
    len: u16,
    slot: DeviceSlot,
}

impl PortRange {
    fn end_exclusive(&self) -> u32 {
        u32::from(self.start) + u32::from(self.len)
    }

    fn contains(&self, port: u16) -> bool {
        let p = u32::from(port);
        p >= u32::from(self.start) && p < self.end_exclusive()
    }
}

/// Port decoder: an arena of devices plus a sorted table of non-overlapping port ranges.
///
/// Several ranges may map to the same device, which covers boards that decode scattered port
/// windows (a DSP plus its mixer, an accelerator plus its POS registers).
pub struct IoPortBus<C> {
    devices: Vec<Box<dyn PortIoDevice<C>>>,
    ranges: Vec<PortRange>,
}

impl<C> IoPortBus<C> {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            ranges: Vec::new(),
        }
    }

    /// Adds a device to the arena without decoding any ports for it yet.
    pub fn add_device(&mut self, dev: Box<dyn PortIoDevice<C>>) -> DeviceSlot {
        self.devices.push(dev);
        DeviceSlot(self.devices.len() - 1)
    }

    /// Routes `[start, start + len)` to an already registered device.
    pub fn map_range(&mut self, start: u16, len: u16, slot: DeviceSlot) -> Result<(), ConfigError> {
        if slot.0 >= self.devices.len() {
            return Err(ConfigError::UnknownDevice(slot.0));
        }
        let idx = self.check_range(start, len)?;
        self.ranges.insert(idx, PortRange { start, len, slot });
        Ok(())
    }

    /// Validates `[start, start + len)` against the mapped ranges and returns its insert position.
    fn check_range(&self, start: u16, len: u16) -> Result<usize, ConfigError> {
        if len == 0 {
            return Err(ConfigError::EmptyPortRange { start });
        }

        let end_exclusive = u32::from(start) + u32::from(len);
        if end_exclusive > 0x1_0000 {
            return Err(ConfigError::PortRangeWraps { start, len });
        }

        let idx = self.ranges.partition_point(|r| r.start < start);

        let overlaps_prev = idx
            .checked_sub(1)
            .and_then(|i| self.ranges.get(i))
            .is_some_and(|prev| u32::from(start) < prev.end_exclusive());
        let overlaps_next = self
            .ranges
            .get(idx)
            .is_some_and(|next| end_exclusive > u32::from(next.start));
        if overlaps_prev || overlaps_next {
            return Err(ConfigError::OverlappingPortRange { start, len });
        }
        Ok(idx)
    }

    /// Registers a device and decodes a single port range for it.
    pub fn register_range(
        &mut self,
        start: u16,
        len: u16,
        dev: Box<dyn PortIoDevice<C>>,
    ) -> Result<DeviceSlot, ConfigError> {
        self.register_ranges(&[(start, len)], dev)
    }

    /// Registers a device decoding every `(start, len)` window.
    ///
    /// All windows are checked before anything is inserted, so a failure leaves the bus unchanged.
    pub fn register_ranges(
        &mut self,
        windows: &[(u16, u16)],
        dev: Box<dyn PortIoDevice<C>>,
    ) -> Result<DeviceSlot, ConfigError> {
        for (i, &(start, len)) in windows.iter().enumerate() {
            self.check_range(start, len)?;
            let end = u32::from(start) + u32::from(len);
            let clashes = windows[..i].iter().any(|&(s, l)| {
                u32::from(start) < u32::from(s) + u32::from(l) && u32::from(s) < end
            });
            if clashes {
                return Err(ConfigError::OverlappingPortRange { start, len });
            }
        }

        let slot = self.add_device(dev);
        for &(start, len) in windows {
            self.map_range(start, len, slot)?;
        }
        Ok(slot)
    }

    /// Removes the range starting at `start`. The device stays in the arena.
    pub fn unmap_range(&mut self, start: u16) -> Option<DeviceSlot> {
        let idx = self.ranges.iter().position(|r| r.start == start)?;
        Some(self.ranges.remove(idx).slot)
    }

    fn find_slot(&self, port: u16) -> Option<DeviceSlot> {
        let idx = self.ranges.partition_point(|r| r.start <= port);
        let cand = self.ranges.get(idx.checked_sub(1)?)?;
        cand.contains(port).then_some(cand.slot)
    }

    pub fn read(&mut self, port: u16, size: u8, cx: &mut C) -> u32 {
        // Zero-sized accesses are not representable by the ISA; treat them as no-ops.
        if size == 0 {
            return 0;
        }
        // Only {1, 2, 4} exist on x86. Anything else floats the bus high.
        if !matches!(size, 1 | 2 | 4) {
            return 0xFFFF_FFFF;
        }

        if let Some(slot) = self.find_slot(port) {
            if let Some(dev) = self.devices.get_mut(slot.0) {
                return dev.read(port, size, cx);
            }
        }

        match size {
            1 => 0xFF,
            2 => 0xFFFF,
            _ => 0xFFFF_FFFF,
        }
    }

    pub fn write(&mut self, port: u16, size: u8, value: u32, cx: &mut C) {
        if !matches!(size, 1 | 2 | 4) {
            return;
        }
        let Some(slot) = self.find_slot(port) else {
            tracing::trace!(port, size, value, "write to unmapped port");
            return;
        };
        if let Some(dev) = self.devices.get_mut(slot.0) {
            dev.write(port, size, value, cx);
        }
    }

    pub fn read_u8(&mut self, port: u16, cx: &mut C) -> u8 {
        self.read(port, 1, cx) as u8
    }

    pub fn write_u8(&mut self, port: u16, value: u8, cx: &mut C) {
        self.write(port, 1, u32::from(value), cx);
    }

    pub fn reset(&mut self, cx: &mut C) {
        for dev in self.devices.iter_mut() {
            dev.reset(cx);
        }
    }
}

impl<C> Default for IoPortBus<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits a 16/32-bit port access into consecutive byte accesses, low byte first.
///
/// Most ISA peripherals decode only 8-bit cycles; the bus adapter performs the split.
pub fn split_read(port: u16, size: u8, mut read_u8: impl FnMut(u16) -> u8) -> u32 {
    let mut value = 0u32;
    for i in 0..u16::from(size.min(4)) {
        value |= u32::from(read_u8(port.wrapping_add(i))) << (8 * i);
    }
    value
}

/// Byte-wise counterpart of [`split_read`].
pub fn split_write(port: u16, size: u8, value: u32, mut write_u8: impl FnMut(u16, u8)) {
    for i in 0..u16::from(size.min(4)) {
        write_u8(port.wrapping_add(i), (value >> (8 * i)) as u8);
    }
}
