//! Video memory with per-page change tracking.

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Frames a written page stays "changed" for the renderer.
pub(crate) const CHANGE_FRAMES: u8 = 2;

#[derive(Debug, Clone)]
pub struct Vram {
    data: Vec<u8>,
    mask: u32,
    changed: Vec<u8>,
}

impl Vram {
    /// `size` must be a power of two; the caller validates it.
    pub fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            data: vec![0; size],
            mask: (size - 1) as u32,
            changed: vec![0; size.div_ceil(PAGE_SIZE)],
        }
    }

    #[inline]
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn read(&self, addr: u32) -> u8 {
        self.data[(addr & self.mask) as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u32, value: u8) {
        let at = addr & self.mask;
        self.data[at as usize] = value;
        self.changed[(at >> PAGE_SHIFT) as usize] = CHANGE_FRAMES;
    }

    pub fn read_u16_le(&self, addr: u32) -> u16 {
        u16::from_le_bytes([self.read(addr), self.read(addr.wrapping_add(1))])
    }

    pub fn write_u16_le(&mut self, addr: u32, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write(addr, lo);
        self.write(addr.wrapping_add(1), hi);
    }

    /// Whether any page overlapping `[addr, addr + len)` changed recently.
    pub fn range_changed(&self, addr: u32, len: u32) -> bool {
        if len == 0 {
            return false;
        }
        self.pages_in(addr, len).any(|page| self.changed[page] != 0)
    }

    pub fn page_changed(&self, page: usize) -> bool {
        self.changed.get(page).is_some_and(|&c| c != 0)
    }

    /// Ages the change counters once per displayed frame.
    pub(crate) fn age_changes(&mut self) {
        for c in &mut self.changed {
            *c = c.saturating_sub(1);
        }
    }

    pub(crate) fn mark_changed(&mut self, addr: u32, len: u32) {
        if len == 0 {
            return;
        }
        for page in self.pages_in(addr, len) {
            self.changed[page] = CHANGE_FRAMES;
        }
    }

    /// Page indices touched by `[addr, addr + len)`, wrapping at the end of VRAM.
    fn pages_in(&self, addr: u32, len: u32) -> impl Iterator<Item = usize> {
        let pages = self.changed.len();
        let start = addr & self.mask;
        let last = u64::from(start) + u64::from(len) - 1;
        let count = ((last >> PAGE_SHIFT) - u64::from(start >> PAGE_SHIFT) + 1).min(pages as u64);
        let first = (start >> PAGE_SHIFT) as usize;
        (0..count as usize).map(move |i| (first + i) % pages)
    }
}
