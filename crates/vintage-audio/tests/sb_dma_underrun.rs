use proptest::prelude::*;
use vintage_audio::{SbDsp, SbModel};
use vintage_platform::{DmaController, DmaTransfer, IsaBus};

const WRITE: u16 = 0x22c;
const IRQ: u8 = 5;

/// DMA controller with no channel ever ready.
#[derive(Default)]
struct Starved {
    reads: u32,
    writes: u32,
}

impl DmaController for Starved {
    fn read(&mut self, _channel: u8) -> DmaTransfer {
        self.reads += 1;
        DmaTransfer::NoData
    }

    fn write(&mut self, _channel: u8, _value: u16) -> DmaTransfer {
        self.writes += 1;
        DmaTransfer::NoData
    }
}

fn send(dsp: &mut SbDsp, bus: &mut IsaBus<Starved>, bytes: &[u8]) {
    for &b in bytes {
        dsp.write_u8(WRITE, b, bus);
    }
}

fn run_ticks(dsp: &mut SbDsp, bus: &mut IsaBus<Starved>, ticks: usize) {
    for _ in 0..ticks {
        let Some(ev) = bus.next_event(u64::MAX) else {
            break;
        };
        dsp.handle_timer_event(&ev, bus);
    }
}

/// Start sequences that need a DMA channel, with their 16-bit length at the end.
fn start_command(kind: u8, len: u16) -> Vec<u8> {
    let [lo, hi] = len.to_le_bytes();
    match kind {
        0 => vec![0x14, lo, hi],
        1 => vec![0x48, lo, hi, 0x1c],
        2 => vec![0x74, lo, hi],
        3 => vec![0x75, lo, hi],
        4 => vec![0x17, lo, hi],
        5 => vec![0x77, lo, hi],
        6 => vec![0xc0, 0x00, lo, hi],
        7 => vec![0xc6, 0x20, lo, hi],
        8 => vec![0xb0, 0x10, lo, hi],
        9 => vec![0xb6, 0x30, lo, hi],
        10 => vec![0x24, lo, hi],
        11 => vec![0xc8, 0x00, lo, hi],
        _ => vec![0xbe, 0x30, lo, hi],
    }
}

#[test]
fn starved_8bit_playback_holds_length() {
    let mut dsp = SbDsp::new(SbModel::Sb16);
    let mut bus = IsaBus::with_dma(Starved::default());
    send(&mut dsp, &mut bus, &[0x40, 0xd3, 0x14, 0x03, 0x00]);

    run_ticks(&mut dsp, &mut bus, 32);
    assert_eq!(dsp.dma8_length(), 3);
    assert!(dsp.dma8_active());
    assert_eq!(bus.irq.assert_count(IRQ), 0);
    assert!(bus.dma.reads >= 32);
}

#[test]
fn starved_capture_keeps_retrying() {
    let mut dsp = SbDsp::new(SbModel::Sb16);
    let mut bus = IsaBus::with_dma(Starved::default());
    send(&mut dsp, &mut bus, &[0x40, 0xd3, 0xbe, 0x30, 0x01, 0x00]);

    run_ticks(&mut dsp, &mut bus, 16);
    assert_eq!(dsp.dma16_length(), 1);
    assert!(bus.is_armed(dsp.input_timer()));
    assert_eq!(bus.dma.writes, 16);
}

/// Accepts the first write of every pair and refuses the second.
#[derive(Default)]
struct HalfReady {
    writes: u32,
}

impl DmaController for HalfReady {
    fn read(&mut self, _channel: u8) -> DmaTransfer {
        DmaTransfer::NoData
    }

    fn write(&mut self, _channel: u8, value: u16) -> DmaTransfer {
        self.writes += 1;
        if self.writes % 2 == 1 {
            DmaTransfer::Data { value, terminal_count: false }
        } else {
            DmaTransfer::NoData
        }
    }
}

#[test]
fn stereo_capture_counts_the_frame_when_only_left_lands() {
    let mut dsp = SbDsp::new(SbModel::Sb16);
    let mut bus = IsaBus::with_dma(HalfReady::default());
    for &b in &[0x40, 0xd3, 0xc8, 0x20, 0x07, 0x00] {
        dsp.write_u8(WRITE, b, &mut bus);
    }

    for _ in 0..2 {
        let ev = bus.next_event(u64::MAX).unwrap();
        dsp.handle_timer_event(&ev, &mut bus);
    }
    assert_eq!(bus.dma.writes, 4);
    assert_eq!(dsp.dma8_length(), 3);
    assert_eq!(bus.irq.assert_count(IRQ), 0);
}

proptest! {
    #[test]
    fn no_data_never_underflows_or_interrupts(
        kind in 0u8..13,
        len in 0u16..64,
        ticks in 1usize..200,
    ) {
        let mut dsp = SbDsp::new(SbModel::Sb16);
        let mut bus = IsaBus::with_dma(Starved::default());
        send(&mut dsp, &mut bus, &[0x40, 0xf0]);
        send(&mut dsp, &mut bus, &start_command(kind, len));
        let start8 = dsp.dma8_length();
        let start16 = dsp.dma16_length();

        run_ticks(&mut dsp, &mut bus, ticks);

        prop_assert!(dsp.dma8_length() >= 0);
        prop_assert!(dsp.dma16_length() >= 0);
        prop_assert_eq!(dsp.dma8_length(), start8);
        prop_assert_eq!(dsp.dma16_length(), start16);
        prop_assert_eq!(bus.irq.assert_count(IRQ), 0);
    }
}
