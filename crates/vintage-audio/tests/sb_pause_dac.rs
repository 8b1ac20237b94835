use vintage_audio::{SbDsp, SbModel};
use vintage_platform::dma::{MODE_AUTOINIT, MODE_SINGLE, MODE_TRANSFER_READ};
use vintage_platform::IsaBus;
use vintage_time::TIMER_USEC;

const WRITE: u16 = 0x22c;
const IRQ: u8 = 5;
const DMA_ADDR: u32 = 0x1000;
const PAUSE_TICKS: u8 = 5;

fn tick(dsp: &mut SbDsp, bus: &mut IsaBus) {
    let ev = bus.next_event(u64::MAX).expect("output timer armed");
    dsp.handle_timer_event(&ev, bus);
}

fn send(dsp: &mut SbDsp, bus: &mut IsaBus, bytes: &[u8]) {
    for &b in bytes {
        dsp.write_u8(WRITE, b, bus);
    }
}

fn unsigned8(b: u8) -> i16 {
    (u16::from(b ^ 0x80) << 8) as i16
}

fn ramp_byte(i: usize) -> u8 {
    (i * 0x10) as u8
}

fn playing_dsp() -> (SbDsp, IsaBus) {
    let mut dsp = SbDsp::new(SbModel::Sb16);
    let mut bus = IsaBus::new(0x1_0000);
    for i in 0..16 {
        bus.dma.memory_mut()[DMA_ADDR as usize + i] = ramp_byte(i);
    }
    bus.dma
        .program_channel(1, MODE_TRANSFER_READ | MODE_AUTOINIT | MODE_SINGLE, DMA_ADDR, 15);

    send(&mut dsp, &mut bus, &[0x40, 0xd3]);
    assert_eq!(dsp.latch_out(), 45 * TIMER_USEC);
    send(&mut dsp, &mut bus, &[0x48, 0x0f, 0x00, 0x1c]);
    (dsp, bus)
}

#[test]
fn pause_freezes_output_then_interrupts_then_resumes() {
    let (mut dsp, mut bus) = playing_dsp();
    for i in 0..3 {
        tick(&mut dsp, &mut bus);
        assert_eq!(dsp.output_frame(), [unsigned8(ramp_byte(i)); 2]);
    }
    assert_eq!(dsp.dma8_length(), 12);

    send(&mut dsp, &mut bus, &[0x80, PAUSE_TICKS, 0x00]);
    assert_eq!(dsp.pause_remaining(), Some(u32::from(PAUSE_TICKS)));

    let frozen = [unsigned8(ramp_byte(2)); 2];
    for n in 0..PAUSE_TICKS {
        tick(&mut dsp, &mut bus);
        assert_eq!(dsp.output_frame(), frozen, "pause tick {n}");
        assert_eq!(dsp.dma8_length(), 12);
        assert_eq!(bus.irq.assert_count(IRQ), 0);
    }

    tick(&mut dsp, &mut bus);
    assert_eq!(bus.irq.assert_count(IRQ), 1);
    assert!(bus.irq.is_asserted(IRQ));
    assert_eq!(dsp.output_frame(), frozen);
    assert_eq!(dsp.pause_remaining(), None);

    tick(&mut dsp, &mut bus);
    assert_eq!(dsp.output_frame(), [unsigned8(ramp_byte(3)); 2]);
    assert_eq!(dsp.dma8_length(), 11);
}

#[test]
fn pause_without_dma_stops_timer_after_interrupt() {
    let mut dsp = SbDsp::new(SbModel::SbPro2);
    let mut bus = IsaBus::new(0x1_0000);

    send(&mut dsp, &mut bus, &[0x40, 0xd3, 0x80, 2, 0]);
    assert!(bus.is_armed(dsp.output_timer()));

    for _ in 0..2 {
        tick(&mut dsp, &mut bus);
        assert_eq!(bus.irq.assert_count(IRQ), 0);
    }
    tick(&mut dsp, &mut bus);
    assert_eq!(bus.irq.assert_count(IRQ), 1);
    assert_eq!(dsp.output_timer(), None);
    assert!(bus.next_event(u64::MAX).is_none());
}

#[test]
fn ticks_arrive_one_latch_apart() {
    let (mut dsp, mut bus) = playing_dsp();
    let t0 = bus.now_ns();
    for n in 1..=4u64 {
        tick(&mut dsp, &mut bus);
        assert_eq!(bus.now_ns(), t0 + n * 45 * TIMER_USEC);
    }
}
