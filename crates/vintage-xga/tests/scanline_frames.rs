use vintage_platform::IsaBus;
use vintage_xga::display::rgba;
use vintage_xga::{Framebuffer, Xga, XgaKind};

const EXT: u16 = 0x2160;
const WIDTH: u32 = 64;
const HEIGHT: u32 = 16;
const MAX_EVENTS: usize = 10_000;

const BLACK: u32 = 0xff00_0000;

fn write_index(xga: &mut Xga, bus: &mut IsaBus, index: u8, value: u8) {
    xga.write_u8(EXT + 0x0a, index, bus);
    xga.write_u8(EXT + 0x0b, value, bus);
}

/// A 64x16 8 bpp mode: 80 pixel clocks per line, 20 lines per frame.
fn small_mode(bus: &mut IsaBus) -> Xga {
    let mut xga = Xga::new(XgaKind::Xga);
    for (index, value) in [
        (0x10, 9),
        (0x12, 7),
        (0x20, 19),
        (0x22, HEIGHT as u8 - 1),
        (0x24, HEIGHT as u8 - 1),
        (0x28, 17),
    ] {
        write_index(&mut xga, bus, index, value);
    }
    // Palette entry 1.
    write_index(&mut xga, bus, 0x60, 1);
    xga.write_u8(EXT + 0x0a, 0x65, bus);
    for c in [0x10, 0x20, 0x30] {
        xga.write_u8(EXT + 0x0b, c, bus);
    }
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            xga.vram_write(y * WIDTH + x, (y % 2) as u8);
        }
    }
    write_index(&mut xga, bus, 0x51, 0x03);
    xga
}

fn next_frame(xga: &mut Xga, bus: &mut IsaBus) -> Framebuffer {
    for _ in 0..MAX_EVENTS {
        let ev = bus.next_event(u64::MAX).expect("scanline timer armed");
        xga.handle_timer_event(&ev, bus);
        if let Some(frame) = xga.take_frame() {
            return frame;
        }
    }
    panic!("no frame completed");
}

#[test]
fn eight_bpp_frame_goes_through_palette() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = small_mode(&mut bus);
    let frame = next_frame(&mut xga, &mut bus);

    assert_eq!((frame.width, frame.height), (WIDTH, HEIGHT));
    let lit = rgba(0x10, 0x20, 0x30);
    for y in 0..HEIGHT {
        let expected = if y % 2 == 1 { lit } else { BLACK };
        assert!(frame.row(y).iter().all(|&p| p == expected), "row {y}");
    }
    assert!(frame.dirty.iter().all(|&d| d));
}

#[test]
fn scanline_timer_paces_lines() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = small_mode(&mut bus);
    let line_ns = xga.display().timings().line_ns();

    let start = bus.now_ns();
    next_frame(&mut xga, &mut bus);
    let first = bus.now_ns();
    next_frame(&mut xga, &mut bus);
    let second = bus.now_ns();

    // Twenty lines between successive vertical syncs.
    assert_eq!(second - first, 20 * line_ns);
    assert!(first > start);
}

#[test]
fn unchanged_frames_are_not_redrawn() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = small_mode(&mut bus);
    next_frame(&mut xga, &mut bus);
    next_frame(&mut xga, &mut bus);
    let idle = next_frame(&mut xga, &mut bus);
    assert!(idle.dirty.iter().all(|&d| !d));

    xga.vram_write(2 * WIDTH + 5, 1);
    let changed = next_frame(&mut xga, &mut bus);
    assert!(changed.dirty[2]);
    assert_eq!(changed.row(2)[5], rgba(0x10, 0x20, 0x30));
    assert_eq!(changed.row(2)[4], BLACK);
}

#[test]
fn palette_write_forces_full_redraw() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = small_mode(&mut bus);
    for _ in 0..3 {
        next_frame(&mut xga, &mut bus);
    }
    write_index(&mut xga, &mut bus, 0x60, 1);
    xga.write_u8(EXT + 0x0a, 0x65, &mut bus);
    for c in [0xff, 0x00, 0x00] {
        xga.write_u8(EXT + 0x0b, c, &mut bus);
    }
    let frame = next_frame(&mut xga, &mut bus);
    assert!(frame.dirty.iter().all(|&d| d));
    assert_eq!(frame.row(1)[0], rgba(0xff, 0, 0));
}

#[test]
fn sixteen_bpp_expands_rgb565() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = small_mode(&mut bus);
    for x in 0..WIDTH {
        let [lo, hi] = 0xf800u16.to_le_bytes();
        xga.vram_write(2 * x, lo);
        xga.vram_write(2 * x + 1, hi);
    }
    write_index(&mut xga, &mut bus, 0x51, 0x04);
    let frame = next_frame(&mut xga, &mut bus);
    assert!(frame.row(0).iter().all(|&p| p == rgba(0xff, 0, 0)));
}

#[test]
fn hardware_cursor_composites_over_the_frame() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = small_mode(&mut bus);

    // Sprite: first byte inverts pixels 0-3 of row 0, everything else shows colour 0.
    write_index(&mut xga, &mut bus, 0x60, 0);
    write_index(&mut xga, &mut bus, 0x61, 0);
    xga.write_u8(EXT + 0x0a, 0x6a, &mut bus);
    xga.write_u8(EXT + 0x0b, 0xff, &mut bus);
    for _ in 1..0x400 {
        xga.write_u8(EXT + 0x0b, 0x00, &mut bus);
    }
    write_index(&mut xga, &mut bus, 0x3a, 0xff);
    write_index(&mut xga, &mut bus, 0x36, 0x01);

    // The cursor position latches at the start of the next frame.
    next_frame(&mut xga, &mut bus);
    let frame = next_frame(&mut xga, &mut bus);

    let red = rgba(0xff, 0, 0);
    let inverted_black = BLACK ^ 0x00ff_ffff;
    assert!(frame.row(0)[..4].iter().all(|&p| p == inverted_black));
    assert!(frame.row(0)[4..].iter().all(|&p| p == red));
    for y in 1..HEIGHT {
        assert!(frame.row(y).iter().all(|&p| p == red), "row {y}");
    }
}

#[test]
fn leaving_extended_mode_stops_the_timer() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = small_mode(&mut bus);
    assert!(xga.display().timer().is_some());

    write_index(&mut xga, &mut bus, 0x51, 0x00);
    assert!(xga.display().timer().is_none());
    assert!(bus.next_event(u64::MAX).is_none());
}
