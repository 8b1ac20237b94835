use vintage_xga::{Xga, XgaKind};

const MMIO: u32 = 0x1800;
const SIDE: u32 = 128;
const INK: u8 = 0x7e;

const DRAW: u8 = 0x10;

fn reg(xga: &mut Xga, offset: u32, value: u32, size: u8) {
    xga.write_register(MMIO + offset, value, size);
}

fn canvas(draw_mode: u32) -> Xga {
    let mut xga = Xga::new(XgaKind::Xga);
    reg(&mut xga, 0x12, 1, 1);
    reg(&mut xga, 0x14, 0, 4);
    reg(&mut xga, 0x18, SIDE - 1, 2);
    reg(&mut xga, 0x1a, SIDE - 1, 2);
    reg(&mut xga, 0x1c, 3, 1);
    reg(&mut xga, 0x4a, 4, 1);
    reg(&mut xga, 0x50, 0xff, 4);
    reg(&mut xga, 0x58, u32::from(INK), 4);
    reg(&mut xga, 0x48, 0x03, 1);
    // Short-stroke write, destination map 1, foreground pattern.
    reg(&mut xga, 0x7c, (4 << 24) | (1 << 16) | (8 << 12) | (draw_mode << 4), 4);
    xga
}

fn at(xga: &Xga, x: i32, y: i32) -> u8 {
    xga.vram_read(y as u32 * SIDE + x as u32)
}

fn dst(xga: &Xga) -> (i32, i32) {
    (
        xga.read_register(MMIO + 0x78, 2) as i32,
        xga.read_register(MMIO + 0x7a, 2) as i32,
    )
}

fn inked(xga: &Xga) -> usize {
    (0..SIDE * SIDE).filter(|&a| xga.vram_read(a) == INK).count()
}

#[test]
fn every_direction_code_steps_its_way() {
    let steps = [
        (1, 0),
        (1, -1),
        (0, -1),
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];
    for (code, (sx, sy)) in steps.into_iter().enumerate() {
        let mut xga = canvas(0);
        reg(&mut xga, 0x78, 50 | (50 << 16), 4);
        let vector = ((code as u8) << 5) | DRAW | 2;
        reg(&mut xga, 0x2c, u32::from(vector), 4);

        for i in 0..=2 {
            assert_eq!(at(&xga, 50 + i * sx, 50 + i * sy), INK, "code {code} step {i}");
        }
        assert_eq!(inked(&xga), 3, "code {code}");
        assert_eq!(dst(&xga), (50 + 2 * sx, 50 + 2 * sy), "code {code}");
    }
}

#[test]
fn four_vectors_run_low_byte_first() {
    let mut xga = canvas(0);
    reg(&mut xga, 0x78, 10 | (10 << 16), 4);
    // Right 3, then down 2 without drawing, then up-left 1, then a zero-length move stroke.
    let vectors = [DRAW | 3, (6 << 5) | 2, (3 << 5) | DRAW | 1, 0];
    reg(&mut xga, 0x2c, u32::from_le_bytes(vectors), 4);

    for x in 10..=13 {
        assert_eq!(at(&xga, x, 10), INK);
    }
    assert_eq!(at(&xga, 13, 11), 0);
    assert_eq!(at(&xga, 13, 12), INK);
    assert_eq!(at(&xga, 12, 11), INK);
    assert_eq!(inked(&xga), 6);
    assert_eq!(dst(&xga), (12, 11));
}

#[test]
fn byte_writes_do_not_trigger() {
    let mut xga = canvas(0);
    reg(&mut xga, 0x78, 10 | (10 << 16), 4);
    reg(&mut xga, 0x2c, u32::from(DRAW | 3), 1);
    reg(&mut xga, 0x2c, u32::from(DRAW | 3), 2);
    assert_eq!(inked(&xga), 0);
    assert_eq!(dst(&xga), (10, 10));
}

#[test]
fn skip_first_leaves_the_start_point() {
    let mut xga = canvas(1);
    reg(&mut xga, 0x78, 20 | (20 << 16), 4);
    reg(&mut xga, 0x2c, u32::from(DRAW | 3), 4);

    assert_eq!(at(&xga, 20, 20), 0);
    for x in 21..=23 {
        assert_eq!(at(&xga, x, 20), INK);
    }
}

#[test]
fn skip_last_leaves_the_end_point() {
    let mut xga = canvas(2);
    reg(&mut xga, 0x78, 20 | (20 << 16), 4);
    reg(&mut xga, 0x2c, u32::from(DRAW | 3), 4);

    for x in 20..=22 {
        assert_eq!(at(&xga, x, 20), INK);
    }
    assert_eq!(at(&xga, 23, 20), 0);
    assert_eq!(dst(&xga), (23, 20));
}
