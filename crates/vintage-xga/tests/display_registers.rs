use vintage_platform::{IoPortBus, IsaBus};
use vintage_xga::display::rgba;
use vintage_xga::{DisplayMode, Xga, XgaConfig, XgaKind};

const EXT: u16 = 0x2160;
const INDEX: u16 = EXT + 0x0a;
const DATA: u16 = EXT + 0x0b;

fn write_index(xga: &mut Xga, bus: &mut IsaBus, index: u8, value: u8) {
    xga.write_u8(INDEX, index, bus);
    xga.write_u8(DATA, value, bus);
}

fn read_index(xga: &mut Xga, bus: &mut IsaBus, index: u8) -> u8 {
    xga.write_u8(INDEX, index, bus);
    xga.read_u8(DATA, bus)
}

#[test]
fn id_registers_follow_board_kind() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);
    assert_eq!(read_index(&mut xga, &mut bus, 0x52), 0xea);
    assert_eq!(read_index(&mut xga, &mut bus, 0x53), 0x30);

    let mut xga = Xga::new(XgaKind::Xga2);
    assert_eq!(read_index(&mut xga, &mut bus, 0x52), 0xfa);
    assert_eq!(read_index(&mut xga, &mut bus, 0x53), 0x53);
}

#[test]
fn pos_registers_report_board_and_instance() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);
    assert_eq!(xga.read_u8(0x100, &mut bus), 0xdb);
    assert_eq!(xga.read_u8(0x101, &mut bus), 0x8f);
    assert_eq!(xga.read_u8(0x102, &mut bus), 0xfd);
    assert_eq!(xga.read_u8(0x103, &mut bus) & 1, 1);
    assert_eq!(xga.read_u8(0x104, &mut bus), 0x03);

    let mut xga2 = Xga::new(XgaKind::Xga2);
    assert_eq!(xga2.read_u8(0x100, &mut bus), 0xda);
}

#[test]
fn attach_decodes_extended_window_and_pos() {
    let mut bus = IsaBus::new(0x1000);
    let mut io = IoPortBus::new();
    let config = XgaConfig {
        instance: 2,
        ..XgaConfig::default()
    };
    Xga::try_new(config).unwrap().attach(&mut io).unwrap();

    io.write_u8(0x2120 + 0x0a, 0x52, &mut bus);
    assert_eq!(io.read_u8(0x2120 + 0x0b, &mut bus), 0xea);
    assert_eq!(io.read_u8(0x100, &mut bus), 0xdb);
    assert_eq!(io.read_u8(0x102, &mut bus), 0xf5);
    // Word access through the bus splits into bytes.
    assert_eq!(io.read(0x100, 2, &mut bus), 0x8fdb);
}

#[test]
fn unlisted_indices_read_back_last_write() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);
    write_index(&mut xga, &mut bus, 0x7e, 0x42);
    assert_eq!(read_index(&mut xga, &mut bus, 0x7e), 0x42);
    // Every data port reaches the indexed register.
    xga.write_u8(INDEX, 0x7e, &mut bus);
    assert_eq!(xga.read_u8(EXT + 0x0f, &mut bus), 0x42);
}

#[test]
fn display_control_1_reads_with_bit_5() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);
    write_index(&mut xga, &mut bus, 0x50, 0x01);
    assert_eq!(read_index(&mut xga, &mut bus, 0x50), 0x21);
}

#[test]
fn palette_auto_increments_through_rgb_triples() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);
    write_index(&mut xga, &mut bus, 0x60, 5);
    xga.write_u8(INDEX, 0x65, &mut bus);
    for value in [0x10, 0x20, 0x30, 0x40, 0x50, 0x60] {
        xga.write_u8(DATA, value, &mut bus);
    }
    assert_eq!(xga.display().palette_entry(5), [0x10, 0x20, 0x30]);
    assert_eq!(xga.display().palette_entry(6), [0x40, 0x50, 0x60]);

    write_index(&mut xga, &mut bus, 0x60, 6);
    xga.write_u8(INDEX, 0x65, &mut bus);
    let read: Vec<u8> = (0..3).map(|_| xga.read_u8(DATA, &mut bus)).collect();
    assert_eq!(read, [0x40, 0x50, 0x60]);
}

#[test]
fn interrupt_status_is_write_one_to_clear() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);
    // Any coprocessor command flags completion.
    xga.write_register(0x1800 + 0x7c, 0x0400_0000, 4);
    assert_eq!(xga.read_u8(EXT + 5, &mut bus) & 0x80, 0x80);
    xga.write_u8(EXT + 5, 0x01, &mut bus);
    assert_eq!(xga.read_u8(EXT + 5, &mut bus) & 0x80, 0x80);
    xga.write_u8(EXT + 5, 0x80, &mut bus);
    assert_eq!(xga.read_u8(EXT + 5, &mut bus) & 0x80, 0);
}

#[test]
fn interrupt_enable_write_clears_access_mode_bit_3() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);
    xga.write_u8(EXT + 9, 0x0a, &mut bus);
    xga.write_u8(EXT + 4, 0x00, &mut bus);
    assert_eq!(xga.read_u8(EXT + 9, &mut bus), 0x02);
}

#[test]
fn banked_aperture_follows_aperture_index() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);

    // Below operating mode 4 the index is ignored.
    xga.write_u8(EXT + 8, 2, &mut bus);
    xga.banked_write(0x10, 0x11);
    assert_eq!(xga.vram_read(0x10), 0x11);

    xga.write_u8(EXT, 4, &mut bus);
    xga.write_u8(EXT + 8, 2, &mut bus);
    xga.banked_write(0x1_0010, 0xab);
    assert_eq!(xga.vram_read(0x2_0010), 0xab);
    assert_eq!(xga.banked_read(0x10), 0xab);
}

#[test]
fn linear_aperture_wraps_at_vram_size() {
    let mut xga = Xga::new(XgaKind::Xga);
    xga.vram_write(0x10_0005, 0x77);
    assert_eq!(xga.vram_read(5), 0x77);
}

#[test]
fn pixel_clock_selection() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);
    assert_eq!(xga.display().timings().pixel_clock_hz, 25_175_000);

    write_index(&mut xga, &mut bus, 0x70, 0x80);
    assert_eq!(xga.display().timings().pixel_clock_hz, 41_539_000);
    write_index(&mut xga, &mut bus, 0x54, 0x04);
    assert_eq!(xga.display().timings().pixel_clock_hz, 28_322_000);
    write_index(&mut xga, &mut bus, 0x54, 0x0c);
    assert_eq!(xga.display().timings().pixel_clock_hz, 44_900_000);
}

#[test]
fn timing_registers_derive_geometry() {
    let mut bus = IsaBus::new(0x1000);
    let mut xga = Xga::new(XgaKind::Xga);
    for (index, value) in [
        (0x10, 0x9f),
        (0x12, 0x7f),
        (0x20, 0x25),
        (0x21, 0x03),
        (0x22, 0xff),
        (0x23, 0x02),
        (0x28, 0x02),
        (0x29, 0x03),
        (0x2c, 0xff),
        (0x2d, 0x07),
        (0x51, 0x03),
    ] {
        write_index(&mut xga, &mut bus, index, value);
    }
    let t = *xga.display().timings();
    assert_eq!(xga.display().mode(), DisplayMode::Bpp8);
    assert_eq!(t.h_total, 1280);
    assert_eq!(t.h_disp, 1024);
    assert_eq!(t.rowoffset, 128);
    assert_eq!(t.v_total, 0x326);
    assert_eq!(t.dispend, 0x300);
    assert_eq!(t.v_syncstart, 0x303);
    assert_eq!(t.split, 0x800);
    assert!(!t.interlace);

    write_index(&mut xga, &mut bus, 0x50, 0x08);
    let t = *xga.display().timings();
    assert!(t.interlace);
    assert_eq!(t.dispend, 0x180);
    assert_eq!(t.v_total, 0x193);
}

#[test]
fn renderer_colour_helpers() {
    assert_eq!(rgba(0x12, 0x34, 0x56), 0xff56_3412);
}
