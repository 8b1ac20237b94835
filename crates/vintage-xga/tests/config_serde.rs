use vintage_platform::{IoPortBus, IsaBus};
use vintage_xga::{ConfigError, Xga, XgaConfig, XgaKind};

#[test]
fn defaults_fill_missing_fields() {
    let cfg: XgaConfig = serde_json::from_str(r#"{ "kind": "xga2" }"#).unwrap();
    assert_eq!(cfg.kind, XgaKind::Xga2);
    assert_eq!(cfg.vram_size, 1024 * 1024);
    assert_eq!(cfg.instance, 6);
    assert!(cfg.bios_rom.is_none());
    assert_eq!(cfg.ext_port_base(), 0x2160);
}

#[test]
fn config_round_trip() {
    let cfg = XgaConfig {
        kind: XgaKind::Xga2,
        vram_size: 2 * 1024 * 1024,
        instance: 1,
        bios_rom: Some(vec![0x55, 0xaa]),
    };
    let text = serde_json::to_string(&cfg).unwrap();
    assert!(text.contains(r#""kind":"xga2""#));
    let back: XgaConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn invalid_configs_are_rejected() {
    let odd_vram = XgaConfig {
        vram_size: 3 * 1024 * 1024,
        ..XgaConfig::default()
    };
    assert!(matches!(Xga::try_new(odd_vram), Err(ConfigError::VramSize(_))));

    let tiny_vram = XgaConfig {
        vram_size: 4096,
        ..XgaConfig::default()
    };
    assert!(matches!(Xga::try_new(tiny_vram), Err(ConfigError::VramSize(4096))));

    let instance = XgaConfig {
        instance: 8,
        ..XgaConfig::default()
    };
    assert!(matches!(Xga::try_new(instance), Err(ConfigError::InvalidInstance(8))));

    let rom = XgaConfig {
        bios_rom: Some(vec![0; 0x1801]),
        ..XgaConfig::default()
    };
    assert!(matches!(Xga::try_new(rom), Err(ConfigError::RomTooLarge(0x1801))));
}

#[test]
fn overlapping_attach_reports_platform_error() {
    let mut io: IoPortBus<IsaBus> = IoPortBus::new();
    Xga::new(XgaKind::Xga).attach(&mut io).unwrap();
    let second = XgaConfig {
        instance: 1,
        ..XgaConfig::default()
    };
    // Both boards decode the POS registers.
    let err = Xga::try_new(second).unwrap().attach(&mut io).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Platform(vintage_platform::ConfigError::OverlappingPortRange { .. })
    ));

    // The rejected board's extended window stays undecoded.
    let mut bus = IsaBus::new(0x1000);
    io.write_u8(0x2110 + 0x0a, 0x52, &mut bus);
    assert_eq!(io.read_u8(0x2110 + 0x0b, &mut bus), 0xff);
    io.write_u8(0x2160 + 0x0a, 0x52, &mut bus);
    assert_eq!(io.read_u8(0x2160 + 0x0b, &mut bus), 0xea);
}
