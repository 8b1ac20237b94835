use proptest::prelude::*;
use vintage_audio::sb_dsp::{data_len, SbDsp, SbModel};
use vintage_platform::IsaBus;

const BASE: u16 = 0x220;
const WRITE: u16 = BASE + 0xc;

const MODELS: [SbModel; 8] = [
    SbModel::Sb1,
    SbModel::Sb15,
    SbModel::Sb2,
    SbModel::SbPro,
    SbModel::SbPro2,
    SbModel::Sb16,
    SbModel::Awe32,
    SbModel::Awe64,
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn fresh(model: SbModel) -> (SbDsp, IsaBus) {
    (SbDsp::new(model), IsaBus::new(0x1_0000))
}

#[test]
fn every_command_executes_after_exactly_its_data_bytes() {
    init_tracing();
    for model in MODELS {
        for cmd in 0..=255u8 {
            let (mut dsp, mut bus) = fresh(model);
            let need = data_len(cmd, model.is_sb16_class()).unwrap_or(0);

            dsp.write_u8(WRITE, cmd, &mut bus);
            for i in 0..need {
                assert_eq!(
                    dsp.commands_executed(),
                    0,
                    "{model:?} cmd {cmd:#04x} ran early after {i} data bytes"
                );
                assert!(dsp.command_pending());
                dsp.write_u8(WRITE, 0x00, &mut bus);
            }
            assert_eq!(dsp.commands_executed(), 1, "{model:?} cmd {cmd:#04x}");
            assert!(!dsp.command_pending());
        }
    }
}

#[test]
fn sb16_class_changes_command_08_length() {
    assert_eq!(data_len(0x08, false), None);
    assert_eq!(data_len(0x08, true), Some(1));

    let (mut dsp, mut bus) = fresh(SbModel::Sb16);
    dsp.write_u8(WRITE, 0x08, &mut bus);
    assert!(dsp.command_pending());
    dsp.write_u8(WRITE, 0x00, &mut bus);
    assert_eq!(dsp.commands_executed(), 1);
}

#[test]
fn sb16_records_commands_in_8051_ram() {
    let (mut dsp, mut bus) = fresh(SbModel::Sb16);
    dsp.write_u8(WRITE, 0xd1, &mut bus);
    assert_eq!(dsp.ram_8051(0x20), 0xd1);
    assert_eq!(dsp.ram_8051(0x30), 0xd1);

    dsp.write_u8(WRITE, 0x41, &mut bus);
    dsp.write_u8(WRITE, 0xac, &mut bus);
    dsp.write_u8(WRITE, 0x44, &mut bus);
    assert_eq!(dsp.ram_8051(0x30), 0x41);
    assert_eq!(dsp.ram_8051(0x13), 0x44);
    assert_eq!(dsp.ram_8051(0x14), 0xac);
}

proptest! {
    #[test]
    fn one_byte_short_never_executes(cmd in any::<u8>(), model_idx in 0usize..MODELS.len(), fill in any::<u8>()) {
        let model = MODELS[model_idx];
        let need = data_len(cmd, model.is_sb16_class());
        prop_assume!(matches!(need, Some(n) if n > 0));
        let need = need.unwrap_or(0);

        let (mut dsp, mut bus) = fresh(model);
        dsp.write_u8(WRITE, cmd, &mut bus);
        for _ in 1..need {
            dsp.write_u8(WRITE, fill, &mut bus);
        }
        prop_assert_eq!(dsp.commands_executed(), 0);
        prop_assert!(dsp.command_pending());

        dsp.write_u8(WRITE, fill, &mut bus);
        prop_assert_eq!(dsp.commands_executed(), 1);
    }
}
