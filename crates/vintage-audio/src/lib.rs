//! ISA sound devices: the Sound Blaster DSP and the AD1848/CS423x codec family.
//!
//! Both devices are timer-driven sample pumps. A port write starts a stream; from then on the
//! device's [`DeviceTimer`](vintage_platform::DeviceTimer) fires once per sample period, moves one
//! frame between a DMA channel and the DAC, and rearms itself from the previous deadline. The
//! current DAC value is held in a 48 kHz [`SampleBuffer`] which the host drains through an
//! [`AudioSink`].

pub mod ad1848;
pub mod buffer;
pub mod clock;
pub mod filter;
pub mod sb_dsp;
pub mod sink;

pub use ad1848::{Ad1848, CodecConfig, CodecKind};
pub use buffer::{SampleBuffer, OUTPUT_RATE_HZ};
pub use sb_dsp::{SbConfig, SbDsp, SbModel};
pub use sink::{AudioSink, NullSink};

/// One output sample per channel, left first.
pub type StereoFrame = [i16; 2];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Platform(#[from] vintage_platform::ConfigError),
    #[error("16-bit DMA channel {0} is a byte-wide channel")]
    Dma16OnByteChannel(u8),
}
