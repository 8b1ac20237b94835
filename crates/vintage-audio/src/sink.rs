/// Consumer of the mixed output of an ISA sound device.
///
/// Devices emit one interleaved stereo frame per output sample position (`L0, R0, L1, R1, ...`),
/// normalised to `[-1.0, 1.0]`.
pub trait AudioSink {
    fn push_interleaved_f32(&mut self, samples: &[f32]);
}

impl AudioSink for Vec<f32> {
    fn push_interleaved_f32(&mut self, samples: &[f32]) {
        self.extend_from_slice(samples);
    }
}

impl<S: AudioSink + ?Sized> AudioSink for &mut S {
    fn push_interleaved_f32(&mut self, samples: &[f32]) {
        (**self).push_interleaved_f32(samples);
    }
}

/// Sink that discards everything, for driving a device without an output.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn push_interleaved_f32(&mut self, _samples: &[f32]) {}
}
