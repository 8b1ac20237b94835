use crate::clock::AudioFrameClock;
use crate::StereoFrame;

/// Output sample rate of every device buffer.
pub const OUTPUT_RATE_HZ: u32 = 48_000;

/// Sample-and-hold output buffer.
///
/// A device writes its current output value here before every change, so the buffer holds the
/// waveform the DAC produced up to the present time at [`OUTPUT_RATE_HZ`].
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    clock: AudioFrameClock,
    frames: Vec<StereoFrame>,
}

impl SampleBuffer {
    pub fn new(start_time_ns: u64) -> Self {
        Self {
            clock: AudioFrameClock::new(OUTPUT_RATE_HZ, start_time_ns),
            frames: Vec::new(),
        }
    }

    /// Extends the buffer up to `now_ns` with `value`.
    pub fn fill_to(&mut self, now_ns: u64, value: StereoFrame) {
        let n = self.clock.advance_to(now_ns);
        self.frames.resize(self.frames.len() + n, value);
    }

    pub fn frames(&self) -> &[StereoFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Removes and returns every buffered frame. Buffer time keeps running.
    pub fn take(&mut self) -> Vec<StereoFrame> {
        std::mem::take(&mut self.frames)
    }

    /// Restarts the buffer at `now_ns`, dropping anything pending.
    pub fn restart(&mut self, now_ns: u64) {
        self.frames.clear();
        self.clock = AudioFrameClock::new(OUTPUT_RATE_HZ, now_ns);
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(0)
    }
}

#[inline]
pub(crate) fn to_f32(sample: f64) -> f32 {
    (sample / 32768.0).clamp(-1.0, 1.0) as f32
}
