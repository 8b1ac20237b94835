use vintage_time::NS_PER_SEC;

/// Converts elapsed virtual time into whole output frames at a fixed rate.
///
/// The fractional remainder is kept in `frac_fp` (units of `1 / NS_PER_SEC` frames), so
/// advancing in many small steps yields the same frame count as one large step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFrameClock {
    pub sample_rate_hz: u32,
    pub last_time_ns: u64,
    pub frac_fp: u64,
}

impl AudioFrameClock {
    pub fn new(sample_rate_hz: u32, start_time_ns: u64) -> Self {
        Self {
            sample_rate_hz,
            last_time_ns: start_time_ns,
            frac_fp: 0,
        }
    }

    /// Moves the clock to `now_ns` and returns how many frames elapsed.
    ///
    /// Time going backwards is ignored.
    pub fn advance_to(&mut self, now_ns: u64) -> usize {
        if now_ns <= self.last_time_ns {
            return 0;
        }
        let delta = now_ns - self.last_time_ns;
        self.last_time_ns = now_ns;

        let total = u128::from(self.frac_fp) + u128::from(delta) * u128::from(self.sample_rate_hz);
        let frames = total / u128::from(NS_PER_SEC);
        self.frac_fp = (total % u128::from(NS_PER_SEC)) as u64;
        usize::try_from(frames).unwrap_or(usize::MAX)
    }
}
