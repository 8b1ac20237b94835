use std::f64::consts::PI;

pub const FIR_TAPS: usize = 51;

/// Low-pass FIR used on the SB16 output and capture paths.
///
/// Coefficients are a Blackman-windowed sinc normalised to unity DC gain. The cut-off follows the
/// playback rate: `design(rate)` places it at `rate / 2` relative to a 48 kHz output, the same way
/// the card's analogue stage rolls off above Nyquist of the programmed rate.
#[derive(Debug, Clone)]
pub struct LowPassFir {
    coef: [f64; FIR_TAPS],
    history: [[f64; FIR_TAPS]; 2],
    pos: usize,
}

impl LowPassFir {
    pub fn new(playback_hz: u32) -> Self {
        Self {
            coef: design(playback_hz),
            history: [[0.0; FIR_TAPS]; 2],
            pos: 0,
        }
    }

    /// Recomputes the coefficients. Filter history is kept.
    pub fn retune(&mut self, playback_hz: u32) {
        self.coef = design(playback_hz);
    }

    pub fn coefficients(&self) -> &[f64; FIR_TAPS] {
        &self.coef
    }

    /// Filters one stereo frame.
    pub fn process(&mut self, left: f64, right: f64) -> (f64, f64) {
        self.history[0][self.pos] = left;
        self.history[1][self.pos] = right;
        self.pos = (self.pos + 1) % FIR_TAPS;

        let mut out = [0.0f64; 2];
        for (ch, acc) in out.iter_mut().enumerate() {
            let hist = &self.history[ch];
            for (n, c) in self.coef.iter().enumerate() {
                *acc += c * hist[(self.pos + n) % FIR_TAPS];
            }
        }
        (out[0], out[1])
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    (PI * x).sin() / (PI * x)
}

pub fn design(playback_hz: u32) -> [f64; FIR_TAPS] {
    let fc = f64::from(playback_hz) / 96_000.0;
    let m = (FIR_TAPS - 1) as f64;
    let mut coef = [0.0f64; FIR_TAPS];

    for (n, c) in coef.iter_mut().enumerate() {
        let n = n as f64;
        let w = 0.42 - 0.5 * (2.0 * PI * n / m).cos() + 0.08 * (4.0 * PI * n / m).cos();
        let h = sinc(2.0 * fc * (n - m / 2.0));
        *c = w * h;
    }
    coef[(FIR_TAPS - 1) / 2] = 1.0;

    let gain: f64 = coef.iter().sum();
    if gain != 0.0 {
        for c in coef.iter_mut() {
            *c /= gain;
        }
    }
    coef
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficients_have_unity_gain_and_symmetry() {
        for hz in [6_400, 11_025, 22_050, 44_100] {
            let coef = design(hz);
            let sum: f64 = coef.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "{hz}: gain {sum}");
            for n in 0..FIR_TAPS / 2 {
                assert!((coef[n] - coef[FIR_TAPS - 1 - n]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn dc_passes_through_after_settling() {
        let mut fir = LowPassFir::new(22_050);
        let mut last = (0.0, 0.0);
        for _ in 0..FIR_TAPS * 2 {
            last = fir.process(1000.0, -1000.0);
        }
        assert!((last.0 - 1000.0).abs() < 1e-6);
        assert!((last.1 + 1000.0).abs() < 1e-6);
    }
}
