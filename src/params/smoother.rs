use super::{ParamId, ParamStore, SMOOTHED_COUNT};

/// Linear ramp towards a target value over a fixed number of samples.
///
/// The ramp never overshoots: once the countdown reaches zero the current
/// value is exactly the target.
#[derive(Clone, Debug, Default)]
pub struct LinearSmoother {
    current: f32,
    target: f32,
    step: f32,
    countdown: usize,
    steps_to_target: usize,
}

impl LinearSmoother {
    /// Sets the ramp length from a sample rate and a ramp duration, and
    /// finishes any ramp in progress.
    pub fn reset(&mut self, sample_rate: f32, ramp_seconds: f32) {
        self.steps_to_target = (ramp_seconds.max(0.0) * sample_rate).floor() as usize;
        self.set_current_and_target(self.target);
    }

    pub fn set_current_and_target(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.countdown = 0;
        self.step = 0.0;
    }

    pub fn set_target(&mut self, value: f32) {
        if value == self.target {
            return;
        }

        if self.steps_to_target == 0 {
            self.set_current_and_target(value);
            return;
        }

        self.target = value;
        self.countdown = self.steps_to_target;
        self.step = (self.target - self.current) / self.countdown as f32;
    }

    /// Advances the ramp by `num_samples` and returns the new current value.
    pub fn skip(&mut self, num_samples: usize) -> f32 {
        if num_samples >= self.countdown {
            self.current = self.target;
            self.countdown = 0;
        } else {
            self.current = self.step.mul_add(num_samples as f32, self.current);
            self.countdown -= num_samples;
        }
        self.current
    }

    pub const fn current(&self) -> f32 {
        self.current
    }

    pub const fn is_smoothing(&self) -> bool {
        self.countdown > 0
    }
}

/// One [`LinearSmoother`] per continuous parameter.
pub struct SmootherBank {
    smoothers: [LinearSmoother; SMOOTHED_COUNT],
}

impl Default for SmootherBank {
    fn default() -> Self {
        Self::new()
    }
}

impl SmootherBank {
    pub fn new() -> Self {
        Self {
            smoothers: std::array::from_fn(|_| LinearSmoother::default()),
        }
    }

    pub fn reset(&mut self, sample_rate: f32, ramp_seconds: f32) {
        for smoother in &mut self.smoothers {
            smoother.reset(sample_rate, ramp_seconds);
        }
    }

    /// Jumps every smoother straight to the live parameter value.
    pub fn prime_all(&mut self, params: &ParamStore) {
        for (i, smoother) in self.smoothers.iter_mut().enumerate() {
            smoother.set_current_and_target(params.get(ParamStore::layout()[i].id));
        }
    }

    /// Retargets every smoother to the live parameter value, then advances
    /// it by `num_samples`.
    pub fn retarget(&mut self, params: &ParamStore, num_samples: usize) {
        for (i, smoother) in self.smoothers.iter_mut().enumerate() {
            smoother.set_target(params.get(ParamStore::layout()[i].id));
            smoother.skip(num_samples);
        }
    }

    /// Smoothed value of a continuous parameter. Asking for a choice or bool
    /// parameter is a bug and reads as zero in release builds.
    #[inline]
    pub fn current(&self, id: ParamId) -> f32 {
        match id.smoother_index() {
            Some(i) => self.smoothers[i].current(),
            None => {
                debug_assert!(false, "{} has no smoother", id.name());
                0.0
            }
        }
    }

    pub fn is_smoothing(&self) -> bool {
        self.smoothers.iter().any(LinearSmoother::is_smoothing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    #[test]
    fn ramps_monotonically_without_overshoot() {
        let mut s = LinearSmoother::default();
        s.reset(SAMPLE_RATE, 0.005);
        s.set_current_and_target(0.0);
        s.set_target(1.0);

        let ramp_samples = (SAMPLE_RATE * 0.005) as usize;
        let mut previous = s.current();
        let mut elapsed = 0;
        while elapsed < ramp_samples {
            let value = s.skip(16);
            elapsed += 16;
            assert!(value >= previous, "ramp went backwards: {value} < {previous}");
            assert!(value <= 1.0, "ramp overshot: {value}");
            previous = value;
        }
        assert_eq!(s.current(), 1.0);
        assert!(!s.is_smoothing());
    }

    #[test]
    fn downward_ramp_converges() {
        let mut s = LinearSmoother::default();
        s.reset(SAMPLE_RATE, 0.01);
        s.set_current_and_target(800.0);
        s.set_target(200.0);

        let mut previous = s.current();
        for _ in 0..100 {
            let value = s.skip(8);
            assert!(value <= previous && value >= 200.0);
            previous = value;
        }
        assert_eq!(s.current(), 200.0);
    }

    #[test]
    fn current_is_never_the_raw_new_target() {
        let mut s = LinearSmoother::default();
        s.reset(SAMPLE_RATE, 0.005);
        s.set_current_and_target(0.0);
        s.set_target(1.0);
        assert_eq!(s.current(), 0.0);
        let halfway = s.skip(120);
        assert!((halfway - 0.5).abs() < 1e-4, "halfway was {halfway}");
    }

    #[test]
    fn retarget_mid_ramp_restarts_from_current() {
        let mut s = LinearSmoother::default();
        s.reset(SAMPLE_RATE, 0.005);
        s.set_current_and_target(0.0);
        s.set_target(1.0);
        let mid = s.skip(60);
        s.set_target(0.0);
        assert_eq!(s.current(), mid);
        assert!(s.skip(1) < mid);
    }

    #[test]
    fn zero_ramp_jumps() {
        let mut s = LinearSmoother::default();
        s.reset(SAMPLE_RATE, 0.0);
        s.set_target(3.0);
        assert_eq!(s.current(), 3.0);
    }

    #[test]
    fn bank_primes_then_follows_store() {
        let params = ParamStore::new();
        params.set(ParamId::GeneralFilterFreqHz, 4000.0);

        let mut bank = SmootherBank::new();
        bank.reset(SAMPLE_RATE, 0.005);
        bank.prime_all(&params);
        assert_eq!(bank.current(ParamId::GeneralFilterFreqHz), 4000.0);
        assert!(!bank.is_smoothing());

        params.set(ParamId::GeneralFilterFreqHz, 2000.0);
        bank.retarget(&params, 64);
        let value = bank.current(ParamId::GeneralFilterFreqHz);
        assert!(value < 4000.0 && value > 2000.0);
        assert!(bank.is_smoothing());

        for _ in 0..4 {
            bank.retarget(&params, 64);
        }
        assert_eq!(bank.current(ParamId::GeneralFilterFreqHz), 2000.0);
    }
}
