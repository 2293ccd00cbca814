//! Velocity PID with a first-order filtered derivative.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
    /// Weight of the previous filtered derivative, in `[0, 1)`.
    pub derivative_persistence: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidState {
    pub integrator: f32,
    pub previous_error: f32,
    pub filtered_derivative: f32,
}

/// Terms of one update, kept for telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidOutput {
    pub error: f32,
    pub integral: f32,
    pub derivative: f32,
    /// Clamped to `[-1, 1]`.
    pub drive: f32,
}

#[derive(Debug, Clone)]
pub struct VelocityPid {
    gains: PidGains,
    state: PidState,
}

impl VelocityPid {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            state: PidState::default(),
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn state(&self) -> PidState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = PidState::default();
    }

    /// Advance the loop by `dt_s` seconds.
    ///
    /// A non-positive `dt_s` or a non-finite error leaves the state untouched
    /// and returns zero drive.
    pub fn update(&mut self, target: f32, measured: f32, dt_s: f32) -> PidOutput {
        let error = target - measured;
        if !(error.is_finite() && dt_s.is_finite() && dt_s > 0.0) {
            return PidOutput {
                error: if error.is_finite() { error } else { 0.0 },
                ..PidOutput::default()
            };
        }
        let beta = self.gains.derivative_persistence;
        let st = &mut self.state;
        st.integrator += error * dt_s;
        let raw_derivative = (error - st.previous_error) / dt_s;
        st.filtered_derivative = (1.0 - beta) * raw_derivative + beta * st.filtered_derivative;
        st.previous_error = error;

        let g = self.gains;
        let u = g.p * error + g.i * st.integrator + g.d * st.filtered_derivative;
        let drive = if u.is_finite() { u.clamp(-1.0, 1.0) } else { 0.0 };
        PidOutput {
            error,
            integral: st.integrator,
            derivative: st.filtered_derivative,
            drive,
        }
    }
}
