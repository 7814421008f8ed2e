// src/correction.rs - Turning a target offset into a bounded jog move
use std::time::Duration;

use crate::config::CorrectionConfig;

#[derive(Debug, Clone)]
pub struct Pid {
    /// PID parameters
    kp: f64,
    ki: f64,
    kd: f64,

    /// Output limits
    min_out: f64,
    max_out: f64,

    /// PID state
    integral: f64,
    previous_error: f64,
}

impl Pid {
    pub fn new(kp: f64, ki: f64, kd: f64, min_out: f64, max_out: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            min_out,
            max_out,
            integral: 0.0,
            previous_error: 0.0,
        }
    }

    /// Clamped controller output; zero when `dt` is not positive.
    pub fn calculate(&mut self, error: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        self.integral += error * dt;
        let derivative = (error - self.previous_error) / dt;
        self.previous_error = error;

        let output = self.kp * error + self.ki * self.integral + self.kd * derivative;
        output.clamp(self.min_out, self.max_out)
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
    }
}

/// Relative table move in mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jog {
    pub dx: f64,
    pub dy: f64,
}

/// Maps the offset of a target from the aim point to a table move.
///
/// The table travels opposite to the offset so the target drifts back toward
/// the aim point, hence the sign flip on the controller output.
#[derive(Debug, Clone)]
pub struct Corrector {
    x: Pid,
    y: Pid,
    deadzone: f64,
    dt: Duration,
}

impl Corrector {
    pub fn new(config: &CorrectionConfig) -> Self {
        let limit = config.max_step_mm;
        Self {
            x: Pid::new(config.kp, config.ki, config.kd, -limit, limit),
            y: Pid::new(config.kp, config.ki, config.kd, -limit, limit),
            deadzone: config.deadzone_px,
            dt: Duration::from_millis(config.dt_ms),
        }
    }

    /// `None` while the offset is inside the deadzone.
    pub fn correct(&mut self, error_x: f64, error_y: f64) -> Option<Jog> {
        if error_x.hypot(error_y) <= self.deadzone {
            return None;
        }
        let dt = self.dt.as_secs_f64();
        let dx = -self.x.calculate(error_x, dt);
        let dy = -self.y.calculate(error_y, dt);
        Some(Jog { dx, dy })
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}
