use std::time::Instant;

use egui::{Pos2, Vec2};

/// Milliseconds the velocity is measured over
const SAMPLE_MS: f32 = 50.0;

/// Pointer speed in screen pixels per 50ms, smoothed with a low-pass
/// filter so a single jittery sample doesn't spike the dynamics.
#[derive(Debug, Clone, Default)]
pub struct VelocitySensor {
    last: Option<(Pos2, Instant)>,
    velocity: Vec2,
}

impl VelocitySensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.velocity = Vec2::ZERO;
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn update(&mut self, pos: Pos2, now: Instant) {
        let Some((last_pos, last_time)) = self.last else {
            self.last = Some((pos, now));
            return;
        };
        let dt = now.saturating_duration_since(last_time).as_secs_f32() * 1000.0;
        if dt <= 0.0 {
            return;
        }
        let sample = (pos - last_pos) * (SAMPLE_MS / dt);
        let a = (dt / SAMPLE_MS).clamp(0.0, 1.0);
        self.velocity = self.velocity * (1.0 - a) + sample * a;
        self.last = Some((pos, now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_velocity_per_50ms() {
        let t0 = Instant::now();
        let mut sensor = VelocitySensor::new();
        sensor.update(Pos2::new(0.0, 0.0), t0);
        assert_eq!(sensor.velocity(), Vec2::ZERO);

        // A full sample period replaces the previous velocity
        sensor.update(Pos2::new(20.0, 0.0), t0 + Duration::from_millis(50));
        assert!((sensor.velocity().x - 20.0).abs() < 0.01);

        // Half a period blends half of it
        sensor.update(Pos2::new(20.0, 0.0), t0 + Duration::from_millis(75));
        assert!((sensor.velocity().x - 10.0).abs() < 0.01);

        sensor.reset();
        assert_eq!(sensor.velocity(), Vec2::ZERO);
    }
}
