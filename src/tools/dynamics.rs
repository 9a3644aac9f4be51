//! Brush dynamics: pressure and velocity sensors that modulate the size,
//! angle and color of each stroke point, plus the mouse stabilizer.

use serde::{Deserialize, Serialize};

use crate::brush::Brush;
use crate::geometry::Point;
use crate::stroke::Pt;

use super::pointer::Pointer;

/// Screen pixels of movement considered full velocity
pub const PIXELS_FOR_FULL_VELOCITY: f32 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicSensor {
    #[default]
    Static,
    Pressure,
    Velocity,
}

/// Direction of the dynamic gradient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFromTo {
    #[default]
    BgToFg,
    FgToBg,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsOptions {
    pub size: DynamicSensor,
    pub angle: DynamicSensor,
    pub gradient: DynamicSensor,
    pub min_size: i32,
    pub min_angle: i32,
    pub min_pressure_threshold: f32,
    pub max_pressure_threshold: f32,
    pub min_velocity_threshold: f32,
    pub max_velocity_threshold: f32,
    pub color_from_to: ColorFromTo,
    pub stabilizer: bool,
    pub stabilizer_factor: i32,
}

impl Default for DynamicsOptions {
    fn default() -> Self {
        Self {
            size: DynamicSensor::Static,
            angle: DynamicSensor::Static,
            gradient: DynamicSensor::Static,
            min_size: 1,
            min_angle: 0,
            min_pressure_threshold: 0.1,
            max_pressure_threshold: 0.9,
            min_velocity_threshold: 0.1,
            max_velocity_threshold: 0.9,
            color_from_to: ColorFromTo::BgToFg,
            stabilizer: false,
            stabilizer_factor: 16,
        }
    }
}

impl DynamicsOptions {
    pub fn is_dynamic(&self) -> bool {
        self.size != DynamicSensor::Static
            || self.angle != DynamicSensor::Static
            || self.gradient != DynamicSensor::Static
    }

    pub fn has_dynamic_gradient(&self) -> bool {
        self.gradient != DynamicSensor::Static
    }

    /// Resolves the size, angle and gradient of `pt` from the sensors.
    /// `pt` arrives with the brush's own size and angle.
    pub fn adjust_point(&self, pointer: &Pointer, pt: &mut Pt) {
        let mut size = pt.size as f32;
        let mut angle = pt.angle as f32;

        let has_p = pointer.has_pressure();
        let p = if has_p {
            normalize(
                pointer.pressure,
                self.min_pressure_threshold,
                self.max_pressure_threshold,
            )
        } else {
            1.0
        };

        let v = (pointer.velocity.length() / PIXELS_FOR_FULL_VELOCITY).clamp(0.0, 1.0);
        let v = normalize(v, self.min_velocity_threshold, self.max_velocity_threshold);

        match self.size {
            DynamicSensor::Pressure if has_p => size = (1.0 - p) * self.min_size as f32 + p * size,
            DynamicSensor::Velocity => size = (1.0 - v) * self.min_size as f32 + v * size,
            _ => {}
        }

        match self.angle {
            DynamicSensor::Pressure if has_p => angle = (1.0 - p) * self.min_angle as f32 + p * angle,
            DynamicSensor::Velocity => angle = (1.0 - v) * self.min_angle as f32 + v * angle,
            _ => {}
        }

        match self.gradient {
            DynamicSensor::Pressure => pt.gradient = p,
            DynamicSensor::Velocity => pt.gradient = v,
            DynamicSensor::Static => {}
        }

        pt.size = (size as i32).clamp(Brush::MIN_SIZE, Brush::MAX_SIZE);
        pt.angle = (angle as i32).clamp(-180, 180);
    }
}

fn normalize(value: f32, min: f32, max: f32) -> f32 {
    let n = if value < min {
        0.0
    } else if value > max || min == max {
        1.0
    } else {
        (value - min) / (max - min)
    };
    n.clamp(0.0, 1.0)
}

/// Pulls each pointer sample towards a trailing center, smoothing shaky
/// input. A factor of N moves the center 1/N of the way per sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stabilizer {
    center: (f64, f64),
    factor: f64,
}

impl Stabilizer {
    pub fn new(start: Point, factor: i32) -> Self {
        Self {
            center: (start.x as f64, start.y as f64),
            factor: factor.max(1) as f64,
        }
    }

    pub fn reset(&mut self, pt: Point) {
        self.center = (pt.x as f64, pt.y as f64);
    }

    pub fn filter(&mut self, pt: Point) -> Point {
        let dx = pt.x as f64 - self.center.0;
        let dy = pt.y as f64 - self.center.1;
        let distance = (dx * dx + dy * dy).sqrt();
        let angle = dy.atan2(dx);
        self.center = (
            self.center.0 + distance / self.factor * angle.cos(),
            self.center.1 + distance / self.factor * angle.sin(),
        );
        Point::new(self.center.0 as i32, self.center.1 as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::pointer::{Button, PointerType};

    fn pen(pressure: f32) -> Pointer {
        Pointer {
            kind: PointerType::Pen,
            pressure,
            ..Pointer::at(0, 0, Button::Left)
        }
    }

    #[test]
    fn test_pressure_scales_size() {
        let dynamics = DynamicsOptions {
            size: DynamicSensor::Pressure,
            min_size: 1,
            min_pressure_threshold: 0.0,
            max_pressure_threshold: 1.0,
            ..Default::default()
        };
        let mut pt = Pt { size: 11, ..Pt::new(0, 0) };
        dynamics.adjust_point(&pen(0.5), &mut pt);
        assert_eq!(pt.size, 6);

        // A mouse has no pressure, size stays put
        let mut pt = Pt { size: 11, ..Pt::new(0, 0) };
        dynamics.adjust_point(&Pointer::at(0, 0, Button::Left), &mut pt);
        assert_eq!(pt.size, 11);
    }

    #[test]
    fn test_velocity_gradient_and_clamping() {
        let dynamics = DynamicsOptions {
            gradient: DynamicSensor::Velocity,
            angle: DynamicSensor::Velocity,
            min_angle: -400,
            ..Default::default()
        };
        let pointer = Pointer::at(0, 0, Button::Left);
        let mut pt = Pt { size: 200, ..Pt::new(0, 0) };
        dynamics.adjust_point(&pointer, &mut pt);
        assert_eq!(pt.gradient, 0.0);
        assert_eq!(pt.size, Brush::MAX_SIZE);
        assert_eq!(pt.angle, -180);
    }

    #[test]
    fn test_stabilizer_moves_partially() {
        let mut s = Stabilizer::new(Point::new(0, 0), 4);
        assert_eq!(s.filter(Point::new(8, 0)), Point::new(2, 0));
        assert_eq!(s.filter(Point::new(10, 0)), Point::new(4, 0));
    }
}
