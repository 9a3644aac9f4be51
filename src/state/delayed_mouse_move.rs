use std::time::{Duration, Instant};

use log::debug;

use crate::geometry::Point;
use crate::util::time::Timer;

/// Holds back bursts of mouse moves. Only the last canvas position
/// reaches the tool loop once the interval elapses; a zero interval lets
/// every move through.
#[derive(Debug, Clone)]
pub struct DelayedMouseMove {
    timer: Timer,
    pos: Point,
    pending: bool,
}

impl DelayedMouseMove {
    pub fn new(interval: Duration, pos: Point) -> Self {
        Self {
            timer: Timer::new(interval),
            pos,
            pending: false,
        }
    }

    /// Last canvas position received
    pub fn pos(&self) -> Point {
        self.pos
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn on_mouse_down(&mut self, pos: Point) {
        self.pos = pos;
    }

    /// Returns the position to process right away, if any. Moves inside
    /// the same canvas pixel are dropped.
    pub fn on_mouse_move(&mut self, pos: Point, now: Instant) -> Option<Point> {
        if pos == self.pos {
            return None;
        }
        self.pos = pos;
        if self.timer.interval().is_zero() {
            return Some(pos);
        }
        self.pending = true;
        self.timer.start(now);
        None
    }

    /// A release flushes the held move first, so the button goes up
    /// where the pointer really is
    pub fn on_mouse_up(&mut self, pos: Point) -> Option<Point> {
        let moved = pos != self.pos;
        self.pos = pos;
        let flush = self.pending || moved;
        self.stop();
        flush.then_some(pos)
    }

    /// Position to commit when the interval elapsed
    pub fn tick(&mut self, now: Instant) -> Option<Point> {
        if !self.pending || !self.timer.is_due(now) {
            return None;
        }
        debug!("Flushing delayed move to {:?}", self.pos);
        self.stop();
        Some(self.pos)
    }

    pub fn stop(&mut self) {
        self.pending = false;
        self.timer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moves_are_coalesced() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut delayed = DelayedMouseMove::new(ms(5), Point::new(0, 0));

        assert_eq!(delayed.on_mouse_move(Point::new(1, 0), t0), None);
        assert_eq!(delayed.on_mouse_move(Point::new(2, 0), t0 + ms(2)), None);
        assert_eq!(delayed.tick(t0 + ms(4)), None);
        assert_eq!(delayed.tick(t0 + ms(5)), Some(Point::new(2, 0)));
        assert_eq!(delayed.tick(t0 + ms(10)), None);
    }

    #[test]
    fn test_zero_delay_passes_through() {
        let t0 = Instant::now();
        let mut delayed = DelayedMouseMove::new(Duration::ZERO, Point::new(0, 0));
        assert_eq!(delayed.on_mouse_move(Point::new(0, 0), t0), None);
        assert_eq!(delayed.on_mouse_move(Point::new(3, 1), t0), Some(Point::new(3, 1)));
        assert!(!delayed.is_pending());
    }

    #[test]
    fn test_release_flushes_pending_move() {
        let t0 = Instant::now();
        let mut delayed = DelayedMouseMove::new(Duration::from_millis(5), Point::new(0, 0));
        delayed.on_mouse_move(Point::new(4, 4), t0);
        assert_eq!(delayed.on_mouse_up(Point::new(4, 4)), Some(Point::new(4, 4)));
        assert!(!delayed.is_pending());
        assert_eq!(delayed.on_mouse_up(Point::new(4, 4)), None);
    }
}
