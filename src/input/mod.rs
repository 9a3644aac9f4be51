use egui::{Context, Event, Key, Modifiers, PointerButton, Pos2, Rect, Vec2};

mod modifiers;
mod velocity;
mod viewport;

pub use modifiers::{is_straight_line_modifier, tool_loop_modifiers};
pub use velocity::VelocitySensor;
pub use viewport::{Viewport, ZOOM_LEVELS};

use crate::tools::{Button, PointerType};

/// Pointer position and device data, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub pos: Pos2,
    pub kind: PointerType,
    /// 0.0..=1.0, 1.0 for devices without pressure
    pub pressure: f32,
}

impl PointerSample {
    pub fn mouse(pos: Pos2) -> Self {
        Self {
            pos,
            kind: PointerType::Mouse,
            pressure: 1.0,
        }
    }
}

/// Input the editor reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown {
        sample: PointerSample,
        button: Button,
        modifiers: Modifiers,
    },
    PointerUp {
        sample: PointerSample,
        button: Button,
        modifiers: Modifiers,
    },
    /// Pointer moved, with or without buttons pressed
    PointerMove {
        sample: PointerSample,
        modifiers: Modifiers,
    },
    /// Pointer left the window
    PointerLeave,
    ModifiersChanged(Modifiers),
    KeyDown {
        key: Key,
        modifiers: Modifiers,
    },
    KeyUp {
        key: Key,
        modifiers: Modifiers,
    },
    /// Mouse wheel or trackpad scroll, in points
    Wheel {
        delta: Vec2,
        modifiers: Modifiers,
    },
}

pub fn button_from_egui(button: PointerButton) -> Button {
    match button {
        PointerButton::Primary => Button::Left,
        PointerButton::Secondary => Button::Right,
        PointerButton::Middle => Button::Middle,
        PointerButton::Extra1 | PointerButton::Extra2 => Button::None,
    }
}

/// Handles converting raw egui input into our InputEvents
#[derive(Debug, Default)]
pub struct InputHandler {
    last_pointer_pos: Option<Pos2>,
    last_modifiers: Modifiers,
    /// Presses outside this area are ignored
    canvas_rect: Option<Rect>,
}

impl InputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the canvas rectangle
    pub fn set_canvas_rect(&mut self, rect: Rect) {
        self.canvas_rect = Some(rect);
    }

    fn on_canvas(&self, pos: Pos2) -> bool {
        self.canvas_rect.is_none_or(|rect| rect.contains(pos))
    }

    /// Process raw egui input and generate our InputEvents
    pub fn process_input(&mut self, ctx: &Context) -> Vec<InputEvent> {
        let mut events = Vec::new();

        ctx.input(|input| {
            let modifiers = input.modifiers;
            if modifiers != self.last_modifiers {
                events.push(InputEvent::ModifiersChanged(modifiers));
                self.last_modifiers = modifiers;
            }

            // Pens show up as touches with a force
            let force = input.events.iter().rev().find_map(|event| match event {
                Event::Touch { force: Some(force), .. } => Some(*force),
                _ => None,
            });
            let sample = |pos: Pos2| match force {
                Some(force) => PointerSample {
                    pos,
                    kind: PointerType::Pen,
                    pressure: force.clamp(0.0, 1.0),
                },
                None => PointerSample::mouse(pos),
            };

            if let Some(pos) = input.pointer.hover_pos() {
                if Some(pos) != self.last_pointer_pos {
                    events.push(InputEvent::PointerMove {
                        sample: sample(pos),
                        modifiers,
                    });
                }
                self.last_pointer_pos = Some(pos);
            } else if self.last_pointer_pos.take().is_some() {
                events.push(InputEvent::PointerLeave);
            }

            for button in [PointerButton::Primary, PointerButton::Secondary, PointerButton::Middle] {
                let Some(pos) = input.pointer.interact_pos() else {
                    continue;
                };
                if input.pointer.button_pressed(button) && self.on_canvas(pos) {
                    events.push(InputEvent::PointerDown {
                        sample: sample(pos),
                        button: button_from_egui(button),
                        modifiers,
                    });
                }
                if input.pointer.button_released(button) {
                    events.push(InputEvent::PointerUp {
                        sample: sample(pos),
                        button: button_from_egui(button),
                        modifiers,
                    });
                }
            }

            for event in &input.events {
                if let Event::Key {
                    key,
                    pressed,
                    repeat: false,
                    modifiers,
                    ..
                } = event
                {
                    events.push(if *pressed {
                        InputEvent::KeyDown {
                            key: *key,
                            modifiers: *modifiers,
                        }
                    } else {
                        InputEvent::KeyUp {
                            key: *key,
                            modifiers: *modifiers,
                        }
                    });
                }
            }

            if input.raw_scroll_delta != Vec2::ZERO {
                events.push(InputEvent::Wheel {
                    delta: input.raw_scroll_delta,
                    modifiers,
                });
            }
        });

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, RawInput};

    fn frame(handler: &mut InputHandler, ctx: &Context, events: Vec<Event>) -> Vec<InputEvent> {
        let raw = RawInput {
            events,
            ..Default::default()
        };
        let mut out = Vec::new();
        let _ = ctx.run(raw, |ctx| out = handler.process_input(ctx));
        out
    }

    #[test]
    fn test_press_and_keys() {
        let ctx = Context::default();
        let mut handler = InputHandler::new();
        let pos = pos2(10.0, 20.0);
        let events = frame(
            &mut handler,
            &ctx,
            vec![
                Event::PointerMoved(pos),
                Event::PointerButton {
                    pos,
                    button: PointerButton::Primary,
                    pressed: true,
                    modifiers: Modifiers::NONE,
                },
                Event::Key {
                    key: Key::Escape,
                    physical_key: None,
                    pressed: false,
                    repeat: false,
                    modifiers: Modifiers::NONE,
                },
            ],
        );

        assert!(events.contains(&InputEvent::PointerMove {
            sample: PointerSample::mouse(pos),
            modifiers: Modifiers::NONE,
        }));
        assert!(events.contains(&InputEvent::PointerDown {
            sample: PointerSample::mouse(pos),
            button: Button::Left,
            modifiers: Modifiers::NONE,
        }));
        assert!(events.contains(&InputEvent::KeyUp {
            key: Key::Escape,
            modifiers: Modifiers::NONE,
        }));
    }

    #[test]
    fn test_presses_outside_canvas_are_dropped() {
        let ctx = Context::default();
        let mut handler = InputHandler::new();
        handler.set_canvas_rect(Rect::from_min_size(pos2(100.0, 100.0), Vec2::splat(50.0)));
        let pos = pos2(10.0, 20.0);
        let events = frame(
            &mut handler,
            &ctx,
            vec![
                Event::PointerMoved(pos),
                Event::PointerButton {
                    pos,
                    button: PointerButton::Primary,
                    pressed: true,
                    modifiers: Modifiers::NONE,
                },
            ],
        );
        assert!(!events.iter().any(|e| matches!(e, InputEvent::PointerDown { .. })));
    }
}
