// Input events and the handlers that react to them
//
// Platform events are translated into `InputEvent` once, then offered to the
// registered handlers in registration order.

use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::render::Extent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Resized(Extent),
    CloseRequested,
    KeyPressed(KeyCode),
    /// Key held down long enough for the OS to repeat it
    KeyRepeat(KeyCode),
    KeyReleased(KeyCode),
    MousePressed(MouseButton),
    MouseReleased(MouseButton),
    /// Cursor position in physical pixels
    MouseMoved { x: f64, y: f64 },
    MouseScrolled { x: f32, y: f32 },
}

/// What a handler wants done after seeing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Not interested, offer the event to the next handler
    Continue,
    /// Consumed; later handlers do not see it
    Handled,
    /// Consumed, and the application should close
    Exit,
}

type Handler<C> = Box<dyn FnMut(&InputEvent, &C) -> Control>;

/// Ordered handler list. `C` is whatever the handlers get to act on (the window).
pub struct Handlers<C> {
    handlers: Vec<Handler<C>>,
}

impl<C> Default for Handlers<C> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<C> Handlers<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, handler: F)
    where
        F: FnMut(&InputEvent, &C) -> Control + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Offer `event` to each handler until one consumes it
    pub fn dispatch(&mut self, event: &InputEvent, context: &C) -> Control {
        for handler in &mut self.handlers {
            match handler(event, context) {
                Control::Continue => continue,
                consumed => return consumed,
            }
        }
        Control::Continue
    }
}

/// Translate a winit window event; `None` for events nobody listens to
pub fn translate_window_event(event: &WindowEvent) -> Option<InputEvent> {
    let input = match event {
        WindowEvent::Resized(size) => InputEvent::Resized(Extent::new(size.width, size.height)),
        WindowEvent::CloseRequested => InputEvent::CloseRequested,
        WindowEvent::KeyboardInput { event, .. } => {
            let PhysicalKey::Code(code) = event.physical_key else {
                return None;
            };
            match (event.state, event.repeat) {
                (ElementState::Pressed, true) => InputEvent::KeyRepeat(code),
                (ElementState::Pressed, false) => InputEvent::KeyPressed(code),
                (ElementState::Released, _) => InputEvent::KeyReleased(code),
            }
        }
        WindowEvent::MouseInput { state, button, .. } => match state {
            ElementState::Pressed => InputEvent::MousePressed(*button),
            ElementState::Released => InputEvent::MouseReleased(*button),
        },
        WindowEvent::CursorMoved { position, .. } => InputEvent::MouseMoved {
            x: position.x,
            y: position.y,
        },
        WindowEvent::MouseWheel { delta, .. } => match delta {
            MouseScrollDelta::LineDelta(x, y) => InputEvent::MouseScrolled { x: *x, y: *y },
            MouseScrollDelta::PixelDelta(p) => InputEvent::MouseScrolled {
                x: p.x as f32,
                y: p.y as f32,
            },
        },
        _ => return None,
    };
    Some(input)
}

/// Parse a key name from the config file ("Escape", "F11", "Q", "KeyQ", "Space", ...)
pub fn parse_key_code(name: &str) -> Option<KeyCode> {
    let name = name.trim();
    let lower = name.to_ascii_lowercase();

    let named = match lower.as_str() {
        "escape" | "esc" => Some(KeyCode::Escape),
        "space" => Some(KeyCode::Space),
        "enter" | "return" => Some(KeyCode::Enter),
        "tab" => Some(KeyCode::Tab),
        "backspace" => Some(KeyCode::Backspace),
        "up" | "arrowup" => Some(KeyCode::ArrowUp),
        "down" | "arrowdown" => Some(KeyCode::ArrowDown),
        "left" | "arrowleft" => Some(KeyCode::ArrowLeft),
        "right" | "arrowright" => Some(KeyCode::ArrowRight),
        "f1" => Some(KeyCode::F1),
        "f2" => Some(KeyCode::F2),
        "f3" => Some(KeyCode::F3),
        "f4" => Some(KeyCode::F4),
        "f5" => Some(KeyCode::F5),
        "f6" => Some(KeyCode::F6),
        "f7" => Some(KeyCode::F7),
        "f8" => Some(KeyCode::F8),
        "f9" => Some(KeyCode::F9),
        "f10" => Some(KeyCode::F10),
        "f11" => Some(KeyCode::F11),
        "f12" => Some(KeyCode::F12),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    // Single letters or digits, optionally with winit's Key/Digit prefix
    let short = lower
        .strip_prefix("key")
        .or_else(|| lower.strip_prefix("digit"))
        .unwrap_or(&lower);
    let mut chars = short.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => letter_or_digit(c),
        _ => None,
    }
}

fn letter_or_digit(c: char) -> Option<KeyCode> {
    const LETTERS: [KeyCode; 26] = [
        KeyCode::KeyA,
        KeyCode::KeyB,
        KeyCode::KeyC,
        KeyCode::KeyD,
        KeyCode::KeyE,
        KeyCode::KeyF,
        KeyCode::KeyG,
        KeyCode::KeyH,
        KeyCode::KeyI,
        KeyCode::KeyJ,
        KeyCode::KeyK,
        KeyCode::KeyL,
        KeyCode::KeyM,
        KeyCode::KeyN,
        KeyCode::KeyO,
        KeyCode::KeyP,
        KeyCode::KeyQ,
        KeyCode::KeyR,
        KeyCode::KeyS,
        KeyCode::KeyT,
        KeyCode::KeyU,
        KeyCode::KeyV,
        KeyCode::KeyW,
        KeyCode::KeyX,
        KeyCode::KeyY,
        KeyCode::KeyZ,
    ];
    const DIGITS: [KeyCode; 10] = [
        KeyCode::Digit0,
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
        KeyCode::Digit5,
        KeyCode::Digit6,
        KeyCode::Digit7,
        KeyCode::Digit8,
        KeyCode::Digit9,
    ];

    match c {
        'a'..='z' => Some(LETTERS[(c as u8 - b'a') as usize]),
        '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn parses_named_and_single_character_keys() {
        assert_eq!(parse_key_code("Escape"), Some(KeyCode::Escape));
        assert_eq!(parse_key_code("esc"), Some(KeyCode::Escape));
        assert_eq!(parse_key_code("F11"), Some(KeyCode::F11));
        assert_eq!(parse_key_code(" q "), Some(KeyCode::KeyQ));
        assert_eq!(parse_key_code("KeyW"), Some(KeyCode::KeyW));
        assert_eq!(parse_key_code("7"), Some(KeyCode::Digit7));
        assert_eq!(parse_key_code("Digit0"), Some(KeyCode::Digit0));
    }

    #[test]
    fn unknown_key_names_are_rejected() {
        assert_eq!(parse_key_code(""), None);
        assert_eq!(parse_key_code("F13"), None);
        assert_eq!(parse_key_code("Hyper"), None);
        assert_eq!(parse_key_code("KeyAB"), None);
    }

    #[test]
    fn dispatch_stops_at_first_consumer() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut handlers: Handlers<()> = Handlers::new();

        let log = seen.clone();
        handlers.push(move |_, _| {
            log.borrow_mut().push("first");
            Control::Continue
        });
        let log = seen.clone();
        handlers.push(move |event, _| {
            log.borrow_mut().push("second");
            match event {
                InputEvent::KeyPressed(KeyCode::Escape) => Control::Exit,
                InputEvent::KeyPressed(_) => Control::Handled,
                _ => Control::Continue,
            }
        });
        let log = seen.clone();
        handlers.push(move |_, _| {
            log.borrow_mut().push("third");
            Control::Continue
        });

        assert_eq!(
            handlers.dispatch(&InputEvent::KeyPressed(KeyCode::KeyA), &()),
            Control::Handled
        );
        assert_eq!(*seen.borrow(), vec!["first", "second"]);

        seen.borrow_mut().clear();
        assert_eq!(
            handlers.dispatch(&InputEvent::MouseMoved { x: 1.0, y: 2.0 }, &()),
            Control::Continue
        );
        assert_eq!(*seen.borrow(), vec!["first", "second", "third"]);

        assert_eq!(
            handlers.dispatch(&InputEvent::KeyPressed(KeyCode::Escape), &()),
            Control::Exit
        );
    }

    #[test]
    fn empty_handler_set_continues() {
        let mut handlers: Handlers<()> = Handlers::new();
        assert!(handlers.is_empty());
        assert_eq!(
            handlers.dispatch(&InputEvent::CloseRequested, &()),
            Control::Continue
        );
    }

    #[test]
    fn translates_resize_and_close() {
        let resized = WindowEvent::Resized(winit::dpi::PhysicalSize::new(640, 0));
        assert_eq!(
            translate_window_event(&resized),
            Some(InputEvent::Resized(Extent::new(640, 0)))
        );
        assert_eq!(
            translate_window_event(&WindowEvent::CloseRequested),
            Some(InputEvent::CloseRequested)
        );
        assert_eq!(translate_window_event(&WindowEvent::Focused(true)), None);
    }
}
