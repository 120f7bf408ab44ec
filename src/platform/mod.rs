// Platform module - window, input and the surface the renderer presents to

pub mod event;
pub mod window;

pub use event::{Control, InputEvent};
pub use window::AppWindow;
