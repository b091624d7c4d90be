mod gpu;
mod headless;
mod overlay;

pub use gpu::{OverlayFrame, Renderer, MAX_LIGHTS};
pub use headless::HeadlessTarget;
pub use overlay::show_panel;
