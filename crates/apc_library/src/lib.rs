pub mod button_layer;
pub mod clock;
pub mod error;
pub mod faders;
pub mod io;
pub mod lerp_surface;
pub mod lights;
pub mod pattern;
pub mod protocol;
pub mod scene_matrix;
pub mod sequencer;
pub mod toggle_matrix;
pub mod transport;

pub use error::{Error, Result};
pub use pattern::{ControlSurfacePattern, PatternKind, SurfaceEvent, Tick, build_pattern};
