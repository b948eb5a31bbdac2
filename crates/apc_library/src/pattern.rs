use std::fmt;

use serde::Deserialize;

use crate::button_layer::{ButtonLayer, ButtonValue};
use crate::error::{Error, Result};
use crate::faders::FaderMode;
use crate::io::SurfaceIo;
use crate::lerp_surface::LerpSurface;
use crate::protocol::{FADER_COUNT, SIDE_BUTTON_COUNT};
use crate::scene_matrix::{GridParameterState, SceneMatrix};
use crate::sequencer::StepSequencer;
use crate::toggle_matrix::ToggleMatrix;

/// Timing supplied by the host once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tick {
    /// Beat counter, feeds the scene matrix randomizer.
    pub tempo_index: u64,
    /// Playback column of the step sequencer.
    pub step: usize,
    /// Elapsed beats including the fraction, for sub-beat schedules.
    pub beat: f64,
}

/// Notifications for collaborators, drained by the host after input or ticks.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    SceneSelected(usize),
    PatternSelected(usize),
    RandomSceneModeChanged(bool),
    FaderModeChanged(FaderMode),
    FaderValueChanged {
        index: usize,
        value: f32,
    },
    GridParameterChanged {
        scene: usize,
        column: usize,
        state: GridParameterState,
    },
    PageSelected(usize),
    ButtonChanged {
        key: String,
        value: ButtonValue,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    #[default]
    SceneMatrix,
    Sequencer,
    ToggleMatrix,
    LerpSurface,
    ButtonLayer,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatternKind::SceneMatrix => "scene_matrix",
            PatternKind::Sequencer => "sequencer",
            PatternKind::ToggleMatrix => "toggle_matrix",
            PatternKind::LerpSurface => "lerp_surface",
            PatternKind::ButtonLayer => "button_layer",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "scene_matrix" | "scene" => Ok(PatternKind::SceneMatrix),
            "sequencer" | "step_sequencer" => Ok(PatternKind::Sequencer),
            "toggle_matrix" | "toggle" => Ok(PatternKind::ToggleMatrix),
            "lerp_surface" | "lerp" => Ok(PatternKind::LerpSurface),
            "button_layer" | "buttons" => Ok(PatternKind::ButtonLayer),
            other => Err(format!(
                "invalid pattern={other:?} (expected: \"scene_matrix\", \"sequencer\", \"toggle_matrix\", \"lerp_surface\", \"button_layer\")"
            )),
        }
    }
}

/// One interaction model for the grid controller.
pub trait ControlSurfacePattern: Send {
    fn kind(&self) -> PatternKind;

    /// Consumes one raw inbound message. Unknown or malformed input is ignored.
    fn handle_message(&mut self, message: &[u8]);

    /// Advances time-based state and flushes LEDs when something changed.
    fn update(&mut self, tick: Tick);

    fn is_dirty(&self) -> bool;

    fn fader_values(&self) -> [f32; FADER_COUNT];

    fn fader_button_toggles(&self) -> [bool; FADER_COUNT];

    fn side_button_toggles(&self) -> [bool; SIDE_BUTTON_COUNT];

    /// Start-up fader positions and fader button states.
    fn preset_faders(&mut self, values: &[f32; FADER_COUNT], toggles: &[bool; FADER_COUNT]);

    fn fader_mode(&self) -> FaderMode {
        FaderMode::Mute
    }

    fn set_fader_mode(&mut self, mode: FaderMode) -> Result<()> {
        if mode == FaderMode::Mute {
            return Ok(());
        }
        Err(Error::UnsupportedFaderMode {
            kind: self.kind(),
            mode,
        })
    }

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        Vec::new()
    }

    /// Text for the debug overlay, first line is the title.
    fn debug_lines(&self) -> Vec<String>;

    fn as_scene_matrix_mut(&mut self) -> Option<&mut SceneMatrix> {
        None
    }

    fn as_button_layer_mut(&mut self) -> Option<&mut ButtonLayer> {
        None
    }
}

pub fn build_pattern(
    kind: PatternKind,
    io: SurfaceIo,
    seed: u64,
) -> Box<dyn ControlSurfacePattern> {
    match kind {
        PatternKind::SceneMatrix => Box::new(SceneMatrix::with_seed(io, seed)),
        PatternKind::Sequencer => Box::new(StepSequencer::with_seed(io, seed)),
        PatternKind::ToggleMatrix => Box::new(ToggleMatrix::new(io)),
        PatternKind::LerpSurface => Box::new(LerpSurface::new(io)),
        PatternKind::ButtonLayer => Box::new(ButtonLayer::with_seed(io, seed)),
    }
}

pub(crate) fn format_values(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.2}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn format_flags(flags: &[bool]) -> String {
    flags.iter().map(|&f| if f { '1' } else { '0' }).collect()
}
