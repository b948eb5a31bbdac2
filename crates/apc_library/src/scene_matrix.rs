//! Scene-based radio selector.
//!
//! Every side button selects one of 8 scenes. Inside a scene each grid column is a
//! parameter whose value is picked by pressing one of its lower rows, or handed to a
//! tempo-synced randomizer with the column's top pad.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::faders::{FaderBank, FaderMode};
use crate::io::SurfaceIo;
use crate::lights::{LedImage, button_velocity, palette};
use crate::pattern::{
    ControlSurfacePattern, PatternKind, SurfaceEvent, Tick, format_values,
};
use crate::protocol::{
    Control, FADER_COUNT, GRID_COLS, GRID_ROWS, Inbound, SHIFT_NOTE, SIDE_BUTTON_COUNT,
};

pub const SCENE_COUNT: usize = SIDE_BUTTON_COUNT;

const RANDOM_ROW: usize = GRID_ROWS - 1;
const INERT_COLOR: u8 = palette::WHITE;
const RANDOM_ON_COLOR: u8 = palette::PURPLE;
const SCENE_COLORS: [u8; SCENE_COUNT] = [
    palette::RED,
    palette::ORANGE,
    palette::LIGHT_PINK,
    palette::DEEP_PINK,
    palette::BLUE,
    palette::LIGHT_BLUE,
    palette::TEAL,
    palette::YELLOW_GREEN,
];

/// One column of one scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridParameterState {
    pub selected_row: usize,
    /// Number of selectable rows, 1..=8.
    pub max_options: usize,
    pub is_random: bool,
    pub random_value: usize,
}

impl Default for GridParameterState {
    fn default() -> Self {
        Self {
            selected_row: 0,
            max_options: GRID_ROWS,
            is_random: false,
            random_value: 0,
        }
    }
}

impl GridParameterState {
    /// The value a consumer should use: the random draw when randomizing.
    pub fn value(&self) -> usize {
        if self.is_random {
            self.random_value
        } else {
            self.selected_row
        }
    }
}

/// Deterministic draw in [0, 1) for a seed. Same seed, same value, on every platform
/// that implements IEEE sine the usual way.
pub fn pseudo_random(seed: f64) -> f64 {
    let x = (seed * 99999.0 + 1.0).sin() * 10000.0;
    x - x.floor()
}

pub struct SceneMatrix {
    io: SurfaceIo,
    faders: FaderBank,
    scenes: [[GridParameterState; GRID_COLS]; SCENE_COUNT],
    side_toggles: [bool; SIDE_BUTTON_COUNT],
    current_scene: usize,
    random_scene_mode: bool,
    events: Vec<SurfaceEvent>,
}

impl SceneMatrix {
    pub fn new(io: SurfaceIo) -> Self {
        Self::with_seed(io, rand::random())
    }

    /// `seed` drives the fader blink durations.
    pub fn with_seed(io: SurfaceIo, seed: u64) -> Self {
        let mut side_toggles = [false; SIDE_BUTTON_COUNT];
        side_toggles[0] = true;
        Self {
            io,
            faders: FaderBank::new(FaderMode::Random, seed),
            scenes: [[GridParameterState::default(); GRID_COLS]; SCENE_COUNT],
            side_toggles,
            current_scene: 0,
            random_scene_mode: false,
            events: Vec::new(),
        }
    }

    pub fn current_scene(&self) -> usize {
        self.current_scene
    }

    pub fn select_scene(&mut self, index: usize) {
        if index >= SCENE_COUNT {
            return;
        }
        self.current_scene = index;
        self.side_toggles = [false; SIDE_BUTTON_COUNT];
        self.side_toggles[index] = true;
        info!("scene {index} selected");
        self.events.push(SurfaceEvent::SceneSelected(index));
        self.io.mark_dirty();
    }

    pub fn is_random_scene_mode(&self) -> bool {
        self.random_scene_mode
    }

    /// Only a flag; whoever schedules scene changes decides what it means.
    pub fn set_random_scene_mode(&mut self, active: bool) {
        if self.random_scene_mode == active {
            return;
        }
        self.random_scene_mode = active;
        info!("random scene mode {}", if active { "on" } else { "off" });
        self.events.push(SurfaceEvent::RandomSceneModeChanged(active));
        self.io.mark_dirty();
    }

    pub fn toggle_random_scene_mode(&mut self) {
        self.set_random_scene_mode(!self.random_scene_mode);
    }

    /// Effective value of a column in the current scene.
    pub fn param_value(&self, column: usize) -> usize {
        self.param_state(self.current_scene, column)
            .map(|p| p.value())
            .unwrap_or(0)
    }

    pub fn param_state(&self, scene: usize, column: usize) -> Option<GridParameterState> {
        self.scenes.get(scene)?.get(column).copied()
    }

    pub fn scene_snapshot(&self, scene: usize) -> Option<[GridParameterState; GRID_COLS]> {
        self.scenes.get(scene).copied()
    }

    /// Sets how many rows each column of a scene offers. Values are clamped to 1..=8.
    pub fn set_max_options_for_scene(&mut self, scene: usize, options: &[usize]) -> Result<()> {
        if scene >= SCENE_COUNT {
            warn!("rejected max options for scene {scene}");
            return Err(Error::InvalidScene {
                index: scene,
                count: SCENE_COUNT,
            });
        }
        if options.len() != GRID_COLS {
            warn!("rejected {} max options for scene {scene}", options.len());
            return Err(Error::OptionsLength {
                expected: GRID_COLS,
                found: options.len(),
            });
        }

        for (column, &max) in options.iter().enumerate() {
            let param = &mut self.scenes[scene][column];
            let max = max.clamp(1, GRID_ROWS);
            param.max_options = max;
            param.selected_row = param.selected_row.min(max - 1);
            param.random_value = param.random_value.min(max - 1);
            self.notify_parameter(scene, column);
        }
        Ok(())
    }

    pub fn reset_all_max_options(&mut self) {
        for scene in 0..SCENE_COUNT {
            for column in 0..GRID_COLS {
                self.scenes[scene][column] = GridParameterState {
                    max_options: 1,
                    ..GridParameterState::default()
                };
                self.notify_parameter(scene, column);
            }
        }
    }

    pub fn set_fader_mode(&mut self, mode: FaderMode) {
        let now = self.io.timestamp();
        if self.faders.set_mode(mode, now) {
            info!("fader mode {mode}");
            self.events.push(SurfaceEvent::FaderModeChanged(mode));
            self.collect_fader_changes();
            self.io.mark_dirty();
        }
    }

    fn notify_parameter(&mut self, scene: usize, column: usize) {
        let state = self.scenes[scene][column];
        self.events.push(SurfaceEvent::GridParameterChanged {
            scene,
            column,
            state,
        });
        self.io.mark_dirty();
    }

    fn collect_fader_changes(&mut self) {
        for (index, value) in self.faders.take_changes() {
            self.events.push(SurfaceEvent::FaderValueChanged { index, value });
            self.io.mark_dirty();
        }
    }

    fn handle_grid_press(&mut self, column: usize, row: usize) {
        let scene = self.current_scene;
        let param = &mut self.scenes[scene][column];

        if row == RANDOM_ROW {
            param.is_random = !param.is_random;
            if !param.is_random {
                param.selected_row = (param.max_options - 1).min(GRID_ROWS - 2);
            }
            self.notify_parameter(scene, column);
            return;
        }

        if row < param.max_options {
            param.selected_row = row;
            param.is_random = false;
            self.notify_parameter(scene, column);
        }
    }

    fn randomize_current_scene(&mut self, tempo_index: u64) {
        let scene = self.current_scene;
        for column in 0..GRID_COLS {
            let param = &mut self.scenes[scene][column];
            if !param.is_random {
                continue;
            }
            let draw = pseudo_random(tempo_index.wrapping_add(column as u64) as f64);
            let next = ((draw * param.max_options as f64) as usize).min(param.max_options - 1);
            if param.random_value != next {
                param.random_value = next;
                self.notify_parameter(scene, column);
            }
        }
    }

    fn led_image(&self) -> LedImage {
        let mut image = LedImage::new();
        let scene_color = SCENE_COLORS
            .get(self.current_scene)
            .copied()
            .unwrap_or(palette::DEFAULT_ACTIVE);

        for (column, param) in self.scenes[self.current_scene].iter().enumerate() {
            for row in 0..GRID_ROWS {
                let velocity = if row == RANDOM_ROW {
                    if param.is_random { RANDOM_ON_COLOR } else { INERT_COLOR }
                } else if row < param.max_options {
                    if row == param.value() { scene_color } else { INERT_COLOR }
                } else {
                    palette::OFF
                };
                image.set_grid(column, row, velocity);
            }
        }

        for i in 0..SCENE_COUNT {
            image.set_side_button(i, button_velocity(i == self.current_scene, palette::FULL));
        }
        for (i, toggled) in self.faders.toggles().iter().enumerate() {
            image.set_fader_button(i, button_velocity(*toggled, palette::FULL));
        }
        image
    }
}

impl ControlSurfacePattern for SceneMatrix {
    fn kind(&self) -> PatternKind {
        PatternKind::SceneMatrix
    }

    fn handle_message(&mut self, message: &[u8]) {
        let Some(inbound) = Inbound::parse(message) else {
            return;
        };
        debug!("scene matrix <- {inbound:?}");
        let now = self.io.timestamp();

        if let Some((index, value)) = inbound.fader() {
            self.faders.set_raw(index, value, now);
            self.collect_fader_changes();
            return;
        }

        let Some(note) = inbound.note() else {
            return;
        };
        if note == SHIFT_NOTE {
            if inbound.is_press() {
                self.toggle_random_scene_mode();
            }
            return;
        }
        if !inbound.is_press() {
            return;
        }

        match Control::classify(note) {
            Control::FaderButton(index) => {
                self.faders.toggle(index, now);
                self.collect_fader_changes();
                self.io.mark_dirty();
            }
            Control::SideButton(index) => self.select_scene(index),
            Control::Grid(coord) => self.handle_grid_press(coord.column, coord.row),
            Control::Unknown => {}
        }
    }

    fn update(&mut self, tick: Tick) {
        self.randomize_current_scene(tick.tempo_index);
        let now = self.io.timestamp();
        self.faders.process(now);
        self.collect_fader_changes();

        if self.io.is_dirty() {
            let image = self.led_image();
            self.io.flush(image);
        }
    }

    fn is_dirty(&self) -> bool {
        self.io.is_dirty()
    }

    fn fader_values(&self) -> [f32; FADER_COUNT] {
        self.faders.values()
    }

    fn fader_button_toggles(&self) -> [bool; FADER_COUNT] {
        self.faders.toggles()
    }

    fn side_button_toggles(&self) -> [bool; SIDE_BUTTON_COUNT] {
        self.side_toggles
    }

    fn preset_faders(&mut self, values: &[f32; FADER_COUNT], toggles: &[bool; FADER_COUNT]) {
        self.faders.preset(values, toggles, self.io.timestamp());
        self.collect_fader_changes();
        self.io.mark_dirty();
    }

    fn fader_mode(&self) -> FaderMode {
        self.faders.mode()
    }

    fn set_fader_mode(&mut self, mode: FaderMode) -> Result<()> {
        SceneMatrix::set_fader_mode(self, mode);
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    fn debug_lines(&self) -> Vec<String> {
        let mut lines = vec![
            "Scene Matrix".to_string(),
            format!(
                "scene={} randomScene={}",
                self.current_scene,
                if self.random_scene_mode { "ON" } else { "OFF" }
            ),
            format!(
                "faderMode={} faders={}",
                self.faders.mode(),
                format_values(&self.faders.values())
            ),
        ];
        for (column, param) in self.scenes[self.current_scene].iter().enumerate() {
            let label = if param.is_random {
                format!("R{}", param.random_value)
            } else {
                format!("S{}", param.selected_row)
            };
            lines.push(format!("col{column}: {label}/{}", param.max_options));
        }
        lines
    }

    fn as_scene_matrix_mut(&mut self) -> Option<&mut SceneMatrix> {
        Some(self)
    }
}
