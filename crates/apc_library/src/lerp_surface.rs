//! Pads whose value eases between 0 and 1 over a fixed time after each press.
//!
//! A press starts a 300 ms ramp towards the opposite of the cell's settled value.
//! Pressing again before the ramp ends flips the direction and restarts the ramp
//! from the far end, so the value jumps rather than turning around in place.

use log::debug;

use crate::faders::{FaderBank, FaderMode};
use crate::io::SurfaceIo;
use crate::lights::{LedImage, button_velocity, palette};
use crate::pattern::{ControlSurfacePattern, PatternKind, SurfaceEvent, Tick, format_values};
use crate::protocol::{
    Control, FADER_COUNT, GRID_COLS, GRID_ROWS, Inbound, SIDE_BUTTON_COUNT, clamp01, scale,
};

pub const LERP_DURATION_MS: f64 = 300.0;
const CHANGE_EPSILON: f32 = 1e-3;
/// Upper end of the LED brightness band; full velocity clips on the hardware.
const MAX_INTENSITY: f32 = 0.7;

type Matrix<T> = [[T; GRID_ROWS]; GRID_COLS];

/// Which piece of cell state drives a pad's LED.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CellDisplay {
    Inactive,
    Toggled,
    OneShot,
    Pressed,
    #[default]
    Lerp,
}

#[derive(Clone, Copy, Debug, Default)]
struct Cell {
    pressed: bool,
    previous: bool,
    one_shot: bool,
    toggled: bool,
    value: f32,
    direction: i8,
    last_press: Option<f64>,
    display: CellDisplay,
}

impl Cell {
    fn on_rising_edge(&mut self, now: f64) {
        let recent = self
            .last_press
            .is_some_and(|t| now - t < LERP_DURATION_MS);
        self.direction = if recent {
            if self.direction == 0 { 1 } else { -self.direction }
        } else if self.value == 0.0 {
            1
        } else {
            -1
        };
        self.last_press = Some(now);
    }

    fn advance(&mut self, now: f64) {
        let Some(pressed_at) = self.last_press else {
            return;
        };
        let elapsed = now - pressed_at;
        self.value = match self.direction {
            1 if elapsed >= LERP_DURATION_MS => 1.0,
            -1 if elapsed >= LERP_DURATION_MS => 0.0,
            1 => clamp01((elapsed / LERP_DURATION_MS) as f32),
            -1 => 1.0 - clamp01((elapsed / LERP_DURATION_MS) as f32),
            _ => self.value,
        };
    }

    fn shown(&self, display: CellDisplay) -> f32 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match display {
            CellDisplay::Inactive => 0.0,
            CellDisplay::Toggled => flag(self.toggled),
            CellDisplay::OneShot => flag(self.one_shot),
            CellDisplay::Pressed => flag(self.pressed),
            CellDisplay::Lerp => self.value,
        }
    }
}

pub struct LerpSurface {
    io: SurfaceIo,
    faders: FaderBank,
    cells: Matrix<Cell>,
    side_toggles: [bool; SIDE_BUTTON_COUNT],
    events: Vec<SurfaceEvent>,
}

impl LerpSurface {
    pub fn new(io: SurfaceIo) -> Self {
        Self {
            io,
            faders: FaderBank::new(FaderMode::Mute, 0),
            cells: [[Cell::default(); GRID_ROWS]; GRID_COLS],
            side_toggles: [false; SIDE_BUTTON_COUNT],
            events: Vec::new(),
        }
    }

    /// Back to construction defaults.
    pub fn reset(&mut self) {
        let now = self.io.timestamp();
        self.cells = [[Cell::default(); GRID_ROWS]; GRID_COLS];
        self.side_toggles = [false; SIDE_BUTTON_COUNT];
        for (index, toggled) in self.faders.toggles().into_iter().enumerate() {
            if toggled {
                self.faders.toggle(index, now);
            }
        }
        self.collect_fader_changes();
        self.io.mark_dirty();
    }

    pub fn set_cell_display(&mut self, column: usize, row: usize, display: CellDisplay) {
        let Some(cell) = self.cells.get_mut(column).and_then(|c| c.get_mut(row)) else {
            return;
        };
        if cell.display != display {
            cell.display = display;
            self.io.mark_dirty();
        }
    }

    pub fn cell_display(&self, column: usize, row: usize) -> CellDisplay {
        self.cell(column, row).map(|c| c.display).unwrap_or_default()
    }

    pub fn cell_value(&self, column: usize, row: usize, display: CellDisplay) -> f32 {
        self.cell(column, row).map(|c| c.shown(display)).unwrap_or(0.0)
    }

    pub fn lerp_value(&self, column: usize, row: usize) -> f32 {
        self.cell_value(column, row, CellDisplay::Lerp)
    }

    pub fn direction(&self, column: usize, row: usize) -> i8 {
        self.cell(column, row).map(|c| c.direction).unwrap_or(0)
    }

    pub fn pressed_matrix(&self) -> Matrix<bool> {
        self.map_cells(|c| c.pressed)
    }

    pub fn toggle_matrix(&self) -> Matrix<bool> {
        self.map_cells(|c| c.toggled)
    }

    pub fn one_shot_matrix(&self) -> Matrix<bool> {
        self.map_cells(|c| c.one_shot)
    }

    pub fn lerp_matrix(&self) -> Matrix<f32> {
        self.map_cells(|c| c.value)
    }

    fn cell(&self, column: usize, row: usize) -> Option<&Cell> {
        self.cells.get(column)?.get(row)
    }

    fn map_cells<T: Copy + Default>(&self, f: impl Fn(&Cell) -> T) -> Matrix<T> {
        let mut out = [[T::default(); GRID_ROWS]; GRID_COLS];
        for (column, rows) in self.cells.iter().enumerate() {
            for (row, cell) in rows.iter().enumerate() {
                out[column][row] = f(cell);
            }
        }
        out
    }

    fn collect_fader_changes(&mut self) {
        for (index, value) in self.faders.take_changes() {
            self.events.push(SurfaceEvent::FaderValueChanged { index, value });
            self.io.mark_dirty();
        }
    }

    fn advance_cells(&mut self, now: f64) {
        let mut changed = false;
        for cell in self.cells.iter_mut().flatten() {
            let one_shot = cell.pressed && !cell.previous;
            if one_shot != cell.one_shot && cell.display == CellDisplay::OneShot {
                changed = true;
            }
            cell.one_shot = one_shot;
            if cell.one_shot {
                cell.on_rising_edge(now);
            }
            let before = cell.value;
            cell.advance(now);
            if (cell.value - before).abs() > CHANGE_EPSILON {
                changed = true;
            }
            cell.previous = cell.pressed;
        }
        if changed {
            self.io.mark_dirty();
        }
    }

    fn led_image(&self) -> LedImage {
        let mut image = LedImage::new();
        for (column, rows) in self.cells.iter().enumerate() {
            for (row, cell) in rows.iter().enumerate() {
                let intensity = scale(cell.shown(cell.display), 0.0, 1.0, 0.0, MAX_INTENSITY);
                image.set_grid(column, row, (intensity * 127.0).round() as u8);
            }
        }
        for (i, &on) in self.side_toggles.iter().enumerate() {
            image.set_side_button(i, button_velocity(on, palette::FULL));
        }
        for (i, on) in self.faders.toggles().iter().enumerate() {
            image.set_fader_button(i, button_velocity(*on, palette::FULL));
        }
        image
    }
}

impl ControlSurfacePattern for LerpSurface {
    fn kind(&self) -> PatternKind {
        PatternKind::LerpSurface
    }

    fn handle_message(&mut self, message: &[u8]) {
        let Some(inbound) = Inbound::parse(message) else {
            return;
        };
        debug!("lerp surface <- {inbound:?}");
        let now = self.io.timestamp();

        if let Some((index, value)) = inbound.fader() {
            self.faders.set_raw(index, value, now);
            self.collect_fader_changes();
            return;
        }
        let Some(note) = inbound.note() else {
            return;
        };

        match Control::classify(note) {
            Control::Grid(coord) => {
                let pressed = inbound.is_press();
                let cell = &mut self.cells[coord.column][coord.row];
                cell.pressed = pressed;
                if pressed {
                    cell.toggled = !cell.toggled;
                }
                self.io.mark_dirty();
            }
            Control::FaderButton(index) if inbound.is_press() => {
                self.faders.toggle(index, now);
                self.collect_fader_changes();
                self.io.mark_dirty();
            }
            Control::SideButton(index) if inbound.is_press() => {
                self.side_toggles[index] = !self.side_toggles[index];
                self.io.mark_dirty();
            }
            _ => {}
        }
    }

    fn update(&mut self, _tick: Tick) {
        let now = self.io.timestamp();
        self.advance_cells(now);
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

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    fn debug_lines(&self) -> Vec<String> {
        let count = |m: Matrix<bool>| m.iter().flatten().filter(|&&on| on).count();
        let mut lines = vec![
            "Lerp Surface".to_string(),
            format!(
                "pressed={} toggled={}",
                count(self.pressed_matrix()),
                count(self.toggle_matrix())
            ),
            format!("faders={}", format_values(&self.faders.values())),
        ];
        for row in (0..GRID_ROWS).rev() {
            let values: Vec<f32> = (0..GRID_COLS).map(|c| self.cells[c][row].value).collect();
            lines.push(format_values(&values));
        }
        lines
    }
}
