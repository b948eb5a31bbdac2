//! 8x8 step sequencer: one active row per column, 8 patterns on the side buttons.

use log::{debug, info};

use crate::error::Result;
use crate::faders::{FaderBank, FaderMode};
use crate::io::SurfaceIo;
use crate::lights::{LedImage, button_velocity, palette};
use crate::pattern::{ControlSurfacePattern, PatternKind, SurfaceEvent, Tick, format_values};
use crate::protocol::{Control, FADER_COUNT, GRID_COLS, GRID_ROWS, Inbound, SIDE_BUTTON_COUNT};

pub const PATTERN_COUNT: usize = SIDE_BUTTON_COUNT;

const CURSOR_COLOR: u8 = palette::WHITE;
const PATTERN_COLORS: [u8; PATTERN_COUNT] = [
    palette::RED,
    palette::ORANGE,
    palette::LIGHT_PINK,
    palette::DEEP_PINK,
    palette::PURPLE,
    palette::BLUE,
    palette::LIGHT_BLUE,
    palette::TEAL,
];

pub struct StepSequencer {
    io: SurfaceIo,
    faders: FaderBank,
    patterns: [[usize; GRID_COLS]; PATTERN_COUNT],
    side_toggles: [bool; SIDE_BUTTON_COUNT],
    current_pattern: usize,
    active_step: usize,
    events: Vec<SurfaceEvent>,
}

impl StepSequencer {
    pub fn new(io: SurfaceIo) -> Self {
        Self::with_seed(io, rand::random())
    }

    pub fn with_seed(io: SurfaceIo, seed: u64) -> Self {
        let mut side_toggles = [false; SIDE_BUTTON_COUNT];
        side_toggles[0] = true;
        Self {
            io,
            faders: FaderBank::new(FaderMode::Mute, seed),
            patterns: [[0; GRID_COLS]; PATTERN_COUNT],
            side_toggles,
            current_pattern: 0,
            active_step: 0,
            events: Vec::new(),
        }
    }

    /// Active row of a column, 0 for anything out of range.
    pub fn sequence_value(&self, pattern: usize, column: usize) -> usize {
        self.patterns
            .get(pattern)
            .and_then(|p| p.get(column))
            .copied()
            .unwrap_or(0)
    }

    pub fn pattern_snapshot(&self, pattern: usize) -> [usize; GRID_COLS] {
        self.patterns.get(pattern).copied().unwrap_or([0; GRID_COLS])
    }

    pub fn current_pattern(&self) -> usize {
        self.current_pattern
    }

    pub fn active_step(&self) -> usize {
        self.active_step
    }

    pub fn clear_pattern(&mut self, pattern: usize) {
        let Some(p) = self.patterns.get_mut(pattern) else {
            return;
        };
        *p = [0; GRID_COLS];
        self.io.mark_dirty();
    }

    pub fn clear_current_pattern(&mut self) {
        self.clear_pattern(self.current_pattern);
    }

    pub fn select_pattern(&mut self, index: usize) {
        if index >= PATTERN_COUNT || index == self.current_pattern {
            return;
        }
        self.current_pattern = index;
        self.side_toggles = [false; SIDE_BUTTON_COUNT];
        self.side_toggles[index] = true;
        info!("pattern {index} selected");
        self.events.push(SurfaceEvent::PatternSelected(index));
        self.io.mark_dirty();
    }

    fn collect_fader_changes(&mut self) {
        for (index, value) in self.faders.take_changes() {
            self.events.push(SurfaceEvent::FaderValueChanged { index, value });
            self.io.mark_dirty();
        }
    }

    fn led_image(&self) -> LedImage {
        let mut image = LedImage::new();
        let color = PATTERN_COLORS
            .get(self.current_pattern)
            .copied()
            .unwrap_or(palette::WHITE);

        for (column, &active_row) in self.patterns[self.current_pattern].iter().enumerate() {
            for row in 0..GRID_ROWS {
                let velocity = if row == active_row {
                    color
                } else if column == self.active_step {
                    CURSOR_COLOR
                } else {
                    palette::OFF
                };
                image.set_grid(column, row, velocity);
            }
        }

        for i in 0..PATTERN_COUNT {
            image.set_side_button(i, button_velocity(i == self.current_pattern, palette::FULL));
        }
        for (i, toggled) in self.faders.toggles().iter().enumerate() {
            image.set_fader_button(i, button_velocity(*toggled, palette::FULL));
        }
        image
    }
}

impl ControlSurfacePattern for StepSequencer {
    fn kind(&self) -> PatternKind {
        PatternKind::Sequencer
    }

    fn handle_message(&mut self, message: &[u8]) {
        let Some(inbound) = Inbound::parse(message) else {
            return;
        };
        debug!("sequencer <- {inbound:?}");
        let now = self.io.timestamp();

        if let Some((index, value)) = inbound.fader() {
            self.faders.set_raw(index, value, now);
            self.collect_fader_changes();
            return;
        }
        if !inbound.is_press() {
            return;
        }
        let Some(note) = inbound.note() else {
            return;
        };

        match Control::classify(note) {
            Control::Grid(coord) => {
                self.patterns[self.current_pattern][coord.column] = coord.row;
                self.io.mark_dirty();
            }
            Control::FaderButton(index) => {
                self.faders.toggle(index, now);
                self.collect_fader_changes();
                self.io.mark_dirty();
            }
            Control::SideButton(index) => self.select_pattern(index),
            Control::Unknown => {}
        }
    }

    fn update(&mut self, tick: Tick) {
        let step = tick.step.min(GRID_COLS - 1);
        if step != self.active_step {
            self.active_step = step;
            self.io.mark_dirty();
        }

        self.faders.process(self.io.timestamp());
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
        let now = self.io.timestamp();
        if self.faders.set_mode(mode, now) {
            info!("fader mode {mode}");
            self.events.push(SurfaceEvent::FaderModeChanged(mode));
            self.collect_fader_changes();
            self.io.mark_dirty();
        }
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    fn debug_lines(&self) -> Vec<String> {
        let sequence = self
            .pattern_snapshot(self.current_pattern)
            .iter()
            .map(|row| row.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            "Step Sequencer".to_string(),
            format!("pattern={} step={}", self.current_pattern, self.active_step),
            format!("faders={}", format_values(&self.faders.values())),
            format!("sequence={sequence}"),
        ]
    }
}
