use log::debug;

use crate::faders::{FaderBank, FaderMode};
use crate::io::SurfaceIo;
use crate::lights::{LedImage, button_velocity, palette};
use crate::pattern::{
    ControlSurfacePattern, PatternKind, SurfaceEvent, Tick, format_flags, format_values,
};
use crate::protocol::{Control, FADER_COUNT, GRID_COLS, GRID_ROWS, Inbound, SIDE_BUTTON_COUNT};

/// Every pad, side button and fader button is an independent on/off switch.
pub struct ToggleMatrix {
    io: SurfaceIo,
    faders: FaderBank,
    cells: [[bool; GRID_ROWS]; GRID_COLS],
    side_toggles: [bool; SIDE_BUTTON_COUNT],
    events: Vec<SurfaceEvent>,
}

impl ToggleMatrix {
    pub fn new(io: SurfaceIo) -> Self {
        Self {
            io,
            faders: FaderBank::new(FaderMode::Mute, 0),
            cells: [[false; GRID_ROWS]; GRID_COLS],
            side_toggles: [false; SIDE_BUTTON_COUNT],
            events: Vec::new(),
        }
    }

    pub fn cell(&self, column: usize, row: usize) -> bool {
        self.cells
            .get(column)
            .and_then(|c| c.get(row))
            .copied()
            .unwrap_or(false)
    }

    /// Copy of the grid, `[column][row]`.
    pub fn toggle_matrix(&self) -> [[bool; GRID_ROWS]; GRID_COLS] {
        self.cells
    }

    fn led_image(&self) -> LedImage {
        let mut image = LedImage::new();
        for (column, rows) in self.cells.iter().enumerate() {
            for (row, &on) in rows.iter().enumerate() {
                image.set_grid(column, row, button_velocity(on, palette::TOGGLE_ON));
            }
        }
        for (i, &on) in self.side_toggles.iter().enumerate() {
            image.set_side_button(i, button_velocity(on, palette::TOGGLE_ON));
        }
        for (i, on) in self.faders.toggles().iter().enumerate() {
            image.set_fader_button(i, button_velocity(*on, palette::TOGGLE_ON));
        }
        image
    }
}

impl ControlSurfacePattern for ToggleMatrix {
    fn kind(&self) -> PatternKind {
        PatternKind::ToggleMatrix
    }

    fn handle_message(&mut self, message: &[u8]) {
        let Some(inbound) = Inbound::parse(message) else {
            return;
        };
        debug!("toggle matrix <- {inbound:?}");
        let now = self.io.timestamp();

        if let Some((index, value)) = inbound.fader() {
            self.faders.set_raw(index, value, now);
        } else if let (true, Some(note)) = (inbound.is_press(), inbound.note()) {
            match Control::classify(note) {
                Control::Grid(coord) => {
                    let cell = &mut self.cells[coord.column][coord.row];
                    *cell = !*cell;
                }
                Control::SideButton(index) => {
                    self.side_toggles[index] = !self.side_toggles[index];
                }
                Control::FaderButton(index) => {
                    self.faders.toggle(index, now);
                }
                Control::Unknown => return,
            }
        } else {
            return;
        }

        for (index, value) in self.faders.take_changes() {
            self.events.push(SurfaceEvent::FaderValueChanged { index, value });
        }
        self.io.mark_dirty();
    }

    fn update(&mut self, _tick: Tick) {
        if !self.io.is_dirty() {
            return;
        }
        let image = self.led_image();
        self.io.flush(image);
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
        for (index, value) in self.faders.take_changes() {
            self.events.push(SurfaceEvent::FaderValueChanged { index, value });
        }
        self.io.mark_dirty();
    }

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    fn debug_lines(&self) -> Vec<String> {
        let mut lines = vec![
            "Toggle Matrix".to_string(),
            format!("faders={}", format_values(&self.faders.values())),
            format!("side={}", format_flags(&self.side_toggles)),
        ];
        for row in (0..GRID_ROWS).rev() {
            let line: String = (0..GRID_COLS)
                .map(|column| if self.cells[column][row] { '1' } else { '.' })
                .collect();
            lines.push(line);
        }
        lines
    }
}
