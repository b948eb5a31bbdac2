use crate::protocol::{
    FADER_COUNT, GRID_COLS, GRID_ROWS, SIDE_BUTTON_COUNT, STATUS_GRID_LED, STATUS_NOTE_ON,
    fader_button_note, grid_note, side_button_note,
};

/// APC Mini MK2 palette. The velocity byte of an LED message selects the color.
pub mod palette {
    pub const OFF: u8 = 0;
    pub const WHITE: u8 = 3;
    pub const RED: u8 = 5;
    pub const YELLOW_GREEN: u8 = 13;
    pub const TEAL: u8 = 21;
    pub const GREEN: u8 = 25;
    pub const LIGHT_BLUE: u8 = 32;
    pub const CYAN: u8 = 33;
    pub const BLUE: u8 = 37;
    pub const DEFAULT_ACTIVE: u8 = 41;
    pub const PURPLE: u8 = 45;
    pub const DEEP_PINK: u8 = 53;
    pub const LIGHT_PINK: u8 = 56;
    pub const ORANGE: u8 = 60;
    pub const TOGGLE_ON: u8 = 120;
    pub const FULL: u8 = 127;
}

/// Everything the surface can light, as velocities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LedImage {
    /// `[column][row]`, bottom-origin.
    pub grid: [[u8; GRID_ROWS]; GRID_COLS],
    pub side_buttons: [u8; SIDE_BUTTON_COUNT],
    pub fader_buttons: [u8; FADER_COUNT],
}

impl LedImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_grid(&mut self, column: usize, row: usize, velocity: u8) {
        if column < GRID_COLS && row < GRID_ROWS {
            self.grid[column][row] = velocity.min(127);
        }
    }

    pub fn get_grid(&self, column: usize, row: usize) -> u8 {
        if column < GRID_COLS && row < GRID_ROWS {
            self.grid[column][row]
        } else {
            0
        }
    }

    pub fn set_side_button(&mut self, index: usize, velocity: u8) {
        if let Some(slot) = self.side_buttons.get_mut(index) {
            *slot = velocity.min(127);
        }
    }

    pub fn set_fader_button(&mut self, index: usize, velocity: u8) {
        if let Some(slot) = self.fader_buttons.get_mut(index) {
            *slot = velocity.min(127);
        }
    }

    /// Output messages in send order: side buttons, grid, fader buttons.
    pub fn messages(&self) -> Vec<[u8; 3]> {
        let mut out = Vec::with_capacity(SIDE_BUTTON_COUNT + GRID_COLS * GRID_ROWS + FADER_COUNT);
        for (i, velocity) in self.side_buttons.iter().enumerate() {
            out.push([STATUS_NOTE_ON, side_button_note(i), *velocity]);
        }
        for (column, rows) in self.grid.iter().enumerate() {
            for (row, velocity) in rows.iter().enumerate() {
                out.push([STATUS_GRID_LED, grid_note(column, row), *velocity]);
            }
        }
        for (i, velocity) in self.fader_buttons.iter().enumerate() {
            out.push([STATUS_NOTE_ON, fader_button_note(i), *velocity]);
        }
        out
    }
}

/// Velocity for a boolean button LED.
pub fn button_velocity(on: bool, color: u8) -> u8 {
    if on { color } else { palette::OFF }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_cover_every_led_once() {
        let image = LedImage::new();
        let messages = image.messages();
        assert_eq!(messages.len(), 8 + 64 + 9);
        assert_eq!(messages[0], [0x90, 112, 0]);
        assert_eq!(messages[8][0], 0x96);
        assert_eq!(messages.last(), Some(&[0x90, 122, 0]));
    }

    #[test]
    fn out_of_range_writes_are_ignored() {
        let mut image = LedImage::new();
        image.set_grid(8, 0, 5);
        image.set_side_button(9, 5);
        image.set_fader_button(9, 5);
        assert_eq!(image, LedImage::new());
    }

    #[test]
    fn velocity_is_clamped() {
        let mut image = LedImage::new();
        image.set_grid(0, 0, 200);
        assert_eq!(image.get_grid(0, 0), 127);
    }
}
