use midly::live::LiveEvent;
use midly::MidiMessage;

pub const STATUS_NOTE_ON: u8 = 0x90;
/// Grid pads take their LED color from Note On on channel 7.
pub const STATUS_GRID_LED: u8 = 0x96;

pub const GRID_COLS: usize = 8;
pub const GRID_ROWS: usize = 8;
pub const SIDE_BUTTON_COUNT: usize = 8;
/// 8 channel faders plus the master.
pub const FADER_COUNT: usize = 9;

pub const GRID_NOTE_START: u8 = 0;
pub const GRID_NOTE_END: u8 = 63;
pub const FADER_CC_START: u8 = 48;
pub const FADER_CC_END: u8 = 56;
pub const FADER_BUTTON_START: u8 = 100;
pub const FADER_BUTTON_END: u8 = 107;
pub const SIDE_BUTTON_START: u8 = 112;
pub const SIDE_BUTTON_END: u8 = 119;
/// Out-of-band note of the 9th (master) fader button. The same key doubles as Shift.
pub const FADER_BUTTON_MASTER: u8 = 122;
pub const SHIFT_NOTE: u8 = 122;

/// A grid position, bottom-origin (row 0 is the bottom row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridCoordinate {
    pub column: usize,
    pub row: usize,
}

/// Physical control addressed by a note or controller number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Grid(GridCoordinate),
    FaderButton(usize),
    SideButton(usize),
    Unknown,
}

impl Control {
    /// Classifies the data byte of a Note On / Note Off message.
    pub fn classify(note: u8) -> Self {
        if let Some(coord) = grid_coordinate(note) {
            return Control::Grid(coord);
        }
        if let Some(index) = fader_button_index(note) {
            return Control::FaderButton(index);
        }
        if let Some(index) = side_button_index(note) {
            return Control::SideButton(index);
        }
        Control::Unknown
    }
}

/// Decoded inbound message. Only what the surface actually sends is kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inbound {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
}

impl Inbound {
    /// Parses a raw message. Anything that is not a channel 0 note or CC yields `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let event = LiveEvent::parse(bytes).ok()?;
        let LiveEvent::Midi { channel, message } = event else {
            return None;
        };
        if channel.as_int() != 0 {
            return None;
        }

        match message {
            MidiMessage::NoteOn { key, vel } => Some(Inbound::NoteOn {
                note: key.as_int(),
                velocity: vel.as_int(),
            }),
            MidiMessage::NoteOff { key, vel } => Some(Inbound::NoteOff {
                note: key.as_int(),
                velocity: vel.as_int(),
            }),
            MidiMessage::Controller { controller, value } => Some(Inbound::ControlChange {
                controller: controller.as_int(),
                value: value.as_int(),
            }),
            _ => None,
        }
    }

    /// True for a Note On with a non-zero velocity.
    pub fn is_press(&self) -> bool {
        matches!(self, Inbound::NoteOn { velocity, .. } if *velocity > 0)
    }

    pub fn note(&self) -> Option<u8> {
        match *self {
            Inbound::NoteOn { note, .. } | Inbound::NoteOff { note, .. } => Some(note),
            Inbound::ControlChange { .. } => None,
        }
    }

    /// Fader index and normalized value for CC 48-56.
    pub fn fader(&self) -> Option<(usize, f32)> {
        match *self {
            Inbound::ControlChange { controller, value } => {
                fader_index(controller).map(|index| (index, value as f32 / 127.0))
            }
            _ => None,
        }
    }
}

pub fn grid_coordinate(note: u8) -> Option<GridCoordinate> {
    if !(GRID_NOTE_START..=GRID_NOTE_END).contains(&note) {
        return None;
    }
    let index = (note - GRID_NOTE_START) as usize;
    let row_from_top = index / GRID_COLS;
    Some(GridCoordinate {
        column: index % GRID_COLS,
        row: GRID_ROWS - 1 - row_from_top,
    })
}

/// Inverse of [`grid_coordinate`]. Out-of-range positions are clamped to the edge.
pub fn grid_note(column: usize, row: usize) -> u8 {
    let column = column.min(GRID_COLS - 1);
    let row = row.min(GRID_ROWS - 1);
    let row_from_top = GRID_ROWS - 1 - row;
    GRID_NOTE_START + (row_from_top * GRID_COLS + column) as u8
}

pub fn fader_button_index(note: u8) -> Option<usize> {
    match note {
        FADER_BUTTON_START..=FADER_BUTTON_END => Some((note - FADER_BUTTON_START) as usize),
        FADER_BUTTON_MASTER => Some(GRID_COLS),
        _ => None,
    }
}

pub fn fader_button_note(index: usize) -> u8 {
    if index < GRID_COLS {
        FADER_BUTTON_START + index as u8
    } else {
        FADER_BUTTON_MASTER
    }
}

pub fn side_button_index(note: u8) -> Option<usize> {
    (SIDE_BUTTON_START..=SIDE_BUTTON_END)
        .contains(&note)
        .then(|| (note - SIDE_BUTTON_START) as usize)
}

pub fn side_button_note(index: usize) -> u8 {
    SIDE_BUTTON_START + index.min(SIDE_BUTTON_COUNT - 1) as u8
}

pub fn fader_index(controller: u8) -> Option<usize> {
    (FADER_CC_START..=FADER_CC_END)
        .contains(&controller)
        .then(|| (controller - FADER_CC_START) as usize)
}

pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Linear map from one range to another. A degenerate input range maps to `out_min`.
pub fn scale(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    if in_max == in_min {
        return out_min;
    }
    let t = (value - in_min) / (in_max - in_min);
    out_min + (out_max - out_min) * t
}
