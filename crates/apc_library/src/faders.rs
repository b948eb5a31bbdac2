use std::fmt;

use rand::prelude::*;
use serde::Deserialize;

use crate::protocol::{FADER_COUNT, clamp01};

/// What a fader button does to its fader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaderMode {
    /// Toggle on forces the output to 0.
    #[default]
    Mute,
    /// Toggle on replaces the output with a 0/1 blink pattern.
    Random,
}

impl fmt::Display for FaderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaderMode::Mute => f.write_str("mute"),
            FaderMode::Random => f.write_str("random"),
        }
    }
}

const LOW_DURATION_MS: (f64, f64) = (1200.0, 4000.0);
const HIGH_DURATION_MS: (f64, f64) = (80.0, 220.0);

fn duration(rng: &mut StdRng, (min, max): (f64, f64)) -> f64 {
    if min >= max {
        return min;
    }
    rng.gen_range(min..max)
}

/// Two-phase blinker: a long low phase followed by a short high phase.
#[derive(Debug)]
struct Oscillator {
    active: bool,
    high: bool,
    value: f32,
    next_switch: f64,
    seed: u64,
    rng: StdRng,
}

impl Oscillator {
    fn new(seed: u64) -> Self {
        Self {
            active: false,
            high: false,
            value: 0.0,
            next_switch: 0.0,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn activate(&mut self, now: f64) {
        if self.active {
            return;
        }
        // reseeding makes the blink pattern a function of time since activation only
        self.rng = StdRng::seed_from_u64(self.seed);
        self.active = true;
        self.high = false;
        self.value = 0.0;
        self.next_switch = now + duration(&mut self.rng, LOW_DURATION_MS);
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.high = false;
        self.value = 0.0;
        self.next_switch = 0.0;
    }

    fn advance(&mut self, now: f64) {
        if !self.active {
            return;
        }
        while now >= self.next_switch {
            self.high = !self.high;
            self.value = if self.high { 1.0 } else { 0.0 };
            let range = if self.high {
                HIGH_DURATION_MS
            } else {
                LOW_DURATION_MS
            };
            self.next_switch += duration(&mut self.rng, range);
        }
    }
}

/// The 9 faders with their buttons. Output is derived from raw value, toggle and mode.
#[derive(Debug)]
pub struct FaderBank {
    mode: FaderMode,
    raw: [f32; FADER_COUNT],
    toggles: [bool; FADER_COUNT],
    values: [f32; FADER_COUNT],
    oscillators: [Oscillator; FADER_COUNT],
    changes: Vec<(usize, f32)>,
}

impl FaderBank {
    pub fn new(mode: FaderMode, seed: u64) -> Self {
        Self {
            mode,
            raw: [0.0; FADER_COUNT],
            toggles: [false; FADER_COUNT],
            values: [0.0; FADER_COUNT],
            oscillators: std::array::from_fn(|i| {
                Oscillator::new(seed ^ (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
            }),
            changes: Vec::new(),
        }
    }

    pub fn mode(&self) -> FaderMode {
        self.mode
    }

    pub fn values(&self) -> [f32; FADER_COUNT] {
        self.values
    }

    pub fn value(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    pub fn toggles(&self) -> [bool; FADER_COUNT] {
        self.toggles
    }


    /// Stores a new raw position. Returns false for an unknown fader.
    pub fn set_raw(&mut self, index: usize, value: f32, now: f64) -> bool {
        let Some(slot) = self.raw.get_mut(index) else {
            return false;
        };
        *slot = clamp01(value);
        self.recompute(index, now);
        true
    }

    /// Flips a fader button. Returns false for an unknown button.
    pub fn toggle(&mut self, index: usize, now: f64) -> bool {
        let Some(slot) = self.toggles.get_mut(index) else {
            return false;
        };
        *slot = !*slot;
        self.recompute(index, now);
        true
    }

    /// Switches mode and re-derives every output right away. Returns false if unchanged.
    pub fn set_mode(&mut self, mode: FaderMode, now: f64) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        for osc in &mut self.oscillators {
            osc.deactivate();
        }
        for index in 0..FADER_COUNT {
            self.recompute(index, now);
        }
        true
    }

    /// Loads start-up positions and button states, e.g. from settings.
    pub fn preset(&mut self, values: &[f32; FADER_COUNT], toggles: &[bool; FADER_COUNT], now: f64) {
        for index in 0..FADER_COUNT {
            self.raw[index] = clamp01(values[index]);
            self.toggles[index] = toggles[index];
            self.recompute(index, now);
        }
    }

    /// Advances running oscillators to `now`.
    pub fn process(&mut self, now: f64) {
        if self.mode != FaderMode::Random {
            return;
        }
        for index in 0..FADER_COUNT {
            if !self.oscillators[index].active {
                continue;
            }
            self.oscillators[index].advance(now);
            let value = self.oscillators[index].value;
            self.apply(index, value);
        }
    }

    /// Output changes since the last call, in order of occurrence.
    pub fn take_changes(&mut self) -> Vec<(usize, f32)> {
        std::mem::take(&mut self.changes)
    }

    fn recompute(&mut self, index: usize, now: f64) {
        let toggled = self.toggles[index];
        let osc = &mut self.oscillators[index];
        let next = match self.mode {
            FaderMode::Mute => {
                osc.deactivate();
                if toggled { 0.0 } else { self.raw[index] }
            }
            FaderMode::Random if toggled => {
                osc.activate(now);
                osc.advance(now);
                osc.value
            }
            FaderMode::Random => {
                osc.deactivate();
                self.raw[index]
            }
        };
        self.apply(index, next);
    }

    fn apply(&mut self, index: usize, value: f32) {
        if self.values[index] == value {
            return;
        }
        self.values[index] = value;
        self.changes.push((index, value));
    }
}
