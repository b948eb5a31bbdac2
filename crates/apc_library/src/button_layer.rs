//! Settings-declared buttons on paged grid cells.
//!
//! The side buttons pick one of 8 pages. A button owns one or more cells, possibly on
//! several pages, and acts as a radio group, a toggle, a momentary switch, or a
//! beat-synced randomizer driving a radio group.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};
use rand::prelude::*;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::faders::{FaderBank, FaderMode};
use crate::io::SurfaceIo;
use crate::lights::{LedImage, button_velocity, palette};
use crate::pattern::{ControlSurfacePattern, PatternKind, SurfaceEvent, Tick, format_values};
use crate::protocol::{Control, FADER_COUNT, GRID_COLS, GRID_ROWS, Inbound, SIDE_BUTTON_COUNT};

pub const PAGE_COUNT: usize = SIDE_BUTTON_COUNT;

type CellRef = Option<(usize, usize)>;
type CellMap = [[[CellRef; GRID_ROWS]; GRID_COLS]; PAGE_COUNT];

const EMPTY_MAP: CellMap = [[[None; GRID_ROWS]; GRID_COLS]; PAGE_COUNT];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct CellAddress {
    pub page: usize,
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub fn new(page: usize, row: usize, col: usize) -> Self {
        Self { page, row, col }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    /// One cell of the group is selected; its index is the value.
    Radio,
    Toggle,
    /// On while held.
    Momentary,
    /// While on, re-draws the target radio group on a beat grid.
    Random,
}

/// A button's value as seen by consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ButtonValue {
    Flag(bool),
    Index(usize),
}

impl fmt::Display for ButtonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonValue::Flag(on) => write!(f, "{on}"),
            ButtonValue::Index(index) => write!(f, "{index}"),
        }
    }
}

fn default_active_color() -> u8 {
    palette::DEFAULT_ACTIVE
}

fn default_exclude_current() -> bool {
    true
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ButtonConfig {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: ButtonKind,
    pub cells: Vec<CellAddress>,
    #[serde(default = "default_active_color")]
    pub active_color: u8,
    #[serde(default)]
    pub inactive_color: u8,
    /// Radio: starting index. Toggle and random: starting state.
    #[serde(default)]
    pub default_value: Option<ButtonValue>,
    /// Key of the radio group a random button drives.
    #[serde(default)]
    pub random_target: Option<String>,
    /// Never re-draw the value the target already has.
    #[serde(default = "default_exclude_current")]
    pub exclude_current: bool,
    /// Draws per beat.
    #[serde(default = "default_speed")]
    pub speed: f64,
}

impl ButtonConfig {
    pub fn new(key: &str, kind: ButtonKind, cells: Vec<CellAddress>) -> Self {
        Self {
            key: key.to_string(),
            kind,
            cells,
            active_color: default_active_color(),
            inactive_color: palette::OFF,
            default_value: None,
            random_target: None,
            exclude_current: default_exclude_current(),
            speed: default_speed(),
        }
    }

    pub fn colors(mut self, active: u8, inactive: u8) -> Self {
        self.active_color = active;
        self.inactive_color = inactive;
        self
    }

    pub fn with_default(mut self, value: ButtonValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn driving(mut self, target: &str) -> Self {
        self.random_target = Some(target.to_string());
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }
}

fn on_page(page: usize, cells: &[(usize, usize)]) -> Vec<CellAddress> {
    cells
        .iter()
        .map(|&(row, col)| CellAddress::new(page, row, col))
        .collect()
}

/// The stock layout: scene, pattern, color, UI and limit selectors with their
/// randomizers, plus speed and look toggles.
pub fn default_layout() -> Vec<ButtonConfig> {
    use ButtonKind::*;

    let mut scene_cells: Vec<(usize, usize)> = (0..7)
        .flat_map(|col| (0..4).map(move |row| (row, col)))
        .collect();
    scene_cells.push((0, 7));

    vec![
        ButtonConfig::new(
            "colorSelect",
            Radio,
            on_page(0, &[(6, 4), (6, 5), (6, 6), (6, 7), (7, 4), (7, 5), (7, 6)]),
        )
        .colors(palette::RED, palette::CYAN)
        .with_default(ButtonValue::Index(0)),
        ButtonConfig::new("colorSelectRandom", Random, on_page(0, &[(7, 7)]))
            .colors(palette::GREEN, palette::PURPLE)
            .driving("colorSelect"),
        ButtonConfig::new("sceneSelect", Radio, on_page(0, &scene_cells))
            .colors(palette::BLUE, palette::LIGHT_PINK)
            .with_default(ButtonValue::Index(0)),
        ButtonConfig::new("sceneSelectRandom", Random, on_page(0, &[(3, 7)]))
            .colors(palette::GREEN, palette::PURPLE)
            .driving("sceneSelect"),
        ButtonConfig::new(
            "patternSelect",
            Radio,
            on_page(0, &[(4, 4), (4, 5), (4, 6), (4, 7), (5, 4), (5, 5), (5, 6)]),
        )
        .colors(palette::RED, palette::CYAN)
        .with_default(ButtonValue::Index(0)),
        ButtonConfig::new("patternSelectRandom", Random, on_page(0, &[(5, 7)]))
            .colors(palette::GREEN, palette::PURPLE)
            .driving("patternSelect"),
        ButtonConfig::new(
            "uiSelect",
            Radio,
            on_page(
                0,
                &[(4, 0), (4, 1), (4, 2), (4, 3), (5, 0), (5, 1), (5, 2), (5, 3)],
            ),
        )
        .colors(palette::RED, palette::CYAN)
        .with_default(ButtonValue::Index(0)),
        ButtonConfig::new("doubleSpeedToggle", Toggle, on_page(0, &[(6, 0)]))
            .colors(palette::GREEN, palette::LIGHT_PINK)
            .with_default(ButtonValue::Flag(false)),
        ButtonConfig::new("quadSpeedMomentary", Momentary, on_page(0, &[(6, 1)]))
            .colors(palette::CYAN, palette::LIGHT_PINK),
        ButtonConfig::new("backShadowToggle", Toggle, on_page(0, &[(7, 0)]))
            .colors(palette::GREEN, palette::YELLOW_GREEN)
            .with_default(ButtonValue::Flag(false)),
        ButtonConfig::new("vibeToggle", Toggle, on_page(0, &[(6, 2)]))
            .colors(palette::GREEN, palette::YELLOW_GREEN)
            .with_default(ButtonValue::Flag(false)),
        ButtonConfig::new("oneColorToggle", Toggle, on_page(0, &[(6, 3)]))
            .colors(palette::GREEN, palette::YELLOW_GREEN)
            .with_default(ButtonValue::Flag(false)),
        ButtonConfig::new("limitSelect", Radio, on_page(0, &[(7, 1), (7, 2), (7, 3)]))
            .colors(palette::BLUE, palette::GREEN)
            .with_default(ButtonValue::Index(0)),
        ButtonConfig::new("keyVisualToggle", Toggle, on_page(7, &[(0, 0)]))
            .colors(palette::GREEN, palette::YELLOW_GREEN)
            .with_default(ButtonValue::Flag(false)),
    ]
}

#[derive(Clone, Debug)]
enum ButtonState {
    Radio(usize),
    Toggle(bool),
    Momentary(bool),
    Random {
        active: bool,
        target: usize,
        rng: StdRng,
        slot: Option<u64>,
    },
}

#[derive(Clone, Debug)]
struct Button {
    config: ButtonConfig,
    state: ButtonState,
}

impl Button {
    fn value(&self) -> ButtonValue {
        match &self.state {
            ButtonState::Radio(index) => ButtonValue::Index(*index),
            ButtonState::Toggle(on) | ButtonState::Momentary(on) => ButtonValue::Flag(*on),
            ButtonState::Random { active, .. } => ButtonValue::Flag(*active),
        }
    }

    fn lit(&self, cell: usize) -> bool {
        match &self.state {
            ButtonState::Radio(index) => *index == cell,
            ButtonState::Toggle(on) | ButtonState::Momentary(on) => *on,
            ButtonState::Random { active, .. } => *active,
        }
    }
}

/// Picks the next radio index, skipping `current` when asked to.
fn draw(rng: &mut StdRng, options: usize, current: usize, exclude_current: bool) -> usize {
    if options <= 1 {
        return 0;
    }
    if exclude_current && current < options {
        let pick = rng.gen_range(0..options - 1);
        if pick >= current { pick + 1 } else { pick }
    } else {
        rng.gen_range(0..options)
    }
}

fn flag_default(config: &ButtonConfig) -> Result<bool> {
    match config.default_value {
        None => Ok(false),
        Some(ButtonValue::Flag(on)) => Ok(on),
        Some(ButtonValue::Index(_)) => Err(Error::InvalidDefault {
            key: config.key.clone(),
        }),
    }
}

/// Checks a layout and resolves it into button states and a cell lookup.
fn resolve(layout: &[ButtonConfig], seed: u64) -> Result<(Vec<Button>, CellMap)> {
    let mut keys = HashSet::new();
    let mut map = EMPTY_MAP;

    for (index, config) in layout.iter().enumerate() {
        if !keys.insert(config.key.as_str()) {
            return Err(Error::DuplicateButton(config.key.clone()));
        }
        if config.cells.is_empty() {
            return Err(Error::EmptyButton {
                key: config.key.clone(),
            });
        }
        for (cell, address) in config.cells.iter().enumerate() {
            let CellAddress { page, row, col } = *address;
            let slot = map
                .get_mut(page)
                .and_then(|p| p.get_mut(col))
                .and_then(|c| c.get_mut(row));
            match slot {
                None => {
                    return Err(Error::CellOutOfRange {
                        key: config.key.clone(),
                        page,
                        row,
                        col,
                    });
                }
                Some(Some(_)) => {
                    return Err(Error::CellTaken {
                        key: config.key.clone(),
                        page,
                        row,
                        col,
                    });
                }
                Some(slot) => *slot = Some((index, cell)),
            }
        }
    }

    let mut buttons = Vec::with_capacity(layout.len());
    for (index, config) in layout.iter().enumerate() {
        let state = match config.kind {
            ButtonKind::Radio => match config.default_value {
                None => ButtonState::Radio(0),
                Some(ButtonValue::Index(i)) if i < config.cells.len() => ButtonState::Radio(i),
                Some(_) => {
                    return Err(Error::InvalidDefault {
                        key: config.key.clone(),
                    });
                }
            },
            ButtonKind::Toggle => ButtonState::Toggle(flag_default(config)?),
            ButtonKind::Momentary => {
                if flag_default(config)? {
                    return Err(Error::InvalidDefault {
                        key: config.key.clone(),
                    });
                }
                ButtonState::Momentary(false)
            }
            ButtonKind::Random => {
                let target = config
                    .random_target
                    .as_deref()
                    .and_then(|key| layout.iter().position(|c| c.key == key))
                    .filter(|&t| layout[t].kind == ButtonKind::Radio)
                    .ok_or_else(|| Error::InvalidRandomTarget {
                        key: config.key.clone(),
                        target: config.random_target.clone(),
                    })?;
                if !(config.speed.is_finite() && config.speed > 0.0) {
                    return Err(Error::InvalidSpeed {
                        key: config.key.clone(),
                    });
                }
                ButtonState::Random {
                    active: flag_default(config)?,
                    target,
                    rng: StdRng::seed_from_u64(
                        seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
                    ),
                    slot: None,
                }
            }
        };
        buttons.push(Button {
            config: config.clone(),
            state,
        });
    }

    Ok((buttons, map))
}

pub struct ButtonLayer {
    io: SurfaceIo,
    faders: FaderBank,
    seed: u64,
    buttons: Vec<Button>,
    cells: CellMap,
    current_page: usize,
    events: Vec<SurfaceEvent>,
}

impl ButtonLayer {
    pub fn new(io: SurfaceIo) -> Self {
        Self::with_seed(io, rand::random())
    }

    /// Starts with [`default_layout`]. `seed` drives the randomizers and fader blinks.
    pub fn with_seed(io: SurfaceIo, seed: u64) -> Self {
        let mut layer = Self {
            io,
            faders: FaderBank::new(FaderMode::Random, seed),
            seed,
            buttons: Vec::new(),
            cells: EMPTY_MAP,
            current_page: 0,
            events: Vec::new(),
        };
        if let Err(e) = layer.set_layout(default_layout()) {
            warn!("default button layout rejected: {e}");
        }
        layer
    }

    /// Replaces every button. On error nothing changes.
    pub fn set_layout(&mut self, layout: Vec<ButtonConfig>) -> Result<()> {
        let (buttons, cells) = resolve(&layout, self.seed).inspect_err(|e| {
            warn!("rejected button layout: {e}");
        })?;
        info!("button layout with {} buttons", buttons.len());
        self.buttons = buttons;
        self.cells = cells;
        self.io.mark_dirty();
        Ok(())
    }

    /// Copy of the active layout.
    pub fn layout(&self) -> Vec<ButtonConfig> {
        self.buttons.iter().map(|b| b.config.clone()).collect()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn select_page(&mut self, page: usize) {
        if page >= PAGE_COUNT || page == self.current_page {
            return;
        }
        self.current_page = page;
        self.release_momentaries();
        info!("page {page} selected");
        self.events.push(SurfaceEvent::PageSelected(page));
        self.io.mark_dirty();
    }

    pub fn value(&self, key: &str) -> Option<ButtonValue> {
        self.buttons
            .iter()
            .find(|b| b.config.key == key)
            .map(Button::value)
    }

    /// Every button's value, in layout order.
    pub fn values(&self) -> Vec<(String, ButtonValue)> {
        self.buttons
            .iter()
            .map(|b| (b.config.key.clone(), b.value()))
            .collect()
    }

    fn notify(&mut self, button: usize) {
        let key = self.buttons[button].config.key.clone();
        let value = self.buttons[button].value();
        debug!("{key} = {value}");
        self.events.push(SurfaceEvent::ButtonChanged { key, value });
        self.io.mark_dirty();
    }

    fn release_momentaries(&mut self) {
        for index in 0..self.buttons.len() {
            if let ButtonState::Momentary(on @ true) = &mut self.buttons[index].state {
                *on = false;
                self.notify(index);
            }
        }
    }

    fn handle_grid(&mut self, column: usize, row: usize, pressed: bool) {
        let Some((button, cell)) = self.cells[self.current_page][column][row] else {
            return;
        };
        let changed = match &mut self.buttons[button].state {
            ButtonState::Radio(index) if pressed && *index != cell => {
                *index = cell;
                true
            }
            ButtonState::Toggle(on) if pressed => {
                *on = !*on;
                true
            }
            ButtonState::Momentary(on) if *on != pressed => {
                *on = pressed;
                true
            }
            ButtonState::Random { active, slot, .. } if pressed => {
                *active = !*active;
                *slot = None;
                true
            }
            _ => false,
        };
        if changed {
            self.notify(button);
        }
    }

    fn run_randomizers(&mut self, beat: f64) {
        let mut due = Vec::new();
        for (index, button) in self.buttons.iter_mut().enumerate() {
            let speed = button.config.speed;
            if let ButtonState::Random {
                active: true,
                target,
                slot,
                ..
            } = &mut button.state
            {
                let now = (beat.max(0.0) * speed).floor() as u64;
                if *slot != Some(now) {
                    *slot = Some(now);
                    due.push((index, *target));
                }
            }
        }

        for (source, target) in due {
            let ButtonState::Radio(current) = self.buttons[target].state else {
                continue;
            };
            let options = self.buttons[target].config.cells.len();
            let exclude = self.buttons[source].config.exclude_current;
            let ButtonState::Random { rng, .. } = &mut self.buttons[source].state else {
                continue;
            };
            let next = draw(rng, options, current, exclude);
            if next != current {
                self.buttons[target].state = ButtonState::Radio(next);
                self.notify(target);
            }
        }
    }

    fn collect_fader_changes(&mut self) {
        for (index, value) in self.faders.take_changes() {
            self.events.push(SurfaceEvent::FaderValueChanged { index, value });
            self.io.mark_dirty();
        }
    }

    fn led_image(&self) -> LedImage {
        let mut image = LedImage::new();
        for (column, rows) in self.cells[self.current_page].iter().enumerate() {
            for (row, cell) in rows.iter().enumerate() {
                let Some((button, cell)) = *cell else {
                    continue;
                };
                let button = &self.buttons[button];
                let velocity = if button.lit(cell) {
                    button.config.active_color
                } else {
                    button.config.inactive_color
                };
                image.set_grid(column, row, velocity);
            }
        }
        for i in 0..PAGE_COUNT {
            image.set_side_button(i, button_velocity(i == self.current_page, palette::FULL));
        }
        for (i, toggled) in self.faders.toggles().iter().enumerate() {
            image.set_fader_button(i, button_velocity(*toggled, palette::FULL));
        }
        image
    }
}

impl ControlSurfacePattern for ButtonLayer {
    fn kind(&self) -> PatternKind {
        PatternKind::ButtonLayer
    }

    fn handle_message(&mut self, message: &[u8]) {
        let Some(inbound) = Inbound::parse(message) else {
            return;
        };
        debug!("button layer <- {inbound:?}");
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
            Control::Grid(coord) => self.handle_grid(coord.column, coord.row, inbound.is_press()),
            Control::FaderButton(index) if inbound.is_press() => {
                self.faders.toggle(index, now);
                self.collect_fader_changes();
                self.io.mark_dirty();
            }
            Control::SideButton(index) if inbound.is_press() => self.select_page(index),
            _ => {}
        }
    }

    fn update(&mut self, tick: Tick) {
        self.run_randomizers(tick.beat);
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
        std::array::from_fn(|i| i == self.current_page)
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
        let mut lines = vec![
            "Button Layer".to_string(),
            format!("page={}", self.current_page),
            format!("faders={}", format_values(&self.faders.values())),
        ];
        lines.extend(
            self.buttons
                .iter()
                .map(|b| format!("{}={}", b.config.key, b.value())),
        );
        lines
    }

    fn as_button_layer_mut(&mut self) -> Option<&mut ButtonLayer> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_layout_is_valid() {
        let layout = default_layout();
        let (buttons, map) = resolve(&layout, 0).unwrap();
        assert_eq!(buttons.len(), layout.len());
        let mapped = map.iter().flatten().flatten().filter(|c| c.is_some()).count();
        let declared: usize = layout.iter().map(|c| c.cells.len()).sum();
        assert_eq!(mapped, declared);
    }

    #[test]
    fn draw_skips_the_current_value() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let next = draw(&mut rng, 4, 2, true);
            assert!(next < 4 && next != 2);
        }
        assert_eq!(draw(&mut rng, 1, 0, true), 0);
    }

    #[test]
    fn draw_may_repeat_without_exclusion() {
        let mut rng = StdRng::seed_from_u64(9);
        let repeats = (0..200).filter(|_| draw(&mut rng, 2, 0, false) == 0).count();
        assert!(repeats > 0);
    }
}
