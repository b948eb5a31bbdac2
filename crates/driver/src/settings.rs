use apc_library::PatternKind;
use apc_library::button_layer::{ButtonConfig, PAGE_COUNT};
use apc_library::faders::FaderMode;
use apc_library::protocol::{FADER_COUNT, GRID_COLS};
use apc_library::scene_matrix::SCENE_COUNT;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
#[serde(default)]
pub(crate) struct Settings {
    pub client_name: String,
    /// Substring matched against available MIDI input port names.
    pub input_port: String,
    /// Substring matched against available MIDI output port names.
    pub output_port: String,
    pub pattern: PatternKind,
    /// Overrides the pattern's own fader mode when set.
    pub fader_mode: Option<FaderMode>,
    pub bpm: f64,
    /// Frames per second of the update loop.
    pub frame_rate: f64,
    /// Per-scene option counts for the scene matrix, one list of 8 per scene.
    pub scene_max_options: Vec<Vec<usize>>,
    /// Fixed seed for the random fader oscillators; random when unset.
    pub seed: Option<u64>,
    pub self_test: bool,
    /// Fader positions (0.0 to 1.0) used until the hardware reports its own.
    pub fader_values: Vec<f32>,
    pub fader_button_toggles: Vec<bool>,
    /// Starting page of the button layer.
    pub page_index: usize,
    /// Button layer layout; the built-in one when unset.
    pub buttons: Option<Vec<ButtonConfig>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_name: "APC Mini Engine".to_string(),
            input_port: "APC mini mk2".to_string(),
            output_port: "APC mini mk2".to_string(),
            pattern: PatternKind::SceneMatrix,
            fader_mode: None,
            bpm: 120.0,
            frame_rate: 60.0,
            scene_max_options: Vec::new(),
            seed: None,
            self_test: true,
            fader_values: vec![0.0; FADER_COUNT],
            fader_button_toggles: vec![false; FADER_COUNT],
            page_index: 0,
            buttons: None,
        }
    }
}

impl Settings {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.client_name.is_empty() {
            return Err("Client name must not be empty".to_string());
        }

        if self.input_port.is_empty() || self.output_port.is_empty() {
            return Err("Port names must not be empty".to_string());
        }

        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(format!("bpm must be positive (found {})", self.bpm));
        }

        if !(self.frame_rate.is_finite() && (1.0..=1000.0).contains(&self.frame_rate)) {
            return Err(format!(
                "frame_rate must be between 1 and 1000 (found {})",
                self.frame_rate
            ));
        }

        let scenes = self.scene_max_options.len();
        if scenes > SCENE_COUNT {
            return Err(format!(
                "There are {SCENE_COUNT} scenes at most (found {scenes})"
            ));
        }

        if let Some(bad) = self
            .scene_max_options
            .iter()
            .position(|options| options.len() != GRID_COLS)
        {
            return Err(format!(
                "scene_max_options[{bad}] should have {GRID_COLS} entries exactly"
            ));
        }

        if self.fader_values.len() != FADER_COUNT
            || self.fader_values.iter().any(|v| !(0.0..=1.0).contains(v))
        {
            return Err(format!(
                "fader_values should be {FADER_COUNT} values between 0 and 1"
            ));
        }

        if self.fader_button_toggles.len() != FADER_COUNT {
            return Err(format!(
                "fader_button_toggles should have {FADER_COUNT} entries exactly"
            ));
        }

        if self.page_index >= PAGE_COUNT {
            return Err(format!(
                "page_index must be below {PAGE_COUNT} (found {})",
                self.page_index
            ));
        }

        Ok(())
    }

    pub(crate) fn fader_preset(&self) -> ([f32; FADER_COUNT], [bool; FADER_COUNT]) {
        let mut values = [0.0; FADER_COUNT];
        let mut toggles = [false; FADER_COUNT];
        for (slot, value) in values.iter_mut().zip(&self.fader_values) {
            *slot = *value;
        }
        for (slot, toggled) in toggles.iter_mut().zip(&self.fader_button_toggles) {
            *slot = *toggled;
        }
        (values, toggles)
    }
}
