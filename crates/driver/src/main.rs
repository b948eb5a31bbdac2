mod settings;

use crate::self_test::self_test;
use crate::settings::Settings;
use anyhow::{Context, anyhow};
use apc_library::clock::{Clock, MonotonicClock};
use apc_library::io::SurfaceIo;
use apc_library::protocol::GRID_COLS;
use apc_library::transport::Transport;
use apc_library::{ControlSurfacePattern, PatternKind, SurfaceEvent, Tick, build_pattern};
use clap::Parser;
use config::Config;
use log::{Level, debug, error, info, log_enabled, trace, warn};
use midir::{MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

type SharedPattern = Arc<Mutex<Box<dyn ControlSurfacePattern>>>;

#[derive(Parser, Debug)]
#[clap(
    name = "APC Mini MK2 interaction engine",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
)]
struct Args {
    #[clap(short, long, help = "Config file (see example_config.toml)")]
    config: Option<String>,

    #[clap(short, long, help = "Pattern to run, overrides the config file")]
    pattern: Option<PatternKind>,

    #[clap(long, help = "Print available MIDI ports and exit")]
    list_ports: bool,
}

/// Outbound connection to the controller. A missing port leaves it disconnected.
struct MidirTransport {
    connection: Option<MidiOutputConnection>,
}

impl Transport for MidirTransport {
    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn send_message(&mut self, message: &[u8]) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if let Err(e) = connection.send(message) {
            warn!("MIDI send failed: {e}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_ports {
        return list_ports();
    }

    let mut cfg = Config::builder();

    if let Some(config_fn) = args.config {
        cfg = cfg.add_source(config::File::with_name(config_fn.as_str()));
    }
    cfg = cfg.add_source(config::Environment::with_prefix("APCMINI"));

    let cfg = cfg.build().context("Can't create settings")?;
    let mut settings: Settings = cfg.try_deserialize().context("Can't parse settings")?;
    if let Some(pattern) = args.pattern {
        settings.pattern = pattern;
    }

    settings.validate().map_err(|e| anyhow!(e))?;

    info!("Running with settings: {settings:?}");

    let mut transport = open_output(&settings);
    if settings.self_test {
        self_test(&mut transport);
    }

    let clock = Arc::new(MonotonicClock::new());
    let io = SurfaceIo::new(Box::new(transport), clock.clone());
    let seed = settings.seed.unwrap_or_else(rand::random);
    let mut pattern = build_pattern(settings.pattern, io, seed);
    configure(pattern.as_mut(), &settings);
    info!("Pattern {} ready (seed {seed})", settings.pattern);

    let pattern: SharedPattern = Arc::new(Mutex::new(pattern));
    let _input_connection = open_input(&settings, Arc::clone(&pattern));

    main_loop(&pattern, clock.as_ref(), &settings);
    Ok(())
}

fn list_ports() -> anyhow::Result<()> {
    let input = MidiInput::new("apcmini-list").context("Couldn't open MIDI input")?;
    let output = MidiOutput::new("apcmini-list").context("Couldn't open MIDI output")?;

    println!("Inputs:");
    for name in port_names(&input) {
        println!("  {name}");
    }
    println!("Outputs:");
    for name in port_names(&output) {
        println!("  {name}");
    }
    Ok(())
}

fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

/// First port whose name contains `needle`, ignoring case.
fn find_port<T: MidiIO>(io: &T, needle: &str) -> Option<(T::Port, String)> {
    let needle = needle.to_lowercase();
    io.ports().into_iter().find_map(|port| {
        let name = io.port_name(&port).ok()?;
        name.to_lowercase().contains(&needle).then_some((port, name))
    })
}

fn open_output(settings: &Settings) -> MidirTransport {
    let connection = match MidiOutput::new(&settings.client_name) {
        Ok(output) => match find_port(&output, &settings.output_port) {
            Some((port, name)) => match output.connect(&port, "apcmini-out") {
                Ok(connection) => {
                    info!("Connected output to {name}");
                    Some(connection)
                }
                Err(e) => {
                    warn!("Couldn't connect output {name}: {e}");
                    None
                }
            },
            None => {
                warn!(
                    "No MIDI output matching {:?}, LEDs stay dark",
                    settings.output_port
                );
                None
            }
        },
        Err(e) => {
            warn!("Couldn't open MIDI output: {e}");
            None
        }
    };
    MidirTransport { connection }
}

fn open_input(settings: &Settings, pattern: SharedPattern) -> Option<MidiInputConnection<()>> {
    let input = match MidiInput::new(&format!("{} In", settings.client_name)) {
        Ok(input) => input,
        Err(e) => {
            warn!("Couldn't open MIDI input: {e}");
            return None;
        }
    };
    let Some((port, name)) = find_port(&input, &settings.input_port) else {
        warn!(
            "No MIDI input matching {:?}, running without controls",
            settings.input_port
        );
        return None;
    };

    let connection = input.connect(
        &port,
        "apcmini-in",
        move |_timestamp, message, _| {
            lock(&pattern).handle_message(message);
        },
        (),
    );
    match connection {
        Ok(connection) => {
            info!("Connected input to {name}");
            Some(connection)
        }
        Err(e) => {
            warn!("Couldn't connect input {name}: {e}");
            None
        }
    }
}

fn lock(pattern: &SharedPattern) -> MutexGuard<'_, Box<dyn ControlSurfacePattern>> {
    pattern.lock().unwrap_or_else(|e| e.into_inner())
}

fn configure(pattern: &mut dyn ControlSurfacePattern, settings: &Settings) {
    if let Some(mode) = settings.fader_mode {
        if let Err(e) = pattern.set_fader_mode(mode) {
            warn!("{e}");
        }
    }

    let kind = pattern.kind();
    match pattern.as_scene_matrix_mut() {
        Some(scenes) => {
            for (scene, options) in settings.scene_max_options.iter().enumerate() {
                if let Err(e) = scenes.set_max_options_for_scene(scene, options) {
                    error!("scene_max_options[{scene}]: {e}");
                }
            }
        }
        None if !settings.scene_max_options.is_empty() => {
            warn!("scene_max_options has no effect on pattern {kind}");
        }
        None => {}
    }

    if let Some(layer) = pattern.as_button_layer_mut() {
        if let Some(buttons) = &settings.buttons {
            if let Err(e) = layer.set_layout(buttons.clone()) {
                error!("buttons: {e}");
            }
        }
        layer.select_page(settings.page_index);
    } else if settings.buttons.is_some() {
        warn!("buttons has no effect on pattern {kind}");
    }

    let (values, toggles) = settings.fader_preset();
    pattern.preset_faders(&values, &toggles);
}

/// Beat position of the frame; the sequencer plays one column per beat.
fn tick_at(elapsed_ms: f64, bpm: f64) -> Tick {
    let beats = (elapsed_ms.max(0.0) / 60_000.0) * bpm;
    let tempo_index = beats.floor() as u64;
    Tick {
        tempo_index,
        step: (tempo_index % GRID_COLS as u64) as usize,
        beat: beats,
    }
}

fn log_event(event: &SurfaceEvent) {
    match event {
        SurfaceEvent::FaderValueChanged { .. } | SurfaceEvent::GridParameterChanged { .. } => {
            debug!("{event:?}")
        }
        _ => info!("{event:?}"),
    }
}

fn main_loop(pattern: &SharedPattern, clock: &dyn Clock, settings: &Settings) {
    let frame = Duration::from_secs_f64(1.0 / settings.frame_rate);
    let start = clock.now_ms();
    let mut last_tempo_index = None;

    loop {
        let frame_start = Instant::now();
        let tick = tick_at(clock.now_ms() - start, settings.bpm);

        {
            let mut guard = lock(pattern);
            guard.update(tick);
            for event in guard.drain_events() {
                log_event(&event);
            }
            if last_tempo_index != Some(tick.tempo_index) && log_enabled!(Level::Trace) {
                for line in guard.debug_lines() {
                    trace!("{line}");
                }
            }
        }
        last_tempo_index = Some(tick.tempo_index);

        thread::sleep(frame.saturating_sub(frame_start.elapsed()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_follows_tempo() {
        assert_eq!(tick_at(0.0, 120.0), Tick::default());
        let tick = tick_at(4_750.0, 120.0);
        assert_eq!(tick.tempo_index, 9);
        assert_eq!(tick.step, 1);
        assert_eq!(tick.beat, 9.5);
    }

    #[test]
    fn tick_before_start_is_zero() {
        assert_eq!(tick_at(-5.0, 90.0), Tick::default());
    }

    #[test]
    fn configure_applies_scene_options() {
        let settings = Settings {
            scene_max_options: vec![vec![2, 3, 4, 5, 6, 7, 8, 1]],
            ..Default::default()
        };
        let mut pattern = build_pattern(PatternKind::SceneMatrix, SurfaceIo::disconnected(), 1);
        configure(pattern.as_mut(), &settings);
        let scenes = pattern.as_scene_matrix_mut().unwrap();
        assert_eq!(scenes.param_state(0, 0).unwrap().max_options, 2);
        assert_eq!(scenes.param_state(0, 7).unwrap().max_options, 1);
    }

    #[test]
    fn configure_applies_page_and_fader_defaults() {
        let mut fader_button_toggles = vec![false; 9];
        fader_button_toggles[2] = true;
        let settings = Settings {
            page_index: 3,
            fader_values: vec![0.25; 9],
            fader_button_toggles,
            fader_mode: Some(apc_library::faders::FaderMode::Mute),
            ..Default::default()
        };
        let mut pattern = build_pattern(PatternKind::ButtonLayer, SurfaceIo::disconnected(), 1);
        configure(pattern.as_mut(), &settings);

        assert_eq!(pattern.as_button_layer_mut().unwrap().current_page(), 3);
        let faders = pattern.fader_values();
        assert_eq!(faders[0], 0.25);
        assert_eq!(faders[2], 0.0);
    }
}
