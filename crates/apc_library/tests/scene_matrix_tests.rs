use std::sync::Arc;

use apc_library::clock::ManualClock;
use apc_library::faders::FaderMode;
use apc_library::io::SurfaceIo;
use apc_library::protocol::grid_note;
use apc_library::scene_matrix::{GridParameterState, SceneMatrix, pseudo_random};
use apc_library::transport::MemoryTransport;
use apc_library::{ControlSurfacePattern, Error, SurfaceEvent, Tick};

fn matrix_with_seed(seed: u64) -> (SceneMatrix, MemoryTransport, ManualClock) {
    let transport = MemoryTransport::new();
    let clock = ManualClock::new(0.0);
    let io = SurfaceIo::new(Box::new(transport.clone()), Arc::new(clock.clone()));
    (SceneMatrix::with_seed(io, seed), transport, clock)
}

fn matrix() -> (SceneMatrix, MemoryTransport, ManualClock) {
    matrix_with_seed(1234)
}

fn tempo(index: u64) -> Tick {
    Tick {
        tempo_index: index,
        step: 0,
        beat: index as f64,
    }
}

fn press(m: &mut SceneMatrix, note: u8) {
    m.handle_message(&[0x90, note, 127]);
}

#[test]
fn starts_on_scene_zero() {
    let (m, _transport, _clock) = matrix();
    assert_eq!(m.current_scene(), 0);
    assert_eq!(
        m.side_button_toggles(),
        [true, false, false, false, false, false, false, false]
    );
    assert_eq!(m.fader_mode(), FaderMode::Random);
    assert_eq!(m.param_state(0, 0), Some(GridParameterState::default()));
}

#[test]
fn side_buttons_are_exclusive() {
    let (mut m, _transport, _clock) = matrix();
    for note in [115, 112, 119, 119, 113] {
        press(&mut m, note);
        let on = m.side_button_toggles().iter().filter(|&&t| t).count();
        assert_eq!(on, 1);
        assert!(m.side_button_toggles()[(note - 112) as usize]);
    }
    assert_eq!(m.current_scene(), 1);

    let events = m.drain_events();
    assert_eq!(events.len(), 5);
    assert_eq!(events[0], SurfaceEvent::SceneSelected(3));
}

#[test]
fn grid_press_selects_row_and_clears_random() {
    let (mut m, _transport, _clock) = matrix();
    press(&mut m, grid_note(3, 7));
    assert!(m.param_state(0, 3).unwrap().is_random);

    press(&mut m, grid_note(3, 2));
    let state = m.param_state(0, 3).unwrap();
    assert_eq!(state.selected_row, 2);
    assert!(!state.is_random);
    assert_eq!(m.param_value(3), 2);
}

#[test]
fn leaving_random_reseats_selection() {
    let (mut m, _transport, _clock) = matrix();
    press(&mut m, grid_note(0, 7));
    press(&mut m, grid_note(0, 7));
    assert_eq!(m.param_state(0, 0).unwrap().selected_row, 6);

    m.set_max_options_for_scene(0, &[3, 8, 8, 8, 8, 8, 8, 8]).unwrap();
    press(&mut m, grid_note(0, 7));
    press(&mut m, grid_note(0, 7));
    assert_eq!(m.param_state(0, 0).unwrap().selected_row, 2);
}

#[test]
fn rows_beyond_max_options_are_ignored() {
    let (mut m, _transport, _clock) = matrix();
    m.set_max_options_for_scene(0, &[2; 8]).unwrap();
    m.drain_events();

    press(&mut m, grid_note(1, 5));
    assert_eq!(m.param_state(0, 1).unwrap().selected_row, 0);
    assert!(m.drain_events().is_empty());
}

#[test]
fn presses_only_touch_the_current_scene() {
    let (mut m, _transport, _clock) = matrix();
    press(&mut m, 114);
    press(&mut m, grid_note(5, 4));
    assert_eq!(m.param_state(2, 5).unwrap().selected_row, 4);
    assert_eq!(m.param_state(0, 5).unwrap().selected_row, 0);
}

#[test]
fn random_draws_follow_the_tempo_index() {
    let (mut m, _transport, _clock) = matrix();
    press(&mut m, grid_note(2, 7));
    m.update(tempo(10));

    let expected = (pseudo_random(12.0) * 8.0) as usize;
    assert_eq!(m.param_state(0, 2).unwrap().random_value, expected);
    assert_eq!(m.param_value(2), expected);
}

#[test]
fn random_draws_are_reproducible() {
    let (mut a, _ta, _ca) = matrix_with_seed(1);
    let (mut b, _tb, _cb) = matrix_with_seed(2);
    for column in 0..8 {
        press(&mut a, grid_note(column, 7));
        press(&mut b, grid_note(column, 7));
    }
    a.set_max_options_for_scene(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    b.set_max_options_for_scene(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    for index in [0, 1, 2, 3, 7, 7, 100, 4096] {
        a.update(tempo(index));
        b.update(tempo(index));
        assert_eq!(a.scene_snapshot(0), b.scene_snapshot(0));
        for column in 0..8 {
            let state = a.param_state(0, column).unwrap();
            assert!(state.random_value < state.max_options);
        }
    }
}

#[test]
fn only_the_active_scene_is_randomized() {
    let (mut m, _transport, _clock) = matrix();
    press(&mut m, grid_note(0, 7));
    press(&mut m, 113);
    for index in 0..32 {
        m.update(tempo(index));
    }
    assert_eq!(m.param_state(0, 0).unwrap().random_value, 0);
}

#[test]
fn max_options_validation_leaves_state_alone() {
    let (mut m, _transport, _clock) = matrix();
    let before = m.scene_snapshot(0);

    assert_eq!(
        m.set_max_options_for_scene(0, &[1, 2, 3]),
        Err(Error::OptionsLength {
            expected: 8,
            found: 3
        })
    );
    assert_eq!(
        m.set_max_options_for_scene(8, &[1; 8]),
        Err(Error::InvalidScene { index: 8, count: 8 })
    );
    assert_eq!(m.scene_snapshot(0), before);
}

#[test]
fn max_options_are_clamped_and_pull_selection_down() {
    let (mut m, _transport, _clock) = matrix();
    press(&mut m, grid_note(0, 5));
    m.set_max_options_for_scene(0, &[3, 0, 20, 8, 8, 8, 8, 8]).unwrap();

    let scene = m.scene_snapshot(0).unwrap();
    assert_eq!(scene[0].max_options, 3);
    assert_eq!(scene[0].selected_row, 2);
    assert_eq!(scene[1].max_options, 1);
    assert_eq!(scene[2].max_options, 8);
}

#[test]
fn shrinking_max_options_pulls_random_draw_down() {
    let (mut m, _transport, _clock) = matrix();
    press(&mut m, grid_note(0, 7));
    let index = (0..256u64)
        .find(|&i| (pseudo_random(i as f64) * 8.0) as usize >= 5)
        .unwrap();
    m.update(tempo(index));
    assert!(m.param_value(0) >= 5);

    m.set_max_options_for_scene(0, &[2; 8]).unwrap();
    let state = m.param_state(0, 0).unwrap();
    assert!(state.is_random);
    assert_eq!(state.random_value, 1);
    assert_eq!(m.param_value(0), 1);
}

#[test]
fn huge_tempo_index_wraps_instead_of_panicking() {
    let (mut m, _transport, _clock) = matrix();
    for column in 0..8 {
        press(&mut m, grid_note(column, 7));
    }
    m.update(tempo(u64::MAX));
    m.update(tempo(u64::MAX - 3));
    for column in 0..8 {
        assert!(m.param_value(column) < 8);
    }
}

#[test]
fn reset_all_max_options() {
    let (mut m, _transport, _clock) = matrix();
    press(&mut m, grid_note(4, 3));
    m.reset_all_max_options();
    for scene in 0..8 {
        for state in m.scene_snapshot(scene).unwrap() {
            assert_eq!(state.max_options, 1);
            assert_eq!(state.selected_row, 0);
        }
    }
}

#[test]
fn shift_toggles_random_scene_mode_only() {
    let (mut m, _transport, _clock) = matrix();
    press(&mut m, 122);
    assert!(m.is_random_scene_mode());
    assert_eq!(m.current_scene(), 0);
    assert!(!m.fader_button_toggles()[8]);

    m.handle_message(&[0x80, 122, 0]);
    assert!(m.is_random_scene_mode());

    press(&mut m, 122);
    assert!(!m.is_random_scene_mode());
    assert_eq!(
        m.drain_events(),
        vec![
            SurfaceEvent::RandomSceneModeChanged(true),
            SurfaceEvent::RandomSceneModeChanged(false),
        ]
    );
}

#[test]
fn leds_show_selection_random_and_scene() {
    let (mut m, transport, _clock) = matrix();
    m.set_max_options_for_scene(0, &[4, 8, 8, 8, 8, 8, 8, 8]).unwrap();
    press(&mut m, grid_note(0, 2));
    press(&mut m, grid_note(1, 7));
    m.update(tempo(0));
    let sent = transport.take();

    let velocity = |column: usize, row: usize| {
        let note = grid_note(column, row);
        sent.iter()
            .find(|msg| msg[0] == 0x96 && msg[1] == note)
            .map(|msg| msg[2])
    };
    assert_eq!(velocity(0, 2), Some(5));
    assert_eq!(velocity(0, 0), Some(3));
    assert_eq!(velocity(0, 5), Some(0));
    assert_eq!(velocity(0, 7), Some(3));
    assert_eq!(velocity(1, 7), Some(45));
    assert!(sent.contains(&vec![0x90, 112, 127]));
    assert!(sent.contains(&vec![0x90, 113, 0]));
}

#[test]
fn no_resend_without_changes() {
    let (mut m, transport, clock) = matrix();
    m.update(tempo(0));
    assert!(!transport.take().is_empty());
    clock.advance(16.0);
    m.update(tempo(0));
    m.update(tempo(1));
    assert!(transport.is_empty());
}

#[test]
fn random_fader_blinks_and_mode_switch_is_immediate() {
    let (mut m, _transport, clock) = matrix();
    m.handle_message(&[0xB0, 49, 127]);
    assert_eq!(m.fader_values()[1], 1.0);

    press(&mut m, 101);
    assert_eq!(m.fader_values()[1], 0.0);

    let mut t = 0.0;
    while m.fader_values()[1] == 0.0 && t < 5000.0 {
        t += 5.0;
        clock.set(t);
        m.update(tempo(0));
    }
    assert_eq!(m.fader_values()[1], 1.0);
    assert!((1200.0..=4005.0).contains(&t));

    m.set_fader_mode(FaderMode::Mute);
    assert_eq!(m.fader_values()[1], 0.0);
    press(&mut m, 101);
    assert_eq!(m.fader_values()[1], 1.0);
    assert!(
        m.drain_events()
            .contains(&SurfaceEvent::FaderModeChanged(FaderMode::Mute))
    );
}

#[test]
fn random_fader_depends_only_on_time_since_activation() {
    let (mut a, _ta, clock_a) = matrix_with_seed(99);
    let (mut b, _tb, clock_b) = matrix_with_seed(99);
    clock_a.set(1000.0);
    clock_b.set(7777.0);
    press(&mut a, 100);
    press(&mut b, 100);

    for offset in (0..20_000).step_by(7) {
        clock_a.set(1000.0 + offset as f64);
        clock_b.set(7777.0 + offset as f64);
        a.update(tempo(0));
        if offset % 2 == 0 {
            b.update(tempo(0));
        }
        if offset % 2 == 0 {
            assert_eq!(a.fader_values()[0], b.fader_values()[0], "at +{offset}ms");
        }
    }
}

#[test]
fn mute_mode_is_order_independent() {
    let (mut a, _ta, _ca) = matrix();
    let (mut b, _tb, _cb) = matrix();
    a.set_fader_mode(FaderMode::Mute);
    b.set_fader_mode(FaderMode::Mute);

    a.handle_message(&[0xB0, 52, 100]);
    press(&mut a, 104);
    press(&mut b, 104);
    b.handle_message(&[0xB0, 52, 100]);
    assert_eq!(a.fader_values(), b.fader_values());
    assert_eq!(a.fader_values()[4], 0.0);
}

#[test]
fn disconnected_surface_keeps_state() {
    let (mut m, transport, _clock) = matrix();
    transport.set_connected(false);
    press(&mut m, 116);
    m.update(tempo(3));
    assert!(transport.is_empty());
    assert_eq!(m.current_scene(), 4);
    assert!(m.is_dirty());

    transport.set_connected(true);
    m.update(tempo(3));
    assert!(transport.take().contains(&vec![0x90, 116, 127]));
}
