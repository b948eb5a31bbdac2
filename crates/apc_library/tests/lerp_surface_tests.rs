use std::sync::Arc;

use apc_library::clock::ManualClock;
use apc_library::io::SurfaceIo;
use apc_library::lerp_surface::{CellDisplay, LerpSurface};
use apc_library::protocol::grid_note;
use apc_library::transport::MemoryTransport;
use apc_library::{ControlSurfacePattern, Tick};

fn surface() -> (LerpSurface, MemoryTransport, ManualClock) {
    let transport = MemoryTransport::new();
    let clock = ManualClock::new(0.0);
    let io = SurfaceIo::new(Box::new(transport.clone()), Arc::new(clock.clone()));
    (LerpSurface::new(io), transport, clock)
}

fn tap(surface: &mut LerpSurface, clock: &ManualClock, at: f64, column: usize, row: usize) {
    clock.set(at);
    surface.handle_message(&[0x90, grid_note(column, row), 127]);
    surface.update(Tick::default());
    surface.handle_message(&[0x80, grid_note(column, row), 0]);
}

fn tick_at(surface: &mut LerpSurface, clock: &ManualClock, at: f64) {
    clock.set(at);
    surface.update(Tick::default());
}

#[test]
fn press_ramps_up_and_settles_at_one() {
    let (mut s, _transport, clock) = surface();
    tap(&mut s, &clock, 1000.0, 3, 3);
    assert_eq!(s.direction(3, 3), 1);
    assert_eq!(s.lerp_value(3, 3), 0.0);

    tick_at(&mut s, &clock, 1150.0);
    assert!((s.lerp_value(3, 3) - 0.5).abs() < 1e-6);

    tick_at(&mut s, &clock, 1300.0);
    assert_eq!(s.lerp_value(3, 3), 1.0);
    tick_at(&mut s, &clock, 5000.0);
    assert_eq!(s.lerp_value(3, 3), 1.0);
}

#[test]
fn later_press_ramps_back_down() {
    let (mut s, _transport, clock) = surface();
    tap(&mut s, &clock, 1000.0, 0, 0);
    tick_at(&mut s, &clock, 1400.0);
    tap(&mut s, &clock, 2000.0, 0, 0);
    assert_eq!(s.direction(0, 0), -1);

    tick_at(&mut s, &clock, 2100.0);
    let v = s.lerp_value(0, 0);
    assert!(v > 0.6 && v < 0.7, "value {v}");

    tick_at(&mut s, &clock, 2300.0);
    assert_eq!(s.lerp_value(0, 0), 0.0);
}

#[test]
fn quick_second_press_flips_direction() {
    let (mut s, _transport, clock) = surface();
    tap(&mut s, &clock, 1000.0, 5, 1);
    tick_at(&mut s, &clock, 1100.0);
    assert_eq!(s.direction(5, 1), 1);

    tap(&mut s, &clock, 1200.0, 5, 1);
    assert_eq!(s.direction(5, 1), -1);
    // restarts from the far end instead of turning around at 1/3
    assert_eq!(s.lerp_value(5, 1), 1.0);

    tick_at(&mut s, &clock, 1600.0);
    assert_eq!(s.lerp_value(5, 1), 0.0);
}

#[test]
fn holding_a_pad_is_a_single_edge() {
    let (mut s, _transport, clock) = surface();
    clock.set(100.0);
    s.handle_message(&[0x90, grid_note(2, 2), 127]);
    s.update(Tick::default());
    assert!(s.one_shot_matrix()[2][2]);

    tick_at(&mut s, &clock, 150.0);
    assert!(!s.one_shot_matrix()[2][2]);
    assert_eq!(s.direction(2, 2), 1);
    assert!(s.pressed_matrix()[2][2]);

    s.handle_message(&[0x80, grid_note(2, 2), 0]);
    assert!(!s.pressed_matrix()[2][2]);
    assert!(s.toggle_matrix()[2][2]);
}

#[test]
fn settled_surface_stops_sending() {
    let (mut s, transport, clock) = surface();
    tick_at(&mut s, &clock, 0.0);
    transport.take();

    tap(&mut s, &clock, 1000.0, 7, 7);
    tick_at(&mut s, &clock, 1400.0);
    let sent = transport.take();
    assert!(sent.contains(&vec![0x96, grid_note(7, 7), 89]));

    tick_at(&mut s, &clock, 1500.0);
    tick_at(&mut s, &clock, 1600.0);
    assert!(transport.is_empty());
    assert!(!s.is_dirty());
}

#[test]
fn led_brightness_stays_in_band() {
    let (mut s, transport, clock) = surface();
    tap(&mut s, &clock, 0.0, 1, 6);
    tick_at(&mut s, &clock, 1000.0);
    let max = transport
        .take()
        .iter()
        .filter(|m| m[0] == 0x96)
        .map(|m| m[2])
        .max()
        .unwrap();
    assert_eq!(max, 89);
}

#[test]
fn display_source_drives_leds() {
    let (mut s, transport, clock) = surface();
    tick_at(&mut s, &clock, 0.0);
    transport.take();

    s.set_cell_display(4, 4, CellDisplay::Toggled);
    assert_eq!(s.cell_display(4, 4), CellDisplay::Toggled);
    tap(&mut s, &clock, 1000.0, 4, 4);
    tick_at(&mut s, &clock, 1001.0);
    assert_eq!(s.cell_value(4, 4, CellDisplay::Toggled), 1.0);
    assert!(transport.take().contains(&vec![0x96, grid_note(4, 4), 89]));

    s.set_cell_display(4, 4, CellDisplay::Inactive);
    tick_at(&mut s, &clock, 1002.0);
    assert!(transport.take().contains(&vec![0x96, grid_note(4, 4), 0]));
}

#[test]
fn matrices_are_copies() {
    let (mut s, _transport, clock) = surface();
    let mut lerp = s.lerp_matrix();
    lerp[0][0] = 1.0;
    assert_eq!(s.lerp_value(0, 0), 0.0);

    tap(&mut s, &clock, 0.0, 0, 0);
    tick_at(&mut s, &clock, 500.0);
    assert_eq!(lerp[0][0], 1.0);
    assert_eq!(s.lerp_matrix()[0][0], 1.0);
}

#[test]
fn same_timestamp_is_idempotent() {
    let (mut s, transport, clock) = surface();
    tap(&mut s, &clock, 200.0, 6, 0);
    tick_at(&mut s, &clock, 260.0);
    let value = s.lerp_value(6, 0);
    transport.take();

    tick_at(&mut s, &clock, 260.0);
    assert_eq!(s.lerp_value(6, 0), value);
    assert!(transport.is_empty());
}

#[test]
fn reset_restores_defaults() {
    let (mut s, _transport, clock) = surface();
    tap(&mut s, &clock, 0.0, 2, 3);
    tick_at(&mut s, &clock, 400.0);
    s.handle_message(&[0x90, 118, 127]);
    s.handle_message(&[0xB0, 48, 127]);
    s.handle_message(&[0x90, 100, 127]);
    assert_eq!(s.fader_values()[0], 0.0);

    s.reset();
    assert_eq!(s.lerp_matrix(), [[0.0; 8]; 8]);
    assert_eq!(s.toggle_matrix(), [[false; 8]; 8]);
    assert_eq!(s.side_button_toggles(), [false; 8]);
    assert_eq!(s.fader_button_toggles(), [false; 9]);
    assert_eq!(s.fader_values()[0], 1.0);
    assert!(s.is_dirty());
}
