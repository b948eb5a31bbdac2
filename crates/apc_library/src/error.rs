use thiserror::Error;

use crate::faders::FaderMode;
use crate::pattern::PatternKind;

/// Rejected configuration calls. State is never touched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("scene index {index} is out of range (expected 0..{count})")]
    InvalidScene { index: usize, count: usize },
    #[error("expected {expected} max-option values, got {found}")]
    OptionsLength { expected: usize, found: usize },
    #[error("{kind} does not support the {mode} fader mode")]
    UnsupportedFaderMode { kind: PatternKind, mode: FaderMode },
    #[error("button key {0:?} is declared twice")]
    DuplicateButton(String),
    #[error("button {key:?} has no cells")]
    EmptyButton { key: String },
    #[error("button {key:?} cell page={page} row={row} col={col} is off the surface")]
    CellOutOfRange {
        key: String,
        page: usize,
        row: usize,
        col: usize,
    },
    #[error("button {key:?} cell page={page} row={row} col={col} is already taken")]
    CellTaken {
        key: String,
        page: usize,
        row: usize,
        col: usize,
    },
    #[error("random button {key:?} needs a radio target (got {target:?})")]
    InvalidRandomTarget { key: String, target: Option<String> },
    #[error("button {key:?} has an invalid default value")]
    InvalidDefault { key: String },
    #[error("random button {key:?} needs a positive speed")]
    InvalidSpeed { key: String },
}

pub type Result<T> = std::result::Result<T, Error>;
