use std::path::PathBuf;

use crate::protocol::Role;

/// Errors raised while building or running a game session.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("no valid stimulus triple for condition {condition} after {attempts} attempts")]
    SamplingExhausted { condition: String, attempts: usize },
    #[error("player {0} not found")]
    PlayerNotFound(String),
    #[error("roster already holds {threshold} players")]
    RosterFull { threshold: usize },
    #[error("malformed condition label {0:?}")]
    InvalidCondition(String),
    #[error("session is not active")]
    SessionNotActive,
    #[error("no round is currently loaded")]
    NoActiveRound,
    #[error("no role has been assigned yet")]
    RoleNotAssigned,
    #[error("action requires the {expected:?} role but player is {actual:?}")]
    WrongRole { expected: Role, actual: Role },
    #[error("cell ({x}, {y}) is outside the grid")]
    CellOutOfBounds { x: i32, y: i32 },
    #[error("stimulus {0} is not part of the current trial")]
    UnknownStimulus(String),
    #[error("stimulus {0} was placed more than once")]
    DuplicatePlacement(String),
    #[error("cell ({x}, {y}) holds more than one stimulus")]
    CellOccupied { x: i32, y: i32 },
}

/// Errors raised while loading the stimulus catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog has no entries")]
    Empty,
    #[error("duplicate stimulus name {0}")]
    DuplicateName(String),
}

pub type GameResult<T> = Result<T, GameError>;
