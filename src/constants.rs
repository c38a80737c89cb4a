//! Fixed design constants of the reference game.

/// Number of participants needed before a session starts.
pub const PLAYERS_THRESHOLD: usize = 2;

/// Rounds played per session; one trial per round.
pub const NUM_ROUNDS: usize = 48;

/// Every condition label appears this many times in a session.
pub const CONDITION_REPETITIONS: usize = 6;

/// The eight trial types of the design.
///
/// `distrXY_targZ`: distractors drawn with strategies `X` and `Y`, target drawn
/// from catalog subset `Z`.
pub const CONDITION_LABELS: [&str; 8] = [
    "distr24_targ1",
    "distr34_targ1",
    "distr14_targ2",
    "distr14_targ3",
    "distr55_targ2",
    "distr55_targ3",
    "distr55_targ1",
    "distr23_targ1",
];

/// Conditions whose two distractors must not be parents of a common atypical item.
pub const DISJOINT_PARENT_CONDITIONS: [&str; 2] = ["distr24_targ1", "distr34_targ1"];

// ── Grid ───────────────────────────────────────────────────────────

pub const NUM_HORIZONTAL_CELLS: i32 = 3;
pub const NUM_VERTICAL_CELLS: i32 = 1;
pub const CELL_WIDTH: f64 = 300.0;
pub const CELL_HEIGHT: f64 = 300.0;

// ── Sampling ───────────────────────────────────────────────────────

pub const DEFAULT_MAX_SAMPLING_ATTEMPTS: usize = 1000;
