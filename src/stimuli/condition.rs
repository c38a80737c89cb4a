use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::constants::{CONDITION_LABELS, CONDITION_REPETITIONS, DISJOINT_PARENT_CONDITIONS};
use crate::error::{GameError, GameResult};
use crate::stimuli::catalog::{SUBSET_ATYPICAL, SUBSET_PARENT_CLASS_2};
use crate::stimuli::selectors::{strategy_for_code, SelectionStrategy};

/// A decoded condition label such as `distr24_targ1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    label: String,
    distractors: [SelectionStrategy; 2],
    target_subset: u8,
}

impl Condition {
    pub fn parse(label: &str) -> GameResult<Self> {
        let invalid = || GameError::InvalidCondition(label.to_string());

        let rest = label.strip_prefix("distr").ok_or_else(invalid)?;
        let (codes, target) = rest.split_once("_targ").ok_or_else(invalid)?;

        let codes: Vec<char> = codes.chars().collect();
        if codes.len() != 2 {
            return Err(invalid());
        }
        let first = strategy_for_code(codes[0]).ok_or_else(invalid)?;
        let second = strategy_for_code(codes[1]).ok_or_else(invalid)?;

        let target_subset = match target {
            "1" | "2" | "3" => target.parse::<u8>().map_err(|_| invalid())?,
            _ => return Err(invalid()),
        };
        debug_assert!((SUBSET_ATYPICAL..=SUBSET_PARENT_CLASS_2).contains(&target_subset));

        Ok(Self {
            label: label.to_string(),
            distractors: [first, second],
            target_subset,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn distractors(&self) -> &[SelectionStrategy; 2] {
        &self.distractors
    }

    /// Catalog subset id the target is drawn from.
    pub fn target_subset(&self) -> u8 {
        self.target_subset
    }

    /// Whether the two distractors must not share a child item.
    pub fn requires_disjoint_parents(&self) -> bool {
        DISJOINT_PARENT_CONDITIONS.contains(&self.label.as_str())
    }
}

impl FromStr for Condition {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::parse(s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

// ── Scheduling ─────────────────────────────────────────────────────

/// `count` copies of `label`.
pub fn fill_repeated(label: &str, count: usize) -> Vec<String> {
    vec![label.to_string(); count]
}

/// Every label repeated `repetitions` times, then shuffled uniformly.
pub fn schedule<R: Rng + ?Sized>(labels: &[&str], repetitions: usize, rng: &mut R) -> Vec<String> {
    let mut conditions: Vec<String> = labels
        .iter()
        .flat_map(|label| fill_repeated(label, repetitions))
        .collect();
    conditions.shuffle(rng);
    conditions
}

/// The balanced condition sequence for one session.
pub fn randomized_conditions<R: Rng + ?Sized>(rng: &mut R) -> Vec<String> {
    schedule(&CONDITION_LABELS, CONDITION_REPETITIONS, rng)
}
