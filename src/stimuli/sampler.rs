use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{GameError, GameResult};
use crate::protocol::TargetStatus;
use crate::stimuli::catalog::{StimulusCatalog, StimulusObject};
use crate::stimuli::condition::Condition;
use crate::stimuli::selectors::DistractorSelector;

/// A catalog clone tagged for one trial, not yet placed on a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledStimulus {
    pub object: StimulusObject,
    pub condition: String,
    pub target_status: Option<TargetStatus>,
}

/// Draws (target, distractor, distractor) triples from a catalog.
pub struct StimulusSampler<'c> {
    catalog: &'c StimulusCatalog,
    max_attempts: usize,
}

impl<'c> StimulusSampler<'c> {
    pub fn new(catalog: &'c StimulusCatalog, max_attempts: usize) -> Self {
        Self {
            catalog,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Sample a valid triple for `condition`, never reusing a target in `used_targets`.
    ///
    /// Each attempt redraws target and distractors from scratch. Gives up with
    /// `SamplingExhausted` after the configured number of attempts, or at once if
    /// every target of the subset has already been used.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        condition: &Condition,
        used_targets: &[String],
        rng: &mut R,
    ) -> GameResult<[SampledStimulus; 3]> {
        let remaining: Vec<&StimulusObject> = self
            .catalog
            .subset(condition.target_subset())
            .into_iter()
            .filter(|o| !used_targets.contains(&o.name))
            .collect();

        if remaining.is_empty() {
            warn!(
                "No unused targets left in subset {} for {}",
                condition.target_subset(),
                condition
            );
            return Err(GameError::SamplingExhausted {
                condition: condition.label().to_string(),
                attempts: 0,
            });
        }

        for attempt in 1..=self.max_attempts {
            let target = match remaining.choose(rng) {
                Some(target) => *target,
                None => break,
            };
            let [first_strategy, second_strategy] = condition.distractors();
            let first = first_strategy.select(target, self.catalog, rng);
            let second = second_strategy.select(target, self.catalog, rng);

            if let (Some(first), Some(second)) = (first, second) {
                if is_valid_triple(condition, target, first, second) {
                    debug!("Sampled {} for {} on attempt {}", target.name, condition, attempt);
                    return Ok([
                        self.tag(target, condition, Some(TargetStatus::Target)),
                        self.tag(first, condition, None),
                        self.tag(second, condition, None),
                    ]);
                }
            }
        }

        warn!(
            "Gave up sampling {} after {} attempts",
            condition, self.max_attempts
        );
        Err(GameError::SamplingExhausted {
            condition: condition.label().to_string(),
            attempts: self.max_attempts,
        })
    }

    fn tag(
        &self,
        object: &StimulusObject,
        condition: &Condition,
        target_status: Option<TargetStatus>,
    ) -> SampledStimulus {
        SampledStimulus {
            object: object.clone(),
            condition: condition.label().to_string(),
            target_status,
        }
    }
}

/// Names must be pairwise distinct; some conditions also forbid distractors
/// that are parents of the same item.
pub fn is_valid_triple(
    condition: &Condition,
    target: &StimulusObject,
    first: &StimulusObject,
    second: &StimulusObject,
) -> bool {
    let distinct = first.name != second.name
        && first.name != target.name
        && second.name != target.name;
    if condition.requires_disjoint_parents() {
        distinct && !first.shares_parent_with(second)
    } else {
        distinct
    }
}
