use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::error::GameResult;
use crate::game::geometry::GridGeometry;
use crate::protocol::{Trial, TrialStimulus};
use crate::stimuli::condition::{randomized_conditions, Condition};
use crate::stimuli::sampler::{SampledStimulus, StimulusSampler};

/// Independent random orderings of the grid cells for speaker and listener.
pub fn sample_stimulus_locations<R: Rng + ?Sized>(
    geometry: &GridGeometry,
    rng: &mut R,
) -> (Vec<(i32, i32)>, Vec<(i32, i32)>) {
    let mut speaker = geometry.cells();
    let mut listener = geometry.cells();
    speaker.shuffle(rng);
    listener.shuffle(rng);
    (speaker, listener)
}

fn place(
    sampled: SampledStimulus,
    speaker_cell: (i32, i32),
    listener_cell: (i32, i32),
    geometry: &GridGeometry,
) -> TrialStimulus {
    let (width, height) = (sampled.object.width, sampled.object.height);
    TrialStimulus {
        speaker_coords: geometry.coords_for(speaker_cell, width, height),
        listener_coords: geometry.coords_for(listener_cell, width, height),
        object: sampled.object,
        condition: sampled.condition,
        target_status: sampled.target_status,
    }
}

/// Builds the ordered trial list for a session.
pub struct TrialListBuilder<'c> {
    sampler: StimulusSampler<'c>,
    geometry: GridGeometry,
}

impl<'c> TrialListBuilder<'c> {
    pub fn new(sampler: StimulusSampler<'c>, geometry: GridGeometry) -> Self {
        Self { sampler, geometry }
    }

    /// Schedule the conditions for a session and build one trial per label.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> GameResult<Vec<Trial>> {
        let conditions = randomized_conditions(rng);
        self.build_from(&conditions, rng)
    }

    /// Build one trial per label of `conditions`, in order.
    pub fn build_from<R: Rng + ?Sized>(
        &self,
        conditions: &[String],
        rng: &mut R,
    ) -> GameResult<Vec<Trial>> {
        let mut previous_targets: HashMap<&str, Vec<String>> = HashMap::new();
        let mut trials = Vec::with_capacity(conditions.len());

        for label in conditions {
            let condition = Condition::parse(label)?;
            let used = previous_targets.entry(label.as_str()).or_default();
            let [target, first, second] = self.sampler.sample(&condition, used, rng)?;
            used.push(target.object.name.clone());

            let (speaker, listener) = sample_stimulus_locations(&self.geometry, rng);
            trials.push(Trial {
                stimuli: [
                    place(target, speaker[0], listener[0], &self.geometry),
                    place(first, speaker[1], listener[1], &self.geometry),
                    place(second, speaker[2], listener[2], &self.geometry),
                ],
            });
        }

        info!("Built trial list with {} trials", trials.len());
        Ok(trials)
    }
}
