use crate::protocol::Trial;

/// Number of stimuli the listener put in the same cell as the speaker (0..=3).
pub fn score(trial: &Trial) -> u8 {
    trial
        .stimuli
        .iter()
        .filter(|s| s.listener_coords.cell() == s.speaker_coords.cell())
        .count() as u8
}
