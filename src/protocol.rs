use serde::{Deserialize, Serialize};

use crate::stimuli::catalog::StimulusObject;

// ── Roles ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Speaker,
    Listener,
}

impl Role {
    /// Role assigned to the participant occupying roster slot `slot`.
    pub fn for_slot(slot: usize) -> Self {
        if slot == 0 {
            Role::Speaker
        } else {
            Role::Listener
        }
    }
}

// ── Stimuli on the wire ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Target,
}

/// Where a stimulus sits in one participant's grid, in cells and in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StimulusCoords {
    pub grid_x: i32,
    pub grid_y: i32,
    /// Top-left corner that centres the object inside its cell.
    pub true_x: f64,
    pub true_y: f64,
    /// Top-left corner of the cell itself.
    pub grid_pixel_x: f64,
    pub grid_pixel_y: f64,
}

impl StimulusCoords {
    pub fn cell(&self) -> (i32, i32) {
        (self.grid_x, self.grid_y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialStimulus {
    #[serde(flatten)]
    pub object: StimulusObject,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_status: Option<TargetStatus>,
    pub speaker_coords: StimulusCoords,
    pub listener_coords: StimulusCoords,
}

impl TrialStimulus {
    pub fn name(&self) -> &str {
        &self.object.name
    }

    pub fn is_target(&self) -> bool {
        self.target_status == Some(TargetStatus::Target)
    }

    pub fn coords(&self, role: Role) -> &StimulusCoords {
        match role {
            Role::Speaker => &self.speaker_coords,
            Role::Listener => &self.listener_coords,
        }
    }
}

/// The three stimuli shown in one round, target first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trial {
    pub stimuli: [TrialStimulus; 3],
}

impl Trial {
    pub fn condition(&self) -> &str {
        &self.stimuli[0].condition
    }

    pub fn target(&self) -> Option<&TrialStimulus> {
        self.stimuli.iter().find(|s| s.is_target())
    }

    /// Index of the stimulus occupying cell `(grid_x, grid_y)` in `role`'s grid.
    pub fn stimulus_at_cell(&self, role: Role, grid_x: i32, grid_y: i32) -> Option<usize> {
        self.stimuli
            .iter()
            .position(|s| s.coords(role).cell() == (grid_x, grid_y))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut TrialStimulus> {
        self.stimuli.iter_mut().find(|s| s.name() == name)
    }
}

// ── Data log ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectInformation {
    #[serde(rename = "gameID")]
    pub game_id: String,
}

/// One scored round as submitted by the listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub round_num: i32,
    pub condition: String,
    pub score: u8,
    pub objects: Trial,
}

/// Everything the session accumulates for later analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLog {
    pub id: String,
    pub trials: Vec<TrialRecord>,
    pub catch_trials: Vec<serde_json::Value>,
    pub system: serde_json::Map<String, serde_json::Value>,
    pub subject_information: SubjectInformation,
}

impl DataLog {
    pub fn new(session_id: &str) -> Self {
        let short: String = session_id.chars().take(6).collect();
        Self {
            id: short.clone(),
            trials: Vec::new(),
            catch_trials: Vec::new(),
            system: serde_json::Map::new(),
            subject_information: SubjectInformation { game_id: short },
        }
    }
}

// ── Snapshot (Server → Client) ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: String,
}

/// State broadcast to every active participant after each change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub game_started: bool,
    pub players_threshold: usize,
    pub active_player_count: usize,
    pub data_log: DataLog,
    pub round_num: i32,
    /// Withheld unless both participants are connected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Trial>,
    pub players: Vec<PlayerSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Server-to-client message wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Sent once when a participant joins a session.
    Welcome { id: String, role: Role },
    /// Snapshot after a roster change or a round advance.
    Update(Snapshot),
    /// The session could not be created or continued.
    Error { message: String },
}

// ── Client → Server messages ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub name: String,
    pub grid_x: i32,
    pub grid_y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Listener's final arrangement for the current round.
    SubmitPlacements { placements: Vec<Placement> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimuli::catalog::tests::object;
    use crate::stimuli::catalog::Distr;

    #[test]
    fn data_log_truncates_session_id() {
        let log = DataLog::new("abcdef123456");
        assert_eq!(log.id, "abcdef");
        assert_eq!(log.subject_information.game_id, "abcdef");
        assert!(log.trials.is_empty());
    }

    #[test]
    fn data_log_keeps_short_ids() {
        let log = DataLog::new("ab");
        assert_eq!(log.id, "ab");
    }

    #[test]
    fn snapshot_omits_withheld_objects() {
        let snapshot = Snapshot {
            game_started: false,
            players_threshold: 2,
            active_player_count: 1,
            data_log: DataLog::new("abcdef"),
            round_num: -1,
            objects: None,
            players: vec![PlayerSummary {
                id: "p1".to_string(),
            }],
            instructions: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("objects").is_none());
        assert!(json.get("instructions").is_none());
        assert_eq!(json["roundNum"], -1);
        assert_eq!(json["playersThreshold"], 2);
        assert_eq!(json["dataLog"]["subject_information"]["gameID"], "abcdef");
    }

    #[test]
    fn trial_stimulus_flattens_catalog_fields() {
        let object = object("kite", "none", "kite", Distr::ParentClass2, &["bird_kite"], 3);
        let stimulus = TrialStimulus {
            object,
            condition: "distr14_targ3".to_string(),
            target_status: Some(TargetStatus::Target),
            speaker_coords: StimulusCoords {
                grid_x: 2,
                grid_y: 1,
                ..StimulusCoords::default()
            },
            listener_coords: StimulusCoords::default(),
        };
        let json = serde_json::to_value(&stimulus).unwrap();
        assert_eq!(json["name"], "kite");
        assert_eq!(json["distr"], "parent_class_2");
        assert_eq!(json["class_1"], "none");
        assert_eq!(json["is_parent"], true);
        assert_eq!(json["parent_class_of"], serde_json::json!(["bird_kite"]));
        assert_eq!(json["targetStatus"], "target");
        assert_eq!(json["condition"], "distr14_targ3");
        assert_eq!(json["speakerCoords"]["gridX"], 2);
        assert_eq!(json["speakerCoords"]["gridY"], 1);
        assert!(json["listenerCoords"].get("trueX").is_some());
        assert!(json["listenerCoords"].get("gridPixelY").is_some());
        assert!(json.get("object").is_none());

        let back: TrialStimulus = serde_json::from_value(json).unwrap();
        assert_eq!(back, stimulus);
    }

    #[test]
    fn distractor_omits_target_status() {
        let object = object("bird_kite", "bird", "kite", Distr::Atypical, &[], 1);
        let stimulus = TrialStimulus {
            object,
            condition: "distr55_targ1".to_string(),
            target_status: None,
            speaker_coords: StimulusCoords::default(),
            listener_coords: StimulusCoords::default(),
        };
        let json = serde_json::to_value(&stimulus).unwrap();
        assert!(json.get("targetStatus").is_none());
        assert_eq!(json["distr"], "atypical");
    }

    #[test]
    fn role_for_slot() {
        assert_eq!(Role::for_slot(0), Role::Speaker);
        assert_eq!(Role::for_slot(1), Role::Listener);
    }
}
