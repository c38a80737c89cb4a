use crate::error::{GameError, GameResult};
use crate::game::geometry::GridGeometry;
use crate::protocol::{ClientMessage, Placement, Role, ServerMessage, Snapshot, Trial, TrialStimulus};

/// What a renderer needs to draw one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFrame<'a> {
    pub current_trial: &'a Trial,
    pub viewport_size: (f64, f64),
    /// Pixel extent of the grid the trial's coordinates live in.
    pub world_size: (f64, f64),
    pub role: Role,
}

/// Presentation-side mirror of a session, fed by server messages.
///
/// Holds a local copy of the current trial that the listener rearranges before
/// submitting. The copy is replaced whenever the server moves to a new round.
#[derive(Debug, Clone)]
pub struct ClientView {
    player_id: Option<String>,
    role: Option<Role>,
    geometry: GridGeometry,
    latest: Option<Snapshot>,
    trial: Option<Trial>,
    last_error: Option<String>,
}

impl ClientView {
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            player_id: None,
            role: None,
            geometry,
            latest: None,
            trial: None,
            last_error: None,
        }
    }

    pub fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome { id, role } => {
                self.player_id = Some(id);
                self.role = Some(role);
            }
            ServerMessage::Update(snapshot) => {
                let round_changed = self
                    .latest
                    .as_ref()
                    .map_or(true, |prev| prev.round_num != snapshot.round_num);
                if snapshot.objects.is_none() {
                    self.trial = None;
                } else if round_changed || self.trial.is_none() {
                    self.trial = snapshot.objects.clone();
                }
                self.latest = Some(snapshot);
            }
            ServerMessage::Error { message } => self.last_error = Some(message),
        }
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    pub fn game_started(&self) -> bool {
        self.latest.as_ref().map_or(false, |s| s.game_started)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.trial.as_ref()
    }

    /// `None` until both a role and a trial are known.
    pub fn render_frame(&self, viewport_size: (f64, f64)) -> Option<RenderFrame<'_>> {
        Some(RenderFrame {
            current_trial: self.trial.as_ref()?,
            viewport_size,
            world_size: self.geometry.world_size(),
            role: self.role?,
        })
    }

    /// Stimulus occupying cell `(x, y)` in this participant's own grid.
    pub fn stimulus_at_cell(&self, x: i32, y: i32) -> Option<&TrialStimulus> {
        let role = self.role?;
        let trial = self.trial.as_ref()?;
        trial
            .stimulus_at_cell(role, x, y)
            .map(|index| &trial.stimuli[index])
    }

    /// Move a stimulus to the cell under pixel `(px, py)` in the listener grid.
    ///
    /// A stimulus already in that cell swaps into the vacated one, so the grid
    /// stays a permutation. Returns the destination cell.
    pub fn drop_stimulus(&mut self, name: &str, px: f64, py: f64) -> GameResult<(i32, i32)> {
        let role = self.role.ok_or(GameError::RoleNotAssigned)?;
        if role != Role::Listener {
            return Err(GameError::WrongRole {
                expected: Role::Listener,
                actual: role,
            });
        }
        let geometry = self.geometry;
        let trial = self.trial.as_mut().ok_or(GameError::NoActiveRound)?;

        let (x, y) = geometry.pixel_to_cell(px, py);
        if !geometry.contains_cell(x, y) {
            return Err(GameError::CellOutOfBounds { x, y });
        }
        let moving = trial
            .stimuli
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| GameError::UnknownStimulus(name.to_string()))?;
        let from = trial.stimuli[moving].listener_coords.cell();

        if let Some(occupant) = trial.stimulus_at_cell(Role::Listener, x, y) {
            if occupant != moving {
                let s = &mut trial.stimuli[occupant];
                s.listener_coords = geometry.coords_for(from, s.object.width, s.object.height);
            }
        }
        let s = &mut trial.stimuli[moving];
        s.listener_coords = geometry.coords_for((x, y), s.object.width, s.object.height);
        Ok((x, y))
    }

    /// The listener's current arrangement as a message for the server.
    pub fn submission(&self) -> GameResult<ClientMessage> {
        let trial = self.trial.as_ref().ok_or(GameError::NoActiveRound)?;
        let placements = trial
            .stimuli
            .iter()
            .map(|s| Placement {
                name: s.name().to_string(),
                grid_x: s.listener_coords.grid_x,
                grid_y: s.listener_coords.grid_y,
            })
            .collect();
        Ok(ClientMessage::SubmitPlacements { placements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DataLog;
    use crate::stimuli::catalog::tests::shipped_catalog;
    use crate::stimuli::sampler::StimulusSampler;
    use crate::stimuli::trial_list::TrialListBuilder;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn trials() -> Vec<Trial> {
        let catalog = shipped_catalog();
        TrialListBuilder::new(StimulusSampler::new(&catalog, 1000), GridGeometry::default())
            .build(&mut StdRng::seed_from_u64(17))
            .unwrap()
    }

    fn update(round_num: i32, objects: Option<Trial>) -> ServerMessage {
        ServerMessage::Update(Snapshot {
            game_started: true,
            players_threshold: 2,
            active_player_count: 2,
            data_log: DataLog::new("abcdef"),
            round_num,
            objects,
            players: Vec::new(),
            instructions: None,
        })
    }

    fn listener_view(trial: &Trial) -> ClientView {
        let mut view = ClientView::new(GridGeometry::default());
        view.apply(ServerMessage::Welcome {
            id: "b".to_string(),
            role: Role::Listener,
        });
        view.apply(update(0, Some(trial.clone())));
        view
    }

    #[test]
    fn render_frame_needs_role_and_trial() {
        let trial = trials().remove(0);
        let mut view = ClientView::new(GridGeometry::default());
        assert!(view.render_frame((900.0, 300.0)).is_none());

        view.apply(update(0, Some(trial.clone())));
        assert!(view.render_frame((900.0, 300.0)).is_none());

        view.apply(ServerMessage::Welcome {
            id: "a".to_string(),
            role: Role::Speaker,
        });
        let frame = view.render_frame((900.0, 300.0)).unwrap();
        assert_eq!(frame.current_trial, &trial);
        assert_eq!(frame.role, Role::Speaker);
        assert_eq!(frame.viewport_size, (900.0, 300.0));
        assert_eq!(frame.world_size, (900.0, 300.0));
    }

    #[test]
    fn withheld_objects_clear_the_local_trial() {
        let trial = trials().remove(0);
        let mut view = listener_view(&trial);
        view.apply(update(0, None));
        assert!(view.current_trial().is_none());
    }

    #[test]
    fn drop_swaps_with_occupant() {
        let trial = trials().remove(0);
        let mut view = listener_view(&trial);
        let a = trial.stimuli[0].name().to_string();
        let from = trial.stimuli[0].listener_coords.cell();
        let to = trial.stimuli[1].listener_coords.cell();
        let centre = GridGeometry::default().cell_to_pixel(to.0, to.1);

        assert_eq!(view.drop_stimulus(&a, centre.center_x, centre.center_y).unwrap(), to);
        assert_eq!(view.stimulus_at_cell(to.0, to.1).unwrap().name(), a);
        assert_eq!(
            view.stimulus_at_cell(from.0, from.1).unwrap().name(),
            trial.stimuli[1].name()
        );
        // Speaker layout is untouched.
        let local = view.current_trial().unwrap();
        for (before, after) in trial.stimuli.iter().zip(local.stimuli.iter()) {
            assert_eq!(before.speaker_coords, after.speaker_coords);
        }
    }

    #[test]
    fn drop_rejections() {
        let trial = trials().remove(0);
        let mut view = listener_view(&trial);
        let a = trial.stimuli[0].name().to_string();
        assert!(matches!(
            view.drop_stimulus(&a, 950.0, 10.0),
            Err(GameError::CellOutOfBounds { x: 4, y: 1 })
        ));
        assert!(matches!(
            view.drop_stimulus("nope", 10.0, 10.0),
            Err(GameError::UnknownStimulus(_))
        ));

        let mut speaker = ClientView::new(GridGeometry::default());
        speaker.apply(ServerMessage::Welcome {
            id: "a".to_string(),
            role: Role::Speaker,
        });
        speaker.apply(update(0, Some(trial)));
        assert!(matches!(
            speaker.drop_stimulus(&a, 10.0, 10.0),
            Err(GameError::WrongRole { .. })
        ));
    }

    #[test]
    fn drop_before_welcome_has_no_role() {
        let trial = trials().remove(0);
        let mut view = ClientView::new(GridGeometry::default());
        view.apply(update(0, Some(trial.clone())));
        let name = trial.stimuli[0].name().to_string();
        assert!(matches!(
            view.drop_stimulus(&name, 10.0, 10.0),
            Err(GameError::RoleNotAssigned)
        ));
        assert_eq!(view.current_trial(), Some(&trial));
    }

    #[test]
    fn local_edits_survive_same_round_updates_but_not_new_rounds() {
        let mut list = trials();
        let first = list.remove(0);
        let second = list.remove(0);
        let mut view = listener_view(&first);
        let a = first.stimuli[0].name().to_string();
        let to = first.stimuli[2].listener_coords.cell();
        let centre = GridGeometry::default().cell_to_pixel(to.0, to.1);
        view.drop_stimulus(&a, centre.center_x, centre.center_y).unwrap();
        let edited = view.current_trial().unwrap().clone();

        view.apply(update(0, Some(first.clone())));
        assert_eq!(view.current_trial(), Some(&edited));

        view.apply(update(1, Some(second.clone())));
        assert_eq!(view.current_trial(), Some(&second));
    }

    #[test]
    fn submission_reports_listener_cells() {
        let trial = trials().remove(0);
        let view = listener_view(&trial);
        let ClientMessage::SubmitPlacements { placements } = view.submission().unwrap();
        assert_eq!(placements.len(), 3);
        for (p, s) in placements.iter().zip(trial.stimuli.iter()) {
            assert_eq!(p.name, s.name());
            assert_eq!((p.grid_x, p.grid_y), s.listener_coords.cell());
        }

        let empty = ClientView::new(GridGeometry::default());
        assert!(matches!(empty.submission(), Err(GameError::NoActiveRound)));
    }

    #[test]
    fn error_message_is_kept() {
        let mut view = ClientView::new(GridGeometry::default());
        view.apply(ServerMessage::Error {
            message: "Your partner disconnected".to_string(),
        });
        assert_eq!(view.last_error(), Some("Your partner disconnected"));
        assert!(!view.game_started());
    }
}
