use std::collections::HashSet;

use rand::Rng;
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::constants::{NUM_ROUNDS, PLAYERS_THRESHOLD};
use crate::error::{GameError, GameResult};
use crate::game::geometry::GridGeometry;
use crate::game::scoring;
use crate::protocol::{
    DataLog, Placement, PlayerSummary, Role, ServerMessage, Snapshot, Trial, TrialRecord,
};
use crate::stimuli::catalog::StimulusCatalog;
use crate::stimuli::sampler::StimulusSampler;
use crate::stimuli::trial_list::TrialListBuilder;

/// The live connection of a participant, owned by the transport.
pub trait PlayerHandle {
    fn send(&self, message: &ServerMessage);
    fn disconnect(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub role: Role,
}

/// One roster slot. Only counts as active with both a handle and a player.
#[derive(Debug)]
pub struct PlayerEntry<H> {
    pub id: String,
    pub handle: Option<H>,
    pub player: Option<Player>,
}

impl<H> PlayerEntry<H> {
    pub fn is_active(&self) -> bool {
        self.handle.is_some() && self.player.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingPlayers,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The round with this index was loaded and broadcast.
    Started(usize),
    /// The last round had already been played; every player was disconnected.
    Finished,
}

/// Server-authoritative state of one two-player game.
pub struct ServerSession<H: PlayerHandle> {
    id: String,
    exp_name: String,
    player_count: usize,
    players_threshold: usize,
    players: Vec<Option<PlayerEntry<H>>>,
    state: SessionState,
    round_num: i32,
    num_rounds: usize,
    trial_list: Vec<Trial>,
    objects: Option<Trial>,
    data: DataLog,
    instructions: Option<String>,
    geometry: GridGeometry,
}

impl<H: PlayerHandle> ServerSession<H> {
    /// Build the whole trial list, seat the first participant as speaker and
    /// broadcast the initial snapshot.
    ///
    /// # Errors
    ///
    /// Propagates sampling failures; no session exists in that case.
    pub fn new<R: Rng + ?Sized>(
        id: String,
        exp_name: String,
        player_count: usize,
        initial_player: (H, String),
        catalog: &StimulusCatalog,
        config: &GameConfig,
        rng: &mut R,
    ) -> GameResult<Self> {
        let geometry = GridGeometry::with_padding(config.cell_padding);
        let builder = TrialListBuilder::new(
            StimulusSampler::new(catalog, config.max_sampling_attempts),
            geometry,
        );
        let trial_list = builder.build(rng)?;

        let (handle, player_id) = initial_player;
        let mut players: Vec<Option<PlayerEntry<H>>> =
            (0..PLAYERS_THRESHOLD).map(|_| None).collect();
        let role = Role::for_slot(0);
        handle.send(&ServerMessage::Welcome {
            id: player_id.clone(),
            role,
        });
        players[0] = Some(PlayerEntry {
            id: player_id.clone(),
            handle: Some(handle),
            player: Some(Player {
                id: player_id,
                role,
            }),
        });

        let data = DataLog::new(&id);
        let mut session = Self {
            id,
            exp_name,
            player_count,
            players_threshold: PLAYERS_THRESHOLD,
            players,
            state: SessionState::AwaitingPlayers,
            round_num: -1,
            num_rounds: NUM_ROUNDS,
            trial_list,
            objects: None,
            data,
            instructions: config.instructions.clone(),
            geometry,
        };
        info!(
            "Session {} created for experiment {} ({} trials)",
            session.id,
            session.exp_name,
            session.trial_list.len()
        );
        session.server_send_update();
        Ok(session)
    }

    // ── Roster ───────────────────────────────────────────────────────

    /// Seat a participant in the first empty slot and return their role.
    pub fn add_player(&mut self, id: String, handle: H) -> GameResult<Role> {
        if self.state == SessionState::Finished {
            return Err(GameError::SessionNotActive);
        }
        let slot = self
            .players
            .iter()
            .position(Option::is_none)
            .ok_or(GameError::RosterFull {
                threshold: self.players_threshold,
            })?;

        let role = Role::for_slot(slot);
        handle.send(&ServerMessage::Welcome {
            id: id.clone(),
            role,
        });
        self.players[slot] = Some(PlayerEntry {
            id: id.clone(),
            handle: Some(handle),
            player: Some(Player { id, role }),
        });

        if self.get_active_players().len() == self.players_threshold {
            self.state = SessionState::Active;
            info!("Session {} started", self.id);
        }
        self.server_send_update();
        Ok(role)
    }

    /// Empty the slot held by `id`. The remaining players are told about it.
    pub fn remove_player(&mut self, id: &str) -> GameResult<Player> {
        let slot = self
            .players
            .iter_mut()
            .find(|slot| slot.as_ref().map_or(false, |entry| entry.id == id))
            .ok_or_else(|| GameError::PlayerNotFound(id.to_string()))?;
        let entry = slot.take().ok_or_else(|| GameError::PlayerNotFound(id.to_string()))?;
        let player = entry
            .player
            .ok_or_else(|| GameError::PlayerNotFound(id.to_string()))?;

        info!("Player {} left session {}", id, self.id);
        if !self.get_active_players().is_empty() && self.state != SessionState::Finished {
            self.server_send_update();
        }
        Ok(player)
    }

    pub fn get_player(&self, id: &str) -> GameResult<&Player> {
        self.players
            .iter()
            .flatten()
            .filter(|entry| entry.id == id)
            .find_map(|entry| entry.player.as_ref())
            .ok_or_else(|| GameError::PlayerNotFound(id.to_string()))
    }

    /// Active players other than `id`.
    pub fn get_others(&self, id: &str) -> Vec<&PlayerEntry<H>> {
        self.players
            .iter()
            .flatten()
            .filter(|entry| entry.id != id && entry.is_active())
            .collect()
    }

    pub fn get_active_players(&self) -> Vec<&PlayerEntry<H>> {
        self.players
            .iter()
            .flatten()
            .filter(|entry| entry.is_active())
            .collect()
    }

    // ── Rounds ───────────────────────────────────────────────────────

    /// Load and broadcast the next trial, or end the game after the last one.
    pub fn new_round(&mut self) -> GameResult<RoundOutcome> {
        if self.state != SessionState::Active {
            return Err(GameError::SessionNotActive);
        }

        if self.round_num == self.num_rounds as i32 - 1 {
            for entry in self.get_active_players() {
                if let Some(handle) = &entry.handle {
                    handle.disconnect();
                }
            }
            self.state = SessionState::Finished;
            info!(
                "Session {} finished after {} rounds",
                self.id, self.num_rounds
            );
            return Ok(RoundOutcome::Finished);
        }

        self.round_num += 1;
        let index = self.round_num as usize;
        info!("now on round {}", self.round_num + 1);
        self.objects = Some(self.trial_list[index].clone());
        self.server_send_update();
        Ok(RoundOutcome::Started(index))
    }

    /// Record the listener's final arrangement for the current round.
    ///
    /// Scores a copy of the current trial with the submitted cells and appends it
    /// to the data log. Stimuli left out of `placements` keep their initial cell.
    /// The resulting listener cells must still be one stimulus per grid cell.
    pub fn submit_placements(
        &mut self,
        player_id: &str,
        placements: &[Placement],
    ) -> GameResult<TrialRecord> {
        if self.state != SessionState::Active {
            return Err(GameError::SessionNotActive);
        }
        let role = self.get_player(player_id)?.role;
        if role != Role::Listener {
            return Err(GameError::WrongRole {
                expected: Role::Listener,
                actual: role,
            });
        }
        let mut recorded = self.objects.clone().ok_or(GameError::NoActiveRound)?;

        let mut seen: HashSet<&str> = HashSet::new();
        for placement in placements {
            if !seen.insert(placement.name.as_str()) {
                return Err(GameError::DuplicatePlacement(placement.name.clone()));
            }
            let (x, y) = (placement.grid_x, placement.grid_y);
            if !self.geometry.contains_cell(x, y) {
                return Err(GameError::CellOutOfBounds { x, y });
            }
            let stimulus = recorded
                .find_mut(&placement.name)
                .ok_or_else(|| GameError::UnknownStimulus(placement.name.clone()))?;
            stimulus.listener_coords =
                self.geometry
                    .coords_for((x, y), stimulus.object.width, stimulus.object.height);
        }

        let mut occupied: HashSet<(i32, i32)> = HashSet::new();
        for stimulus in &recorded.stimuli {
            let (x, y) = stimulus.listener_coords.cell();
            if !occupied.insert((x, y)) {
                return Err(GameError::CellOccupied { x, y });
            }
        }

        let score = scoring::score(&recorded);
        let record = TrialRecord {
            round_num: self.round_num,
            condition: recorded.condition().to_string(),
            score,
            objects: recorded,
        };
        info!(
            "Session {} round {} scored {}/3",
            self.id,
            self.round_num + 1,
            score
        );
        self.data.trials.push(record.clone());
        Ok(record)
    }

    /// End the session early. Recorded data is kept as-is.
    pub fn terminate(&mut self, reason: &str) {
        warn!("Terminating session {}: {}", self.id, reason);
        for entry in self.get_active_players() {
            if let Some(handle) = &entry.handle {
                handle.send(&ServerMessage::Error {
                    message: reason.to_string(),
                });
                handle.disconnect();
            }
        }
        self.state = SessionState::Finished;
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        let active_player_count = self.get_active_players().len();
        let objects = if active_player_count == self.players_threshold {
            self.objects.clone()
        } else {
            None
        };
        Snapshot {
            game_started: self.state != SessionState::AwaitingPlayers,
            players_threshold: self.players_threshold,
            active_player_count,
            data_log: self.data.clone(),
            round_num: self.round_num,
            objects,
            players: self
                .players
                .iter()
                .flatten()
                .map(|entry| PlayerSummary {
                    id: entry.id.clone(),
                })
                .collect(),
            instructions: self.instructions.clone(),
        }
    }

    /// Broadcast the current snapshot to every active player and return it.
    pub fn server_send_update(&self) -> Snapshot {
        let snapshot = self.snapshot();
        let message = ServerMessage::Update(snapshot.clone());
        for entry in self.get_active_players() {
            if let Some(handle) = &entry.handle {
                handle.send(&message);
            }
        }
        snapshot
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn exp_name(&self) -> &str {
        &self.exp_name
    }

    pub fn player_count(&self) -> usize {
        self.player_count
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn round_num(&self) -> i32 {
        self.round_num
    }

    pub fn num_rounds(&self) -> usize {
        self.num_rounds
    }

    pub fn trial_list(&self) -> &[Trial] {
        &self.trial_list
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.objects.as_ref()
    }

    pub fn data_log(&self) -> &DataLog {
        &self.data
    }
}
