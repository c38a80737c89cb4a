use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::GameConfig;
use crate::constants::PLAYERS_THRESHOLD;
use crate::game::session::{PlayerHandle, RoundOutcome, ServerSession, SessionState};
use crate::network::server::ConnectionHandle;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::stimuli::catalog::StimulusCatalog;

/// Everything a connection task reports to the dispatcher.
#[derive(Debug)]
pub enum LobbyEvent {
    Connected {
        id: String,
        handle: ConnectionHandle,
    },
    Message {
        id: String,
        message: ClientMessage,
    },
    Disconnected {
        id: String,
    },
}

/// Pairs incoming participants into sessions and routes their messages.
///
/// Owned by a single task, so sessions need no locking.
pub struct Lobby<R: Rng> {
    catalog: Arc<StimulusCatalog>,
    config: GameConfig,
    rng: R,
    sessions: HashMap<String, ServerSession<ConnectionHandle>>,
    /// Session holding a speaker who is still waiting for a listener.
    waiting: Option<String>,
    /// player id -> session id
    membership: HashMap<String, String>,
}

impl<R: Rng> Lobby<R> {
    pub fn new(catalog: Arc<StimulusCatalog>, config: GameConfig, rng: R) -> Self {
        Self {
            catalog,
            config,
            rng,
            sessions: HashMap::new(),
            waiting: None,
            membership: HashMap::new(),
        }
    }

    pub fn handle_event(&mut self, event: LobbyEvent) {
        match event {
            LobbyEvent::Connected { id, handle } => self.on_connected(id, handle),
            LobbyEvent::Message { id, message } => self.on_message(&id, message),
            LobbyEvent::Disconnected { id } => self.on_disconnected(&id),
        }
    }

    fn on_connected(&mut self, id: String, handle: ConnectionHandle) {
        if let Some(session_id) = self.waiting.take() {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                match session.add_player(id.clone(), handle.clone()) {
                    Ok(role) => {
                        info!("Player {} joined session {} as {:?}", id, session_id, role);
                        self.membership.insert(id, session_id.clone());
                        if session.state() == SessionState::Active {
                            if let Err(e) = session.new_round() {
                                error!("Session {} could not start: {}", session_id, e);
                            }
                        } else {
                            self.waiting = Some(session_id);
                        }
                        return;
                    }
                    Err(e) => warn!("Could not join session {}: {}", session_id, e),
                }
            }
        }

        let session_id = format!("{:016x}", self.rng.gen::<u64>());
        let result = ServerSession::new(
            session_id.clone(),
            self.config.experiment_name.clone(),
            PLAYERS_THRESHOLD,
            (handle.clone(), id.clone()),
            &self.catalog,
            &self.config,
            &mut self.rng,
        );
        match result {
            Ok(session) => {
                info!(
                    "Player {} opened session {} ({}, {} players)",
                    id,
                    session_id,
                    session.exp_name(),
                    session.player_count()
                );
                self.sessions.insert(session_id.clone(), session);
                self.membership.insert(id, session_id.clone());
                self.waiting = Some(session_id);
            }
            Err(e) => {
                error!("Failed to create session for {}: {}", id, e);
                handle.send(&ServerMessage::Error {
                    message: e.to_string(),
                });
                handle.disconnect();
            }
        }
    }

    fn on_message(&mut self, id: &str, message: ClientMessage) {
        let Some(session_id) = self.membership.get(id).cloned() else {
            warn!("Message from {} who is not in a session", id);
            return;
        };
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return;
        };

        let outcome = match message {
            ClientMessage::SubmitPlacements { placements } => {
                if let Err(e) = session.submit_placements(id, &placements) {
                    warn!("Rejected placements from {}: {}", id, e);
                    return;
                }
                session.new_round()
            }
        };
        match outcome {
            Ok(RoundOutcome::Started(_)) => {}
            Ok(RoundOutcome::Finished) => self.close_session(&session_id),
            Err(e) => warn!("Session {} could not advance: {}", session_id, e),
        }
    }

    fn on_disconnected(&mut self, id: &str) {
        let Some(session_id) = self.membership.remove(id) else {
            return;
        };
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return;
        };
        if let Err(e) = session.remove_player(id) {
            warn!("{}", e);
        }

        match session.state() {
            SessionState::Active => {
                session.terminate("Your partner disconnected");
                self.close_session(&session_id);
            }
            SessionState::AwaitingPlayers => {
                if session.get_active_players().is_empty() {
                    self.close_session(&session_id);
                }
            }
            SessionState::Finished => self.close_session(&session_id),
        }
    }

    fn close_session(&mut self, session_id: &str) {
        if let Some(session) = self.sessions.remove(session_id) {
            info!(
                "Closed session {} with {} recorded trials",
                session_id,
                session.data_log().trials.len()
            );
        }
        self.membership.retain(|_, s| s != session_id);
        if self.waiting.as_deref() == Some(session_id) {
            self.waiting = None;
        }
    }

    pub fn session(&self, session_id: &str) -> Option<&ServerSession<ConnectionHandle>> {
        self.sessions.get(session_id)
    }

    pub fn session_of(&self, player_id: &str) -> Option<&str> {
        self.membership.get(player_id).map(String::as_str)
    }

    pub fn waiting_session(&self) -> Option<&str> {
        self.waiting.as_deref()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Apply lobby events until every connection task has gone away.
pub async fn run_dispatcher<R: Rng>(mut lobby: Lobby<R>, mut events: mpsc::UnboundedReceiver<LobbyEvent>) {
    while let Some(event) = events.recv().await {
        lobby.handle_event(event);
    }
    info!("Lobby dispatcher shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_ROUNDS;
    use crate::network::server::Outbound;
    use crate::protocol::Snapshot;
    use crate::stimuli::catalog::tests::shipped_catalog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn lobby(seed: u64) -> Lobby<StdRng> {
        Lobby::new(
            Arc::new(shipped_catalog()),
            GameConfig::default(),
            StdRng::seed_from_u64(seed),
        )
    }

    fn connect(lobby: &mut Lobby<StdRng>, id: &str) -> UnboundedReceiver<Outbound> {
        let (handle, rx) = ConnectionHandle::channel();
        lobby.handle_event(LobbyEvent::Connected {
            id: id.to_string(),
            handle,
        });
        rx
    }

    fn submit(lobby: &mut Lobby<StdRng>, id: &str) {
        lobby.handle_event(LobbyEvent::Message {
            id: id.to_string(),
            message: ClientMessage::SubmitPlacements {
                placements: Vec::new(),
            },
        });
    }

    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn last_snapshot(frames: &[Outbound]) -> Option<&Snapshot> {
        frames.iter().rev().find_map(|f| match f {
            Outbound::Message(ServerMessage::Update(s)) => Some(s),
            _ => None,
        })
    }

    #[test]
    fn pairs_two_players_and_starts_first_round() {
        let mut lobby = lobby(1);
        let mut rx_a = connect(&mut lobby, "a");
        let sid = lobby.waiting_session().unwrap().to_string();
        assert_eq!(sid.len(), 16);

        let mut rx_b = connect(&mut lobby, "b");
        assert!(lobby.waiting_session().is_none());
        assert_eq!(lobby.session_of("b"), Some(sid.as_str()));

        let session = lobby.session(&sid).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.round_num(), 0);

        for rx in [&mut rx_a, &mut rx_b] {
            let frames = drain(rx);
            let snapshot = last_snapshot(&frames).unwrap();
            assert_eq!(snapshot.round_num, 0);
            assert!(snapshot.objects.is_some());
        }
    }

    #[test]
    fn third_player_opens_new_session() {
        let mut lobby = lobby(2);
        let _a = connect(&mut lobby, "a");
        let _b = connect(&mut lobby, "b");
        let _c = connect(&mut lobby, "c");
        assert_eq!(lobby.session_count(), 2);
        assert_ne!(lobby.session_of("a"), lobby.session_of("c"));
        assert_eq!(lobby.waiting_session(), lobby.session_of("c"));
    }

    #[test]
    fn listener_submission_records_and_advances() {
        let mut lobby = lobby(3);
        let _a = connect(&mut lobby, "a");
        let _b = connect(&mut lobby, "b");
        let sid = lobby.session_of("a").unwrap().to_string();

        submit(&mut lobby, "b");
        let session = lobby.session(&sid).unwrap();
        assert_eq!(session.data_log().trials.len(), 1);
        assert_eq!(session.data_log().trials[0].round_num, 0);
        assert_eq!(session.round_num(), 1);
    }

    #[test]
    fn speaker_submission_is_ignored() {
        let mut lobby = lobby(4);
        let _a = connect(&mut lobby, "a");
        let _b = connect(&mut lobby, "b");
        let sid = lobby.session_of("a").unwrap().to_string();

        submit(&mut lobby, "a");
        submit(&mut lobby, "stranger");
        let session = lobby.session(&sid).unwrap();
        assert!(session.data_log().trials.is_empty());
        assert_eq!(session.round_num(), 0);
    }

    #[test]
    fn partner_leaving_ends_session() {
        let mut lobby = lobby(5);
        let mut rx_a = connect(&mut lobby, "a");
        let _b = connect(&mut lobby, "b");
        drain(&mut rx_a);

        lobby.handle_event(LobbyEvent::Disconnected { id: "b".to_string() });
        assert_eq!(lobby.session_count(), 0);
        assert!(lobby.session_of("a").is_none());

        let frames = drain(&mut rx_a);
        assert!(frames
            .iter()
            .any(|f| matches!(f, Outbound::Message(ServerMessage::Error { .. }))));
        assert!(matches!(frames.last(), Some(Outbound::Close)));

        // The closed connection's own disconnect is a no-op.
        lobby.handle_event(LobbyEvent::Disconnected { id: "a".to_string() });
        assert_eq!(lobby.session_count(), 0);
    }

    #[test]
    fn lone_waiting_player_leaving_frees_the_slot() {
        let mut lobby = lobby(6);
        let _a = connect(&mut lobby, "a");
        lobby.handle_event(LobbyEvent::Disconnected { id: "a".to_string() });
        assert_eq!(lobby.session_count(), 0);
        assert!(lobby.waiting_session().is_none());

        let _b = connect(&mut lobby, "b");
        assert_eq!(lobby.session_count(), 1);
        assert_eq!(lobby.waiting_session(), lobby.session_of("b"));
    }

    #[test]
    fn full_game_closes_session() {
        let mut lobby = lobby(7);
        let mut rx_a = connect(&mut lobby, "a");
        let mut rx_b = connect(&mut lobby, "b");
        let sid = lobby.session_of("a").unwrap().to_string();

        for _ in 0..NUM_ROUNDS - 1 {
            submit(&mut lobby, "b");
        }
        let session = lobby.session(&sid).unwrap();
        assert_eq!(session.round_num(), NUM_ROUNDS as i32 - 1);
        assert_eq!(session.data_log().trials.len(), NUM_ROUNDS - 1);
        assert!(!drain(&mut rx_a).iter().any(|f| matches!(f, Outbound::Close)));

        submit(&mut lobby, "b");
        assert!(lobby.session(&sid).is_none());
        assert!(lobby.session_of("b").is_none());
        assert!(matches!(drain(&mut rx_a).last(), Some(Outbound::Close)));
        assert!(matches!(drain(&mut rx_b).last(), Some(Outbound::Close)));
    }

    #[test]
    fn unusable_catalog_reports_error_to_client() {
        let catalog = StimulusCatalog::from_json(
            r##"[{"name":"solo","class_1":"a","class_2":"b","distr":"atypical","is_parent":false,
                 "width":10.0,"height":10.0,"color":"#fff","target":1}]"##,
        )
        .unwrap();
        let config = GameConfig {
            max_sampling_attempts: 3,
            ..GameConfig::default()
        };
        let mut lobby = Lobby::new(Arc::new(catalog), config, StdRng::seed_from_u64(0));
        let mut rx = connect(&mut lobby, "a");
        assert_eq!(lobby.session_count(), 0);
        let frames = drain(&mut rx);
        assert!(matches!(
            &frames[0],
            Outbound::Message(ServerMessage::Error { message }) if message.starts_with("no valid stimulus triple")
        ));
        assert!(matches!(frames.last(), Some(Outbound::Close)));
    }

    #[tokio::test]
    async fn dispatcher_drains_events() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (handle, mut out) = ConnectionHandle::channel();
        tx.send(LobbyEvent::Connected {
            id: "a".to_string(),
            handle,
        })
        .unwrap();
        drop(tx);
        run_dispatcher(lobby(8), rx).await;
        let frames = drain(&mut out);
        assert!(matches!(
            &frames[0],
            Outbound::Message(ServerMessage::Welcome { .. })
        ));
    }
}
