//! In-memory room membership: game id -> set of live, authenticated
//! sessions. Owned exclusively by the realtime hub. Membership here is
//! presence (who receives events) and is deliberately independent of the
//! durable participant list (who may act).

use std::collections::{HashMap, HashSet};

use mongodb::bson::oid::ObjectId;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use super::protocol::ServerMessage;

pub type SessionId = Uuid;
pub type SessionSender = mpsc::UnboundedSender<ServerMessage>;

struct SessionEntry {
    user_id: ObjectId,
    sender: SessionSender,
    joined: HashSet<ObjectId>,
}

#[derive(Default)]
struct Rooms {
    sessions: HashMap<SessionId, SessionEntry>,
    members: HashMap<ObjectId, HashSet<SessionId>>,
}

impl Rooms {
    /// Delivers `message` to every member of the room, skipping `exclude`.
    /// A peer whose channel is gone is logged and dropped from all rooms;
    /// it never affects delivery to the others.
    fn send_to_room(
        &mut self,
        game_id: ObjectId,
        message: &ServerMessage,
        exclude: Option<SessionId>,
    ) {
        let Some(member_ids) = self.members.get(&game_id) else {
            return;
        };

        let mut dead = Vec::new();
        for session_id in member_ids {
            if Some(*session_id) == exclude {
                continue;
            }
            let Some(entry) = self.sessions.get(session_id) else {
                continue;
            };
            if entry.sender.send(message.clone()).is_err() {
                tracing::warn!(
                    "Dropping dead session {} from game {}",
                    session_id,
                    game_id.to_hex()
                );
                dead.push(*session_id);
            }
        }

        // A failed send means the socket task is gone; its own cleanup has
        // run or is about to, so no peerLeft is emitted here.
        for session_id in dead {
            self.drop_session(session_id);
        }
    }

    fn drop_session(&mut self, session_id: SessionId) {
        if let Some(entry) = self.sessions.remove(&session_id) {
            for game_id in entry.joined {
                if let Some(member_ids) = self.members.get_mut(&game_id) {
                    member_ids.remove(&session_id);
                    if member_ids.is_empty() {
                        self.members.remove(&game_id);
                    }
                }
            }
        }
    }
}

pub struct RoomMembershipTable {
    inner: Mutex<Rooms>,
}

impl RoomMembershipTable {
    pub fn new() -> Self {
        RoomMembershipTable {
            inner: Mutex::new(Rooms::default()),
        }
    }

    /// Registers a freshly authenticated session. Must be called before
    /// the session can join any room.
    pub async fn register(&self, session_id: SessionId, user_id: ObjectId, sender: SessionSender) {
        let mut rooms = self.inner.lock().await;
        rooms.sessions.insert(
            session_id,
            SessionEntry {
                user_id,
                sender,
                joined: HashSet::new(),
            },
        );
    }

    /// Adds the session to the room. Idempotent: joining twice is a no-op
    /// and emits nothing. Other members receive `peerJoined`.
    pub async fn join(&self, game_id: ObjectId, session_id: SessionId) {
        let mut rooms = self.inner.lock().await;
        let Some(entry) = rooms.sessions.get_mut(&session_id) else {
            return;
        };
        if !entry.joined.insert(game_id) {
            return;
        }
        let actor_id = entry.user_id.to_hex();

        rooms
            .members
            .entry(game_id)
            .or_default()
            .insert(session_id);

        rooms.send_to_room(game_id, &ServerMessage::PeerJoined { actor_id }, Some(session_id));
    }

    /// Removes the session from the room; no-op when it was not a member.
    /// Remaining members receive `peerLeft`.
    pub async fn leave(&self, game_id: ObjectId, session_id: SessionId) {
        let mut rooms = self.inner.lock().await;
        let Some(entry) = rooms.sessions.get_mut(&session_id) else {
            return;
        };
        if !entry.joined.remove(&game_id) {
            return;
        }
        let actor_id = entry.user_id.to_hex();

        if let Some(member_ids) = rooms.members.get_mut(&game_id) {
            member_ids.remove(&session_id);
            if member_ids.is_empty() {
                rooms.members.remove(&game_id);
            }
        }

        rooms.send_to_room(game_id, &ServerMessage::PeerLeft { actor_id }, None);
    }

    pub async fn broadcast(
        &self,
        game_id: ObjectId,
        message: ServerMessage,
        exclude: Option<SessionId>,
    ) {
        let mut rooms = self.inner.lock().await;
        rooms.send_to_room(game_id, &message, exclude);
    }

    /// Disconnect cleanup: leaves every room the session had joined, each
    /// emitting `peerLeft` to the remaining members.
    pub async fn remove_session_everywhere(&self, session_id: SessionId) {
        let mut rooms = self.inner.lock().await;
        let Some(entry) = rooms.sessions.remove(&session_id) else {
            return;
        };
        let actor_id = entry.user_id.to_hex();

        for game_id in entry.joined {
            if let Some(member_ids) = rooms.members.get_mut(&game_id) {
                member_ids.remove(&session_id);
                if member_ids.is_empty() {
                    rooms.members.remove(&game_id);
                }
            }
            rooms.send_to_room(
                game_id,
                &ServerMessage::PeerLeft {
                    actor_id: actor_id.clone(),
                },
                None,
            );
        }
    }

    pub async fn member_count(&self, game_id: ObjectId) -> usize {
        let rooms = self.inner.lock().await;
        rooms.members.get(&game_id).map_or(0, |m| m.len())
    }
}

impl Default for RoomMembershipTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn connect(
        table: &RoomMembershipTable,
    ) -> (SessionId, ObjectId, UnboundedReceiver<ServerMessage>) {
        let session_id = Uuid::new_v4();
        let user_id = ObjectId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        table.register(session_id, user_id, tx).await;
        (session_id, user_id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn join_notifies_existing_members_only() {
        let table = RoomMembershipTable::new();
        let game = ObjectId::new();

        let (s1, _, mut rx1) = connect(&table).await;
        let (s2, u2, mut rx2) = connect(&table).await;

        table.join(game, s1).await;
        table.join(game, s2).await;

        let seen = drain(&mut rx1);
        assert_eq!(
            seen,
            vec![ServerMessage::PeerJoined {
                actor_id: u2.to_hex()
            }]
        );
        // The joiner itself hears nothing.
        assert!(drain(&mut rx2).is_empty());
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let table = RoomMembershipTable::new();
        let game = ObjectId::new();

        let (s1, _, mut rx1) = connect(&table).await;
        let (s2, _, _rx2) = connect(&table).await;

        table.join(game, s1).await;
        table.join(game, s2).await;
        table.join(game, s2).await;

        assert_eq!(drain(&mut rx1).len(), 1);
        assert_eq!(table.member_count(game).await, 2);
    }

    #[tokio::test]
    async fn broadcast_skips_the_originator() {
        let table = RoomMembershipTable::new();
        let game = ObjectId::new();

        let (s1, _, mut rx1) = connect(&table).await;
        let (s2, _, mut rx2) = connect(&table).await;
        table.join(game, s1).await;
        table.join(game, s2).await;
        drain(&mut rx1);
        drain(&mut rx2);

        let msg = ServerMessage::GameDeleted {
            game_id: game.to_hex(),
        };
        table.broadcast(game, msg.clone(), Some(s1)).await;

        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2), vec![msg]);
    }

    #[tokio::test]
    async fn broadcast_reaches_no_one_after_leave() {
        let table = RoomMembershipTable::new();
        let game = ObjectId::new();

        let (s1, u1, _rx1) = connect(&table).await;
        let (s2, _, mut rx2) = connect(&table).await;
        table.join(game, s1).await;
        table.join(game, s2).await;
        drain(&mut rx2);

        table.leave(game, s2).await;
        table
            .broadcast(
                game,
                ServerMessage::PeerJoined {
                    actor_id: u1.to_hex(),
                },
                None,
            )
            .await;

        assert!(drain(&mut rx2).is_empty());
    }

    #[tokio::test]
    async fn leave_emits_peer_left_to_remaining_members() {
        let table = RoomMembershipTable::new();
        let game = ObjectId::new();

        let (s1, _, mut rx1) = connect(&table).await;
        let (s2, u2, _rx2) = connect(&table).await;
        table.join(game, s1).await;
        table.join(game, s2).await;
        drain(&mut rx1);

        table.leave(game, s2).await;
        assert_eq!(
            drain(&mut rx1),
            vec![ServerMessage::PeerLeft {
                actor_id: u2.to_hex()
            }]
        );

        // Leaving a room it never joined is a no-op.
        table.leave(ObjectId::new(), s2).await;
        assert!(drain(&mut rx1).is_empty());
    }

    #[tokio::test]
    async fn disconnect_removes_session_from_every_room() {
        let table = RoomMembershipTable::new();
        let game_a = ObjectId::new();
        let game_b = ObjectId::new();

        let (s1, u1, _rx1) = connect(&table).await;
        let (s2, _, mut rx2) = connect(&table).await;

        table.join(game_a, s1).await;
        table.join(game_b, s1).await;
        table.join(game_a, s2).await;
        drain(&mut rx2);

        table.remove_session_everywhere(s1).await;

        assert_eq!(table.member_count(game_a).await, 1);
        assert_eq!(table.member_count(game_b).await, 0);
        assert_eq!(
            drain(&mut rx2),
            vec![ServerMessage::PeerLeft {
                actor_id: u1.to_hex()
            }]
        );
    }

    #[tokio::test]
    async fn dead_peer_is_isolated_from_the_rest_of_the_room() {
        let table = RoomMembershipTable::new();
        let game = ObjectId::new();

        let (s1, _, rx1) = connect(&table).await;
        let (s2, _, mut rx2) = connect(&table).await;
        table.join(game, s1).await;
        table.join(game, s2).await;
        drain(&mut rx2);

        // Simulate a torn-down socket task: the receiver is gone.
        drop(rx1);

        let msg = ServerMessage::GameDeleted {
            game_id: game.to_hex(),
        };
        table.broadcast(game, msg.clone(), None).await;

        // The healthy peer still gets the event; the dead one is dropped.
        assert_eq!(drain(&mut rx2), vec![msg]);
        assert_eq!(table.member_count(game).await, 1);
    }
}
