use axum::extract::ws::Message;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{
        common::ParticipantSummary,
        events::LiveEvent,
        sse::{ServerEvent, SessionCreatedEvent},
    },
    state::{SessionHandle, SharedState},
};

/// Wire name of the admin-dashboard session listing event.
const EVENT_SESSION_CREATED: &str = "session-created";

/// Which audience of a session an event is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Admin/board viewers subscribed to the session's SSE stream.
    Viewers,
    /// Every connected player socket.
    Players,
    /// Both viewer and player channels.
    Everyone,
}

/// Publish an event to the selected audience of one session.
///
/// Delivery is best-effort per target: a dead player socket is dropped from
/// the connection registry and skipped, never failing the overall publish.
pub fn publish(handle: &SessionHandle, audience: Audience, event: &LiveEvent) {
    if matches!(audience, Audience::Viewers | Audience::Everyone) {
        publish_viewers(handle, event);
    }
    if matches!(audience, Audience::Players | Audience::Everyone) {
        publish_players(handle, event);
    }
}

/// Send an event to a single player socket, if it is connected.
///
/// A missing or dead connection is a no-op: the participant keeps their spot
/// on the roster and will resync on reconnect.
pub fn send_to_player(handle: &SessionHandle, participant_id: Uuid, payload: &impl Serialize) {
    let Some(connection) = handle.players().get(&participant_id) else {
        debug!(participant = %participant_id, "player not connected; dropping event");
        return;
    };
    let tx = connection.tx.clone();
    drop(connection);

    if send_json(&tx, payload).is_err() {
        warn!(participant = %participant_id, "player socket closed; removing connection");
        handle.players().remove(&participant_id);
    }
}

/// Notify the global admin stream that a session was created.
pub fn broadcast_session_created(state: &SharedState, payload: &SessionCreatedEvent) {
    match ServerEvent::json(Some(EVENT_SESSION_CREATED.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(error = %err, "failed to serialize session-created payload"),
    }
}

/// Build the full-roster resync event from a summary list.
pub fn participant_list(participants: Vec<ParticipantSummary>) -> LiveEvent {
    LiveEvent::ParticipantList { participants }
}

fn publish_viewers(handle: &SessionHandle, event: &LiveEvent) {
    match ServerEvent::json(Some(event.name().to_string()), event) {
        Ok(server_event) => handle.viewers().broadcast(server_event),
        Err(err) => warn!(event = event.name(), error = %err, "failed to serialize viewer SSE payload"),
    }
}

fn publish_players(handle: &SessionHandle, event: &LiveEvent) {
    let mut dead = Vec::new();

    for connection in handle.players().iter() {
        if send_json(&connection.tx, event).is_err() {
            dead.push(*connection.key());
        }
    }

    for participant_id in dead {
        warn!(participant = %participant_id, "player socket closed; removing connection");
        handle.players().remove(&participant_id);
    }
}

/// Serialize a payload and push it onto a player socket's writer channel.
///
/// Serialization failure is permanent (a bug in the payload type), so it is
/// logged and swallowed; a closed writer is reported to the caller.
fn send_json<T>(tx: &tokio::sync::mpsc::UnboundedSender<Message>, value: &T) -> Result<(), ()>
where
    T: ?Sized + Serialize,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize player message; dropping");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into())).map_err(|_| ())
}
