use std::{sync::Arc, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        common::{ParticipantSummary, PublicQuestion},
        events::LiveEvent,
        ws::{PlayerInboundMessage, PlayerNotice},
    },
    services::{flow_service, live_events, session_service},
    state::{
        PlayerConnection, SessionHandle, SharedState,
        state_machine::{ActivePhase, SessionPhase},
    },
};

/// A socket must identify itself (join or rejoin) within this window.
const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of a player WebSocket connection.
///
/// The first frame must be a `join` or `rejoin` message; afterwards the
/// socket carries answer submissions inbound and live events outbound.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let binding = match bind_participant(&state, &initial_message, &outbound_tx).await {
        Some(binding) => binding,
        None => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };
    let (handle, participant_id) = binding;

    info!(participant = %participant_id, "player connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match PlayerInboundMessage::from_json_str(&text) {
                Ok(PlayerInboundMessage::Answer {
                    option_index,
                    latency_ms,
                }) => {
                    if let Err(err) =
                        flow_service::submit_answer(&handle, participant_id, option_index, latency_ms)
                            .await
                    {
                        send_notice(
                            &outbound_tx,
                            &PlayerNotice::AnswerRejected {
                                message: err.to_string(),
                            },
                        );
                    }
                }
                Ok(PlayerInboundMessage::Leave) => {
                    if let Err(err) = session_service::leave(&handle, participant_id).await {
                        warn!(participant = %participant_id, error = %err, "leave failed");
                    }
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
                Ok(PlayerInboundMessage::Join { .. } | PlayerInboundMessage::Rejoin { .. }) => {
                    warn!(participant = %participant_id, "ignoring duplicate identification message");
                }
                Ok(PlayerInboundMessage::Unknown) => {
                    warn!(participant = %participant_id, "ignoring unknown player message");
                }
                Err(err) => {
                    warn!(participant = %participant_id, error = %err, "failed to parse player message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(participant = %participant_id, "player closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(participant = %participant_id, error = %err, "websocket error");
                break;
            }
        }
    }

    release_connection(&state, &handle, participant_id, &outbound_tx).await;
    info!(participant = %participant_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Resolve the identification frame into a bound participant, registering the
/// connection and replaying the session state to the socket.
async fn bind_participant(
    state: &SharedState,
    payload: &str,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Option<(Arc<SessionHandle>, Uuid)> {
    let inbound = match PlayerInboundMessage::from_json_str(payload) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse identification message");
            return None;
        }
    };

    let joined = match inbound {
        PlayerInboundMessage::Join { code, name } => {
            session_service::join(state, &code, &name).await
        }
        PlayerInboundMessage::Rejoin {
            session_id,
            participant_id,
        } => session_service::rejoin(state, &session_id, participant_id)
            .await
            .map(|(handle, participant)| (handle, session_id, participant)),
        _ => {
            warn!("first message was not a join or rejoin");
            return None;
        }
    };

    match joined {
        Ok((handle, session_id, participant)) => {
            let participant_id = participant.id;
            // A rejoin replaces any previous connection for this participant.
            handle.players().insert(
                participant_id,
                PlayerConnection {
                    participant_id,
                    tx: outbound_tx.clone(),
                },
            );

            send_notice(
                outbound_tx,
                &PlayerNotice::Joined {
                    session_id,
                    participant,
                },
            );
            resync(&handle, outbound_tx).await;

            Some((handle, participant_id))
        }
        Err(err) => {
            send_notice(
                outbound_tx,
                &PlayerNotice::JoinError {
                    message: err.to_string(),
                },
            );
            None
        }
    }
}

/// Push the full session picture to a freshly bound socket: the roster, and
/// the live question if one is on screen. Reconnects rely on this instead of
/// missed events.
async fn resync(handle: &Arc<SessionHandle>, outbound_tx: &mpsc::UnboundedSender<Message>) {
    let roster = handle
        .read_data(|session| {
            session
                .participants
                .values()
                .map(ParticipantSummary::from)
                .collect::<Vec<_>>()
        })
        .await;
    send_event(outbound_tx, &live_events::participant_list(roster));

    if handle.phase().await == SessionPhase::Active(ActivePhase::Question) {
        let replay = handle
            .read_data(|session| {
                let index = session.current_question?;
                let question = session.quiz.questions.get(index)?;
                Some(LiveEvent::QuestionShown {
                    index,
                    question: PublicQuestion::from(question),
                    time_limit_secs: session.quiz.time_limit_secs,
                })
            })
            .await;
        if let Some(event) = replay {
            send_event(outbound_tx, &event);
        }
    }
}

/// Unregister the connection unless a reconnect already replaced it, and
/// apply the disconnect policy.
async fn release_connection(
    state: &SharedState,
    handle: &Arc<SessionHandle>,
    participant_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) {
    let is_current = handle
        .players()
        .get(&participant_id)
        .is_some_and(|connection| connection.tx.same_channel(outbound_tx));
    if is_current {
        handle.players().remove(&participant_id);

        if state.config().remove_on_disconnect {
            if let Err(err) = session_service::leave(handle, participant_id).await {
                warn!(participant = %participant_id, error = %err, "disconnect removal failed");
            }
        }
    }
}

fn send_notice(tx: &mpsc::UnboundedSender<Message>, notice: &PlayerNotice) {
    send_json(tx, notice);
}

fn send_event(tx: &mpsc::UnboundedSender<Message>, event: &LiveEvent) {
    send_json(tx, event);
}

fn send_json<T: serde::Serialize>(tx: &mpsc::UnboundedSender<Message>, value: &T) {
    match serde_json::to_string(value) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => warn!(error = %err, "failed to serialize outbound player message"),
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
