//! JSON wire messages exchanged over the WebSocket.
//!
//! Every frame is a text frame holding one object with a camelCase `type`
//! discriminator, e.g. `{"type":"respawnRequest","playerId":"k3j9x0a1b"}`.

use crate::collision::Correction;
use crate::math::Vec3;
use crate::movement::{ActorState, InputIntent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Sender id used for server-originated chat lines.
pub const SERVER_ID: &str = "SERVER";

pub const MAX_CHAT_LEN: usize = 256;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Input { player_id: String, input: InputIntent },
    #[serde(rename_all = "camelCase")]
    Shoot {
        player_id: String,
        position: Vec3,
        direction: Vec3,
        equip_id: i32,
    },
    #[serde(rename_all = "camelCase")]
    RespawnRequest { player_id: String },
    #[serde(rename_all = "camelCase")]
    Chat { player_id: String, message: String },
    /// Asks the server to forget what it last sent this connection so the
    /// next tick carries every actor.
    #[serde(rename_all = "camelCase")]
    ResyncRequest { player_id: String },
}

impl ClientMessage {
    pub fn player_id(&self) -> &str {
        match self {
            ClientMessage::Input { player_id, .. }
            | ClientMessage::Shoot { player_id, .. }
            | ClientMessage::RespawnRequest { player_id }
            | ClientMessage::Chat { player_id, .. }
            | ClientMessage::ResyncRequest { player_id } => player_id,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Init {
        id: String,
    },
    /// Per-recipient delta: only actors whose snapshot changed since the
    /// last `state` sent to this connection.
    State {
        tick: u64,
        players: BTreeMap<String, ActorSnapshot>,
    },
    #[serde(rename_all = "camelCase")]
    Hit {
        player_id: String,
        damage: i32,
        shooter_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Death { player_id: String, killer_id: String },
    #[serde(rename_all = "camelCase")]
    RespawnConfirmed { player_id: String, position: Vec3 },
    #[serde(rename_all = "camelCase")]
    Chat { player_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: String },
}

impl ServerMessage {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// Broadcast view of an actor. Timers and buffers stay on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation_y: f32,
    pub is_grounded: bool,
    pub health: i32,
    pub is_dead: bool,
    pub equipped_item_id: i32,
    pub input: InputIntent,
    #[serde(default)]
    pub pending_correction: Option<Correction>,
}

impl From<&ActorState> for ActorSnapshot {
    fn from(state: &ActorState) -> Self {
        Self {
            position: state.position,
            velocity: state.velocity,
            rotation_y: state.rotation_y,
            is_grounded: state.is_grounded,
            health: state.health,
            is_dead: state.is_dead,
            equipped_item_id: state.equipped_item_id,
            input: state.input.clone(),
            pending_correction: state.pending_correction,
        }
    }
}

/// Strips control characters and caps the length of a chat line.
pub fn sanitize_chat(message: &str) -> String {
    message
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_CHAT_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::PRIMARY_ITEM;

    #[test]
    fn test_client_input_wire_format() {
        let text = r#"{"type":"input","playerId":"abc","input":{"forward":true,"rotationY":1.5,"equippedItemId":1}}"#;
        let msg = ClientMessage::from_json(text).unwrap();
        match &msg {
            ClientMessage::Input { player_id, input } => {
                assert_eq!(player_id, "abc");
                assert!(input.forward);
                assert!(!input.jump);
                assert_eq!(input.rotation_y, 1.5);
                assert_eq!(input.equipped_item_id, PRIMARY_ITEM);
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(msg.player_id(), "abc");
    }

    #[test]
    fn test_client_shoot_wire_format() {
        let text = r#"{"type":"shoot","playerId":"p","position":{"x":0,"y":1.6,"z":0},"direction":{"x":0,"y":0,"z":1},"equipId":0}"#;
        let msg = ClientMessage::from_json(text).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Shoot {
                player_id: "p".to_string(),
                position: Vec3::new(0.0, 1.6, 0.0),
                direction: Vec3::new(0.0, 0.0, 1.0),
                equip_id: 0,
            }
        );
    }

    #[test]
    fn test_server_messages_use_camel_case() {
        let text = ServerMessage::RespawnConfirmed {
            player_id: "p".to_string(),
            position: Vec3::new(0.0, 1.8, 0.0),
        }
        .to_json()
        .unwrap();
        assert!(text.contains(r#""type":"respawnConfirmed""#));
        assert!(text.contains(r#""playerId":"p""#));

        let left = ServerMessage::PlayerLeft {
            player_id: "q".to_string(),
        }
        .to_json()
        .unwrap();
        assert_eq!(left, r#"{"type":"playerLeft","playerId":"q"}"#);
    }

    #[test]
    fn test_state_snapshot_fields() {
        let mut state = ActorState::new(Vec3::new(1.0, 0.0, 2.0));
        state.pending_correction = Some(Correction {
            tick: 4,
            delta: Vec3::new(0.0, 0.0, 2.0),
        });
        let mut players = BTreeMap::new();
        players.insert("a".to_string(), ActorSnapshot::from(&state));
        let text = ServerMessage::State { tick: 9, players }.to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let actor = &value["players"]["a"];
        assert_eq!(value["type"], "state");
        assert_eq!(value["tick"], 9);
        assert_eq!(actor["health"], 100);
        assert_eq!(actor["isDead"], false);
        assert_eq!(actor["equippedItemId"], -1);
        assert_eq!(actor["pendingCorrection"]["tick"], 4);
        assert!(actor.get("clock").is_none());

        let decoded = ServerMessage::from_json(&text).unwrap();
        match decoded {
            ServerMessage::State { players, .. } => {
                assert_eq!(players["a"], ActorSnapshot::from(&state));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_malformed_messages_are_errors() {
        assert!(matches!(
            ClientMessage::from_json("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(ClientMessage::from_json(r#"{"playerId":"x"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"teleport","playerId":"x"}"#).is_err());
    }

    #[test]
    fn test_sanitize_chat() {
        assert_eq!(sanitize_chat("  hi\u{7}\nthere "), "hithere");
        let long = "x".repeat(MAX_CHAT_LEN + 50);
        assert_eq!(sanitize_chat(&long).chars().count(), MAX_CHAT_LEN);
    }
}
