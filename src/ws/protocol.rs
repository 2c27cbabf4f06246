//! Wire protocol for client-server communication
//!
//! Every message is UTF-8 text of the form `<TypeTag>:<json>`. Field names
//! follow the browser client (camelCase).

use serde::{Deserialize, Serialize};

use crate::game::combat::{Projectile, ProjectileState};

/// Separates the type tag from the payload
pub const TAG_DELIMITER: char = ':';

/// Protocol errors. All are recoverable: the message is dropped and the
/// connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message has no type tag")]
    MissingTag,

    #[error("unknown message type: {0}")]
    UnknownTag(String),

    #[error("malformed {tag} payload: {reason}")]
    Malformed { tag: &'static str, reason: String },

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

// ============================================================================
// Client -> server
// ============================================================================

/// Latest input state of one client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInputStateUpdate {
    #[serde(default)]
    pub moving_up: bool,
    #[serde(default)]
    pub moving_down: bool,
    #[serde(default)]
    pub moving_left: bool,
    #[serde(default)]
    pub moving_right: bool,
    #[serde(default)]
    pub shooting: bool,
    /// Aim direction in radians
    #[serde(default)]
    pub angle: f32,
    pub username: String,
    pub auth_string: String,
}

/// One-time request to replace the generated username
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernameChangeRequest {
    pub old_username: String,
    pub new_username: String,
    pub authentication_string: String,
}

/// Messages sent from client to server
#[derive(Debug, Clone)]
pub enum ClientMsg {
    InputState(ClientInputStateUpdate),
    UsernameChange(UsernameChangeRequest),
}

type Decoder = fn(&str) -> Result<ClientMsg, ProtocolError>;

/// Closed set of inbound message types
const INBOUND_DECODERS: &[(&str, Decoder)] = &[
    ("ClientInputStateUpdate", decode_input_state),
    ("UsernameChangeRequest", decode_username_change),
];

/// Decode an inbound frame by looking its tag up in the decoder table
pub fn decode_client_msg(text: &str) -> Result<ClientMsg, ProtocolError> {
    let (tag, payload) = text
        .split_once(TAG_DELIMITER)
        .ok_or(ProtocolError::MissingTag)?;

    let decoder = INBOUND_DECODERS
        .iter()
        .find(|(known, _)| *known == tag)
        .map(|(_, decoder)| *decoder)
        .ok_or_else(|| ProtocolError::UnknownTag(tag.to_string()))?;

    decoder(payload)
}

fn decode_input_state(payload: &str) -> Result<ClientMsg, ProtocolError> {
    let tag = "ClientInputStateUpdate";
    let update: ClientInputStateUpdate = serde_json::from_str(payload).map_err(|e| {
        ProtocolError::Malformed {
            tag,
            reason: e.to_string(),
        }
    })?;
    if !update.angle.is_finite() {
        return Err(ProtocolError::Malformed {
            tag,
            reason: "angle is not finite".to_string(),
        });
    }
    Ok(ClientMsg::InputState(update))
}

fn decode_username_change(payload: &str) -> Result<ClientMsg, ProtocolError> {
    serde_json::from_str(payload)
        .map(ClientMsg::UsernameChange)
        .map_err(|e| ProtocolError::Malformed {
            tag: "UsernameChangeRequest",
            reason: e.to_string(),
        })
}

// ============================================================================
// Server -> client
// ============================================================================

/// Handshake sent once to a freshly connected client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialServerJoinState {
    pub initial_username: String,
    pub authentication_string: String,
    pub initial_location_x: f32,
    pub initial_location_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Success,
    Failed,
}

/// Answer to a username change request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerUsernameRequestStatus {
    pub status: RequestStatus,
    /// Final username on success, failure reason otherwise
    pub message: String,
}

/// A player joined or left the shared world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerListChange {
    pub username: String,
    pub joined: bool,
}

/// Per-tick state of one player
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPlayerUpdate {
    pub player_name: String,
    pub pos_x: f32,
    pub pos_y: f32,
    /// Facing in radians
    pub angle: f32,
    pub health: u32,
    pub score: u32,
    pub firing: bool,
}

/// Everyone already in the world, sent after a successful rename
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialPlayerList {
    pub players: Vec<ServerPlayerUpdate>,
}

/// Delta record for one projectile; its shape depends on `state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletInfo {
    /// 0 = new, 1 = updated, 2 = dead
    pub state: u8,
    pub bullet_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_y: Option<f32>,
}

impl BulletInfo {
    /// Everything a client needs to start drawing a projectile
    pub fn new_bullet(owner: &str, projectile: &Projectile) -> Self {
        Self {
            state: ProjectileState::New.code(),
            bullet_id: projectile.id,
            owner: Some(owner.to_string()),
            position_x: Some(projectile.motion.x),
            position_y: Some(projectile.motion.y),
            velocity_x: Some(projectile.motion.vel_x),
            velocity_y: Some(projectile.motion.vel_y),
        }
    }

    /// Velocity is constant and the owner already known: position only
    pub fn updated(projectile: &Projectile) -> Self {
        Self {
            state: ProjectileState::Updated.code(),
            bullet_id: projectile.id,
            owner: None,
            position_x: Some(projectile.motion.x),
            position_y: Some(projectile.motion.y),
            velocity_x: None,
            velocity_y: None,
        }
    }

    pub fn dead(bullet_id: u32) -> Self {
        Self {
            state: ProjectileState::Dead.code(),
            bullet_id,
            owner: None,
            position_x: None,
            position_y: None,
            velocity_x: None,
            velocity_y: None,
        }
    }

    /// Record shaped by the projectile's current lifecycle state
    pub fn for_state(owner: &str, projectile: &Projectile) -> Self {
        match projectile.state {
            ProjectileState::New => Self::new_bullet(owner, projectile),
            ProjectileState::Updated => Self::updated(projectile),
            ProjectileState::Dead => Self::dead(projectile.id),
        }
    }
}

/// Score of the receiving player after a kill
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsUpdate {
    pub username: String,
    pub num_points: u32,
}

/// Health of the receiving player after a hit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerHealthMessage {
    pub username: String,
    pub health: u32,
    pub affected_by: String,
}

/// Messages sent from server to client
#[derive(Debug, Clone)]
pub enum ServerMsg {
    JoinState(InitialServerJoinState),
    UsernameStatus(ServerUsernameRequestStatus),
    PlayerListChange(PlayerListChange),
    InitialPlayerList(InitialPlayerList),
    PlayerUpdates(Vec<ServerPlayerUpdate>),
    Bullets(Vec<BulletInfo>),
    Points(PointsUpdate),
    Health(PlayerHealthMessage),
}

impl ServerMsg {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::JoinState(_) => "InitialServerJoinState",
            Self::UsernameStatus(_) => "ServerUsernameRequestStatus",
            Self::PlayerListChange(_) => "PlayerListChange",
            Self::InitialPlayerList(_) => "InitialPlayerList",
            Self::PlayerUpdates(_) => "ServerPlayerUpdate[]",
            Self::Bullets(_) => "BulletInfo[]",
            Self::Points(_) => "PointsUpdate",
            Self::Health(_) => "PlayerHealthMessage",
        }
    }

    /// Render as `<TypeTag>:<json>`
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let payload = match self {
            Self::JoinState(m) => serde_json::to_string(m)?,
            Self::UsernameStatus(m) => serde_json::to_string(m)?,
            Self::PlayerListChange(m) => serde_json::to_string(m)?,
            Self::InitialPlayerList(m) => serde_json::to_string(m)?,
            Self::PlayerUpdates(m) => serde_json::to_string(m)?,
            Self::Bullets(m) => serde_json::to_string(m)?,
            Self::Points(m) => serde_json::to_string(m)?,
            Self::Health(m) => serde_json::to_string(m)?,
        };
        Ok(format!("{}{}{}", self.tag(), TAG_DELIMITER, payload))
    }

    pub fn username_failed(reason: impl Into<String>) -> Self {
        Self::UsernameStatus(ServerUsernameRequestStatus {
            status: RequestStatus::Failed,
            message: reason.into(),
        })
    }

    pub fn username_accepted(username: impl Into<String>) -> Self {
        Self::UsernameStatus(ServerUsernameRequestStatus {
            status: RequestStatus::Success,
            message: username.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combat::WeaponStats;
    use crate::game::physics::Motion;
    use serde_json::json;

    #[test]
    fn decodes_input_state_from_the_browser_client() {
        let frame = r#"ClientInputStateUpdate:{"movingUp":true,"movingDown":false,"movingLeft":false,"movingRight":true,"angle":1.5,"shooting":true,"username":"SwiftOtter1","authString":"abc"}"#;
        let ClientMsg::InputState(update) = decode_client_msg(frame).unwrap() else {
            panic!("expected input state");
        };
        assert!(update.moving_up && update.moving_right && update.shooting);
        assert!(!update.moving_down && !update.moving_left);
        assert_eq!(update.angle, 1.5);
        assert_eq!(update.auth_string, "abc");
    }

    #[test]
    fn decodes_username_change() {
        let frame = r#"UsernameChangeRequest:{"oldUsername":"a","newUsername":"b","authenticationString":"t"}"#;
        let ClientMsg::UsernameChange(req) = decode_client_msg(frame).unwrap() else {
            panic!("expected rename");
        };
        assert_eq!((req.old_username.as_str(), req.new_username.as_str()), ("a", "b"));
    }

    #[test]
    fn unknown_tag_is_rejected_not_dispatched() {
        let err = decode_client_msg(r#"AdminShutdown:{"now":true}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(tag) if tag == "AdminShutdown"));
    }

    #[test]
    fn missing_tag_and_bad_json_are_rejected() {
        assert!(matches!(decode_client_msg("hello"), Err(ProtocolError::MissingTag)));
        assert!(matches!(
            decode_client_msg("UsernameChangeRequest:{oops"),
            Err(ProtocolError::Malformed { tag: "UsernameChangeRequest", .. })
        ));
    }

    #[test]
    fn overflowing_angle_is_malformed() {
        let frame = r#"ClientInputStateUpdate:{"angle":1e300,"username":"a","authString":"t"}"#;
        assert!(matches!(
            decode_client_msg(frame),
            Err(ProtocolError::Malformed { tag: "ClientInputStateUpdate", .. })
        ));
    }

    #[test]
    fn bullet_records_carry_only_what_their_state_needs() {
        let mut projectile = Projectile::fire(7, &Motion::at(100.0, 100.0), 0.0, &WeaponStats::default());

        let fresh = serde_json::to_value(BulletInfo::for_state("ann", &projectile)).unwrap();
        assert_eq!(fresh["state"], 0);
        assert_eq!(fresh["owner"], "ann");
        assert!(fresh.get("velocityX").is_some());

        projectile.state = ProjectileState::Updated;
        let moved = serde_json::to_value(BulletInfo::for_state("ann", &projectile)).unwrap();
        assert_eq!(moved["state"], 1);
        assert!(moved.get("owner").is_none());
        assert!(moved.get("velocityX").is_none());
        assert!(moved.get("positionX").is_some());

        projectile.kill();
        let gone = serde_json::to_value(BulletInfo::for_state("ann", &projectile)).unwrap();
        assert_eq!(gone, json!({ "state": 2, "bulletId": 7 }));
    }

    #[test]
    fn encode_prefixes_the_type_tag() {
        let msg = ServerMsg::Points(PointsUpdate {
            username: "ann".to_string(),
            num_points: 105,
        });
        assert_eq!(
            msg.encode().unwrap(),
            r#"PointsUpdate:{"username":"ann","numPoints":105}"#
        );

        let updates = ServerMsg::PlayerUpdates(vec![]);
        assert_eq!(updates.encode().unwrap(), "ServerPlayerUpdate[]:[]");
    }

    #[test]
    fn username_status_uses_lowercase_words() {
        let encoded = ServerMsg::username_failed("Username already exists.")
            .encode()
            .unwrap();
        assert_eq!(
            encoded,
            r#"ServerUsernameRequestStatus:{"status":"failed","message":"Username already exists."}"#
        );
    }
}
