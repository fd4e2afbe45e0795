// ABOUTME: Wire message types for the text JSON control channel (§6)
// ABOUTME: One `type`-tagged enum covers both inbound and outbound frames

use serde::{Deserialize, Serialize};

use crate::model::{PlaybackState, RepeatMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Hello {
        client_id: String,
        client_name: String,
        roles: Vec<String>,
    },
    HelloAck {
        group_name: String,
        #[serde(default)]
        supported_commands: Vec<String>,
        #[serde(default)]
        stream: Option<StreamPayload>,
    },
    TimeProbe {
        t0_us: i64,
    },
    TimeProbeResponse {
        t0_us: i64,
        s1_us: i64,
        s2_us: i64,
    },
    Stream(StreamPayload),
    Metadata(MetadataPayload),
    Controller {
        volume: u8,
        muted: bool,
        #[serde(default)]
        supported_commands: Vec<String>,
    },
    PlayerVolume {
        volume_0_100: u8,
    },
    PlayerMute {
        muted: bool,
    },
    Cmd {
        action: CommandAction,
    },
    GroupVolume {
        volume_0_100: u8,
    },
    GroupMute {
        muted: bool,
    },
    LocalVolume {
        volume_0_100: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPayload {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub playback_state: PlaybackState,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub position_ms: i64,
    pub duration_ms: i64,
    pub speed_milli: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<String>,
    pub artwork_url: Option<String>,
    pub progress: Option<ProgressPayload>,
    #[serde(default)]
    pub repeat_mode: Option<RepeatMode>,
    #[serde(default)]
    pub shuffle_enabled: bool,
    pub server_ts_us: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips_with_type_tag() {
        let msg = Message::Hello {
            client_id: "android-player-1".to_string(),
            client_name: "Android Player".to_string(),
            roles: vec!["player".to_string()],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"hello\""));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Message::Hello { .. }));
    }

    #[test]
    fn time_probe_response_decodes() {
        let json = r#"{"type":"time_probe_response","t0_us":0,"s1_us":10100,"s2_us":10150}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        match msg {
            Message::TimeProbeResponse { t0_us, s1_us, s2_us } => {
                assert_eq!((t0_us, s1_us, s2_us), (0, 10100, 10150));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn cmd_action_is_snake_case() {
        let msg = Message::Cmd {
            action: CommandAction::Next,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"action\":\"next\""));
    }

    #[test]
    fn stream_message_is_untagged_flat_payload() {
        let json = r#"{"type":"stream","codec":"pcm","sample_rate":48000,"channels":2,"bit_depth":16,"playback_state":"playing","group_name":"living-room"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, Message::Stream(_)));
    }
}
