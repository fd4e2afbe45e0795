use sendspin::model::{PlaybackState, RepeatMode};
use sendspin::protocol::{CommandAction, Message, MetadataPayload, ProgressPayload, StreamPayload};

#[test]
fn hello_serializes_with_roles_array() {
    let message = Message::Hello {
        client_id: "android-player-1".to_string(),
        client_name: "Android Player".to_string(),
        roles: vec!["player".to_string()],
    };
    let json = serde_json::to_string(&message).unwrap();
    assert!(json.contains("\"type\":\"hello\""));
    assert!(json.contains("\"roles\":[\"player\"]"));
}

#[test]
fn hello_ack_deserializes_with_optional_stream() {
    let json = r#"{
        "type": "hello_ack",
        "group_name": "living-room",
        "supported_commands": ["play", "pause"],
        "stream": {
            "codec": "pcm",
            "sample_rate": 48000,
            "channels": 2,
            "bit_depth": 16,
            "playback_state": "playing",
            "group_name": "living-room"
        }
    }"#;

    let message: Message = serde_json::from_str(json).unwrap();
    match message {
        Message::HelloAck {
            group_name,
            supported_commands,
            stream,
        } => {
            assert_eq!(group_name, "living-room");
            assert_eq!(supported_commands, vec!["play", "pause"]);
            let stream = stream.expect("expected a stream descriptor");
            assert_eq!(stream.sample_rate, 48000);
            assert_eq!(stream.playback_state, PlaybackState::Playing);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn hello_ack_without_stream_field_defaults_to_none() {
    let json = r#"{"type":"hello_ack","group_name":"living-room"}"#;
    let message: Message = serde_json::from_str(json).unwrap();
    match message {
        Message::HelloAck { stream, supported_commands, .. } => {
            assert!(stream.is_none());
            assert!(supported_commands.is_empty());
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn metadata_round_trips_with_progress() {
    let payload = MetadataPayload {
        title: Some("Test Song".to_string()),
        artist: Some("Test Artist".to_string()),
        progress: Some(ProgressPayload {
            position_ms: 30_000,
            duration_ms: 180_000,
            speed_milli: 1000,
        }),
        repeat_mode: Some(RepeatMode::One),
        shuffle_enabled: true,
        server_ts_us: 5_000_000_000,
        ..Default::default()
    };
    let message = Message::Metadata(payload.clone());
    let json = serde_json::to_string(&message).unwrap();
    let back: Message = serde_json::from_str(&json).unwrap();
    match back {
        Message::Metadata(decoded) => assert_eq!(decoded, payload),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn controller_message_carries_volume_and_commands() {
    let json = r#"{
        "type": "controller",
        "volume": 75,
        "muted": false,
        "supported_commands": ["play", "pause", "volume", "mute"]
    }"#;
    let message: Message = serde_json::from_str(json).unwrap();
    match message {
        Message::Controller { volume, muted, supported_commands } => {
            assert_eq!(volume, 75);
            assert!(!muted);
            assert!(supported_commands.contains(&"volume".to_string()));
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn cmd_actions_use_snake_case_names() {
    for (action, expected) in [
        (CommandAction::Play, "play"),
        (CommandAction::Pause, "pause"),
        (CommandAction::Stop, "stop"),
        (CommandAction::Next, "next"),
        (CommandAction::Previous, "previous"),
    ] {
        let message = Message::Cmd { action };
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(&format!("\"action\":\"{expected}\"")));
    }
}

#[test]
fn stream_message_matches_table_field_names() {
    let json = r#"{
        "type": "stream",
        "codec": "pcm",
        "sample_rate": 44100,
        "channels": 2,
        "bit_depth": 24,
        "playback_state": "paused",
        "group_name": "kitchen"
    }"#;
    let message: Message = serde_json::from_str(json).unwrap();
    match message {
        Message::Stream(StreamPayload {
            codec,
            sample_rate,
            playback_state,
            ..
        }) => {
            assert_eq!(codec, "pcm");
            assert_eq!(sample_rate, 44100);
            assert_eq!(playback_state, PlaybackState::Paused);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn group_and_local_volume_messages_round_trip() {
    let group = Message::GroupVolume { volume_0_100: 42 };
    let local = Message::LocalVolume { volume_0_100: 42 };
    let group_json = serde_json::to_string(&group).unwrap();
    let local_json = serde_json::to_string(&local).unwrap();
    assert!(group_json.contains("\"type\":\"group_volume\""));
    assert!(local_json.contains("\"type\":\"local_volume\""));
}
