// ABOUTME: Session state machine (component F): connection lifecycle, dispatch, and outbound commands
// ABOUTME: Owns the message channel, the jitter buffer, and drives the playout scheduler's tick

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Duration;

use crate::audio::output::AudioOutput;
use crate::audio::Codec;
use crate::config::{RuntimeConfig, RECONNECT_BACKOFF_SECS};
use crate::decoder::ChunkDecoder;
use crate::error::{Error, Result};
use crate::jitter::JitterBuffer;
use crate::model::{
    ConnectionState, ControllerState, Metadata, ServerInfo, StreamDescriptor, TrackProgress,
};
use crate::observable::ObservableStore;
use crate::protocol::{
    channel_queues, Channel, ChannelSender, CommandAction, Message, MetadataPayload,
};
use crate::recent_servers::RecentServersStore;
use crate::scheduler::PlayoutScheduler;
use crate::sync::probe::ProbeDriver;
use crate::sync::SharedTimeFilter;

/// Suppresses an outbound `local_volume` echo of a just-applied inbound
/// `player_volume` command when they match within this window (§9).
const VOLUME_ECHO_SUPPRESS_MS: i64 = 500;

struct ConnectionHandle {
    sender: ChannelSender,
    url: String,
}

/// The session state machine: connection lifecycle, inbound dispatch, and
/// outbound command flow (§4.6).
pub struct Session {
    config: RuntimeConfig,
    epoch: Instant,
    store: Arc<ObservableStore>,
    clock: Arc<SharedTimeFilter>,
    probe: Mutex<ProbeDriver>,
    buffer: Mutex<JitterBuffer>,
    scheduler: Mutex<PlayoutScheduler>,
    decoder: Mutex<Option<ChunkDecoder>>,
    sink: Mutex<Box<dyn AudioOutput>>,
    recent_servers: Arc<dyn RecentServersStore>,
    handle: Mutex<Option<ConnectionHandle>>,
    user_disconnected: AtomicBool,
    volume_echo_guard: Mutex<Option<(u8, i64)>>,
}

impl Session {
    pub fn new(
        config: RuntimeConfig,
        clock: Arc<SharedTimeFilter>,
        sink: Box<dyn AudioOutput>,
        recent_servers: Arc<dyn RecentServersStore>,
    ) -> Arc<Self> {
        let store = Arc::new(ObservableStore::new());
        let probe = ProbeDriver::new(
            clock.clone(),
            config.probe_interval_unconverged_ms,
            config.probe_interval_converged_ms,
            config.probe_timeout_ms,
        );
        let scheduler = PlayoutScheduler::new(clock.clone(), config.playout_offset_ms);
        let buffer = JitterBuffer::new(config.max_queued);

        let session = Arc::new(Self {
            epoch: Instant::now(),
            store,
            clock,
            probe: Mutex::new(probe),
            buffer: Mutex::new(buffer),
            scheduler: Mutex::new(scheduler),
            decoder: Mutex::new(None),
            sink: Mutex::new(sink),
            recent_servers,
            handle: Mutex::new(None),
            user_disconnected: AtomicBool::new(true),
            volume_echo_guard: Mutex::new(None),
            config,
        });

        session.clone().spawn_tick_loop();
        session
    }

    pub fn observable(&self) -> &ObservableStore {
        &self.store
    }

    pub fn now_local_us(&self) -> i64 {
        self.epoch.elapsed().as_micros() as i64
    }

    fn spawn_tick_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(self.config.tick_ms));
            loop {
                interval.tick().await;
                let now = self.now_local_us();
                {
                    let mut probe = self.probe.lock().expect("probe mutex poisoned");
                    probe.expire_stale(now);
                    if probe.is_due(now) {
                        let t0 = probe.issue(now);
                        if let Some(handle) = self.handle.lock().expect("handle mutex poisoned").as_ref() {
                            let sender = handle.sender.clone();
                            tokio::spawn(async move {
                                let _ = sender.send(&Message::TimeProbe { t0_us: t0 }).await;
                            });
                        }
                    }
                }
                let mut buffer = self.buffer.lock().expect("buffer mutex poisoned");
                let mut scheduler = self.scheduler.lock().expect("scheduler mutex poisoned");
                let mut sink = self.sink.lock().expect("sink mutex poisoned");
                scheduler.tick(&mut buffer, sink.as_mut(), now);
                let stats = scheduler.stats(&buffer, now);
                drop(buffer);
                drop(scheduler);
                drop(sink);
                self.store.buffer_stats.set(stats);
            }
        });
    }

    /// Opens a channel to `url` and performs the hello handshake (§4.6).
    /// Transitions DISCONNECTED → CONNECTING → CONNECTED, or → ERROR on
    /// failure, scheduling a backoff reconnect unless the caller had
    /// requested disconnection.
    pub async fn connect(self: &Arc<Self>, url: &str) -> Result<()> {
        self.connect_inner(url, 0).await
    }

    async fn connect_inner(self: &Arc<Self>, url: &str, attempt: usize) -> Result<()> {
        self.user_disconnected.store(false, Ordering::SeqCst);
        self.store.connection.set(ConnectionState::Connecting);

        let result = self.open_and_handshake(url).await;
        match result {
            Ok(()) => {
                self.store.connection.set(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                self.store.connection.set(ConnectionState::Error);
                self.store.connection.set(ConnectionState::Disconnected);
                if !self.user_disconnected.load(Ordering::SeqCst) {
                    self.schedule_reconnect(url.to_string(), attempt);
                }
                Err(e)
            }
        }
    }

    async fn open_and_handshake(self: &Arc<Self>, url: &str) -> Result<()> {
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);

        let mut channel = tokio::time::timeout(timeout, Channel::connect(url))
            .await
            .map_err(|_| Error::Transport("timed out opening channel".to_string()))??;
        let sender = channel.sender();

        sender
            .send(&Message::Hello {
                client_id: self.config.client_id.clone(),
                client_name: self.config.client_name.clone(),
                roles: vec!["player".to_string()],
            })
            .await?;

        let (message_tx, mut message_rx, media_tx, media_rx) = channel_queues();
        channel.spawn_reader(message_tx, media_tx);

        let hello_ack = tokio::time::timeout(timeout, message_rx.recv())
            .await
            .map_err(|_| Error::Transport("timed out waiting for hello_ack".to_string()))?;

        match hello_ack {
            Some(Message::HelloAck {
                group_name,
                supported_commands,
                stream,
            }) => {
                if let Some(stream) = stream {
                    self.apply_stream(StreamDescriptor {
                        codec: stream.codec,
                        sample_rate_hz: stream.sample_rate,
                        channels: stream.channels,
                        bit_depth: stream.bit_depth,
                        playback_state: stream.playback_state,
                        group_name: stream.group_name,
                    });
                }
                self.store.controller.set(ControllerState {
                    volume_0_100: 0,
                    muted: false,
                    supported_commands,
                });
                let _ = group_name;
            }
            Some(_) => return Err(Error::Protocol("expected hello_ack".to_string())),
            None => return Err(Error::Transport("channel closed before hello_ack".to_string())),
        }

        *self.handle.lock().expect("handle mutex poisoned") = Some(ConnectionHandle {
            sender,
            url: url.to_string(),
        });

        self.recent_servers.add(ServerInfo {
            name: url.to_string(),
            address: url.to_string(),
            path: String::new(),
        });

        self.clone().spawn_dispatch_loop(message_rx, media_rx);
        Ok(())
    }

    fn apply_stream(&self, descriptor: StreamDescriptor) {
        let codec = Codec::from_name(&descriptor.codec);
        *self.decoder.lock().expect("decoder mutex poisoned") = Some(ChunkDecoder::new(
            codec_decoder(codec, descriptor.bit_depth),
            &descriptor,
        ));
        self.store.stream.set(descriptor);
    }

    fn spawn_dispatch_loop(
        self: Arc<Self>,
        mut message_rx: UnboundedReceiver<Message>,
        mut media_rx: UnboundedReceiver<crate::protocol::MediaFrame>,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = message_rx.recv() => {
                        match msg {
                            Some(msg) => self.handle_message(msg),
                            None => break,
                        }
                    }
                    frame = media_rx.recv() => {
                        match frame {
                            Some(frame) => self.handle_media_frame(frame),
                            None => break,
                        }
                    }
                }
            }

            let was_user_disconnect = self.user_disconnected.load(Ordering::SeqCst);
            let url = self.handle.lock().expect("handle mutex poisoned").take().map(|h| h.url);
            if !was_user_disconnect {
                self.store.connection.set(ConnectionState::Error);
                if let Some(url) = url {
                    self.schedule_reconnect(url, 0);
                }
            }
        });
    }

    fn handle_message(&self, msg: Message) {
        match msg {
            Message::TimeProbeResponse { t0_us, s1_us, s2_us } => {
                self.probe
                    .lock()
                    .expect("probe mutex poisoned")
                    .on_response(t0_us, s1_us, s2_us, self.now_local_us());
            }
            Message::Stream(stream) => self.apply_stream(StreamDescriptor {
                codec: stream.codec,
                sample_rate_hz: stream.sample_rate,
                channels: stream.channels,
                bit_depth: stream.bit_depth,
                playback_state: stream.playback_state,
                group_name: stream.group_name,
            }),
            Message::Metadata(payload) => self.apply_metadata(payload),
            Message::Controller {
                volume,
                muted,
                supported_commands,
            } => self.store.controller.set(ControllerState {
                volume_0_100: volume,
                muted,
                supported_commands,
            }),
            Message::PlayerVolume { volume_0_100 } => {
                let now = self.now_local_us();
                *self.volume_echo_guard.lock().expect("guard mutex poisoned") =
                    Some((volume_0_100, now));
                self.sink
                    .lock()
                    .expect("sink mutex poisoned")
                    .platform_volume_set(volume_0_100);
            }
            Message::PlayerMute { muted: _ } => {
                // Platform mute has no dedicated adapter hook beyond volume;
                // surfaced to observers via ControllerState on the next update.
            }
            Message::Hello { .. }
            | Message::HelloAck { .. }
            | Message::TimeProbe { .. }
            | Message::Cmd { .. }
            | Message::GroupVolume { .. }
            | Message::GroupMute { .. }
            | Message::LocalVolume { .. } => {
                log::debug!("ignoring client-originated message type received from server");
            }
        }
    }

    fn apply_metadata(&self, payload: MetadataPayload) {
        let metadata = Metadata {
            title: payload.title,
            artist: payload.artist,
            album: payload.album,
            album_artist: payload.album_artist,
            year: payload.year,
            track_number: payload.track_number,
            artwork_url: payload.artwork_url,
            artwork_bytes: None,
            progress: payload.progress.map(|p| TrackProgress {
                position_ms: p.position_ms,
                duration_ms: p.duration_ms,
                speed_milli: p.speed_milli,
            }),
            repeat_mode: payload.repeat_mode,
            shuffle_enabled: payload.shuffle_enabled,
            timestamp_server_us: payload.server_ts_us,
        };
        self.store.metadata.set(metadata);
    }

    fn handle_media_frame(&self, frame: crate::protocol::MediaFrame) {
        let decoder = self.decoder.lock().expect("decoder mutex poisoned");
        let Some(decoder) = decoder.as_ref() else {
            log::warn!("dropping media frame: no active stream descriptor yet");
            return;
        };

        match decoder.decode_frame(&frame.header, &frame.payload) {
            Ok(decoded) => {
                let Some(server_now) = self.clock.client_to_server(self.now_local_us()) else {
                    return;
                };
                self.buffer.lock().expect("buffer mutex poisoned").insert(
                    decoded,
                    server_now,
                    self.config.playout_offset_ms,
                );
            }
            Err(e) => log::warn!("dropping media frame: {e}"),
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, url: String, attempt: usize) {
        let session = self.clone();
        let delay_secs = RECONNECT_BACKOFF_SECS[attempt.min(RECONNECT_BACKOFF_SECS.len() - 1)];
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            if session.user_disconnected.load(Ordering::SeqCst) {
                return;
            }
            let next_attempt = (attempt + 1).min(RECONNECT_BACKOFF_SECS.len() - 1);
            let _ = session.connect_inner(&url, next_attempt).await;
        });
    }

    /// Cancels the inbound reader and any reconnection timer, closes the
    /// channel politely if connected, and resets all observable state (§4.6).
    pub async fn disconnect(&self) {
        self.user_disconnected.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().expect("handle mutex poisoned").take() {
            let _ = handle.sender.close().await;
        }
        *self.decoder.lock().expect("decoder mutex poisoned") = None;
        self.buffer.lock().expect("buffer mutex poisoned").clear();
        self.store.reset();
    }

    async fn send_command(&self, msg: Message) -> Result<()> {
        let sender = {
            let handle = self.handle.lock().expect("handle mutex poisoned");
            handle.as_ref().map(|h| h.sender.clone())
        };
        match sender {
            Some(sender) => sender.send(&msg).await,
            None => Err(Error::Transport("not connected".to_string())),
        }
    }

    pub async fn play(&self) -> Result<()> {
        self.send_command(Message::Cmd { action: CommandAction::Play }).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send_command(Message::Cmd { action: CommandAction::Pause }).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send_command(Message::Cmd { action: CommandAction::Stop }).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send_command(Message::Cmd { action: CommandAction::Next }).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send_command(Message::Cmd { action: CommandAction::Previous }).await
    }

    pub async fn set_group_volume(&self, volume_0_100: u8) -> Result<()> {
        self.send_command(Message::GroupVolume { volume_0_100 }).await
    }

    pub async fn set_group_mute(&self, muted: bool) -> Result<()> {
        self.send_command(Message::GroupMute { muted }).await
    }

    /// Reports local volume back to the server, unless it merely echoes a
    /// `player_volume` received within the last 500ms (§9).
    pub async fn set_local_volume(&self, volume_0_100: u8) -> Result<()> {
        let now = self.now_local_us();
        let mut guard = self.volume_echo_guard.lock().expect("guard mutex poisoned");
        if let Some((last_volume, last_local_us)) = *guard {
            if last_volume == volume_0_100 && (now - last_local_us) <= VOLUME_ECHO_SUPPRESS_MS * 1000 {
                *guard = None;
                return Ok(());
            }
        }
        drop(guard);
        self.send_command(Message::LocalVolume { volume_0_100 }).await
    }

    pub async fn set_local_mute(&self, _muted: bool) -> Result<()> {
        // No dedicated wire message for local mute in §6; muting is a
        // platform concern applied directly to the sink by the caller.
        Ok(())
    }
}

fn codec_decoder(codec: Codec, bit_depth: u8) -> Box<dyn crate::audio::Decoder> {
    match codec {
        Codec::Pcm => Box::new(crate::audio::decode::PcmDecoder::new(bit_depth)),
        Codec::Unknown(_) => Box::new(crate::audio::decode::UnsupportedDecoder {
            codec_name: "unknown",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::NullOutput;
    use crate::model::ConnectionState;
    use crate::recent_servers::InMemoryRecentServers;
    use crate::sync::filter::FilterParams;

    fn test_session() -> Arc<Session> {
        let clock = Arc::new(SharedTimeFilter::new(FilterParams::default()));
        Session::new(
            RuntimeConfig::default(),
            clock,
            Box::new(NullOutput::default()),
            Arc::new(InMemoryRecentServers::new()),
        )
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let session = test_session();
        assert_eq!(session.observable().connection.get(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn commands_fail_without_a_connection() {
        let session = test_session();
        assert!(session.play().await.is_err());
    }

    #[tokio::test]
    async fn disconnect_resets_observable_state() {
        let session = test_session();
        session.observable().controller.set(ControllerState {
            volume_0_100: 50,
            muted: false,
            supported_commands: vec!["play".to_string()],
        });
        session.disconnect().await;
        assert_eq!(session.observable().controller.get(), ControllerState::default());
        assert_eq!(session.observable().connection.get(), ConnectionState::Disconnected);
    }
}
