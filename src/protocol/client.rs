// ABOUTME: WebSocket transport for the Sendspin message channel
// ABOUTME: Splits inbound text/binary frames into typed message and media-frame streams

use std::sync::Arc;

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::Error;
use crate::protocol::messages::Message;

const BINARY_FRAME_HEADER_LEN: usize = 13;

/// Fixed-width header preceding every binary media frame (§6): 8-byte
/// big-endian presentation timestamp, 1-byte codec tag, 4-byte big-endian
/// payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFrameHeader {
    pub presentation_ts_server_us: i64,
    pub codec_tag: u8,
    pub payload_len: u32,
}

impl BinaryFrameHeader {
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(BINARY_FRAME_HEADER_LEN + payload.len());
        buf.extend_from_slice(&self.presentation_ts_server_us.to_be_bytes());
        buf.push(self.codec_tag);
        buf.extend_from_slice(&self.payload_len.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    /// Parses the header and returns it alongside the payload slice. Fails
    /// if the frame is shorter than the header or than `payload_len` declares.
    pub fn parse(frame: &[u8]) -> Result<(Self, &[u8]), Error> {
        if frame.len() < BINARY_FRAME_HEADER_LEN {
            return Err(Error::Protocol("binary frame shorter than header".to_string()));
        }

        let presentation_ts_server_us = i64::from_be_bytes(frame[0..8].try_into().unwrap());
        let codec_tag = frame[8];
        let payload_len = u32::from_be_bytes(frame[9..13].try_into().unwrap());

        let payload = &frame[BINARY_FRAME_HEADER_LEN..];
        if payload.len() < payload_len as usize {
            return Err(Error::Protocol("binary frame shorter than payload_len".to_string()));
        }

        Ok((
            Self {
                presentation_ts_server_us,
                codec_tag,
                payload_len,
            },
            &payload[..payload_len as usize],
        ))
    }
}

/// One inbound binary media frame, header plus owned payload bytes.
#[derive(Debug, Clone)]
pub struct MediaFrame {
    pub header: BinaryFrameHeader,
    pub payload: Arc<[u8]>,
}

impl MediaFrame {
    fn from_ws_bytes(frame: &[u8]) -> Result<Self, Error> {
        let (header, payload) = BinaryFrameHeader::parse(frame)?;
        Ok(Self {
            header,
            payload: Arc::from(payload),
        })
    }
}

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Sending half of an open channel; cheaply cloneable.
#[derive(Clone)]
pub struct ChannelSender {
    tx: Arc<tokio::sync::Mutex<WsWrite>>,
}

impl ChannelSender {
    pub async fn send(&self, msg: &Message) -> Result<(), Error> {
        let json = serde_json::to_string(msg).map_err(|e| Error::Protocol(e.to_string()))?;
        log::debug!("-> {json}");
        let mut tx = self.tx.lock().await;
        tx.send(WsMessage::Text(json))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    pub async fn close(&self) -> Result<(), Error> {
        let mut tx = self.tx.lock().await;
        tx.send(WsMessage::Close(None))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

/// One open bidirectional message channel to a Sendspin server.
///
/// `connect` only opens the socket; the hello/hello_ack exchange is the
/// session state machine's responsibility so that timeouts and rejection
/// handling live in one place (F, not this transport).
pub struct Channel {
    sender: ChannelSender,
    read: Option<WsRead>,
}

impl Channel {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let (write, read) = ws_stream.split();
        Ok(Self {
            sender: ChannelSender {
                tx: Arc::new(tokio::sync::Mutex::new(write)),
            },
            read: Some(read),
        })
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    /// Spawns the inbound reader task, routing text frames to `message_tx`
    /// and binary frames to `media_tx`. Returns once the socket closes or
    /// errors; callers observe that via the channels closing.
    pub fn spawn_reader(
        &mut self,
        message_tx: UnboundedSender<Message>,
        media_tx: UnboundedSender<MediaFrame>,
    ) {
        let read = self
            .read
            .take()
            .expect("spawn_reader called more than once");
        tokio::spawn(Self::reader_loop(read, message_tx, media_tx));
    }

    async fn reader_loop(
        mut read: WsRead,
        message_tx: UnboundedSender<Message>,
        media_tx: UnboundedSender<MediaFrame>,
    ) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<Message>(&text) {
                    Ok(msg) => {
                        if message_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("dropping unparseable control frame: {e}"),
                },
                Ok(WsMessage::Binary(data)) => match MediaFrame::from_ws_bytes(&data) {
                    Ok(media) => {
                        if media_tx.send(media).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("dropping malformed media frame: {e}"),
                },
                Ok(WsMessage::Close(_)) => {
                    log::info!("server closed the channel");
                    break;
                }
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {}
                Ok(_) => {}
                Err(e) => {
                    log::warn!("transport error: {e}");
                    break;
                }
            }
        }
    }
}

/// Convenience pair returned to the session state machine: an outbound
/// sender plus fresh unbounded receivers for inbound messages and media.
pub fn channel_queues() -> (
    UnboundedSender<Message>,
    UnboundedReceiver<Message>,
    UnboundedSender<MediaFrame>,
    UnboundedReceiver<MediaFrame>,
) {
    let (mtx, mrx) = unbounded_channel();
    let (atx, arx) = unbounded_channel();
    (mtx, mrx, atx, arx)
}
