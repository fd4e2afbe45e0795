// ABOUTME: Wire protocol (§6): JSON control messages and binary media frames
// ABOUTME: This module owns transport plumbing only; dispatch lives in the session state machine

mod client;
mod messages;

pub use client::{channel_queues, BinaryFrameHeader, Channel, ChannelSender, MediaFrame};
pub use messages::{CommandAction, Message, MetadataPayload, ProgressPayload, StreamPayload};
