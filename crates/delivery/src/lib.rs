//! Outbound Delivery - sharing quotes over email, WhatsApp, and links
//!
//! This crate turns a send request into channel-ready content and pushes it
//! through a pluggable provider transport:
//! - **Message Preparation** (`message`) - recipient, template, and variable resolution
//! - **Transports** (`transport`) - HTTP provider gateway plus noop and recording doubles
//! - **Dispatch** (`dispatcher`) - bounded retry loop around a transport
//!
//! # Channels
//!
//! - `email` - needs a recipient address (explicit or the client's) and a subject
//! - `whatsapp` - needs a phone number; subjects are dropped
//! - `link` - resolves to the public view URL, nothing leaves the process
//!
//! # Key Types
//!
//! - `SendRequest` - caller input, everything optional except the channel
//! - `PreparedSend` - an interpolated outbound message, or a bare share URL
//! - `ChannelTransport` - seam between dispatch and the wire
//! - `Dispatcher` - retries transient faults, never retries provider rejections

pub mod dispatcher;
pub mod message;
pub mod transport;
