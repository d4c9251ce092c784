//! Tile pipeline and remote-rendering server (spec.md §4.7): accepts
//! one render client over a framed transport, receives view/light/
//! animation/bounds updates, slices framebuffers into tiles, encodes in
//! parallel, and streams tiles back with first/last markers.

pub mod config;
pub mod connection;
pub mod identify;
pub mod message;
pub mod pipeline;
pub mod worker;

pub use config::Config;
pub use connection::{Connection, ConnectionState, PendingResize};
pub use message::RemoteRender;
pub use pipeline::{dispatch_frame, FramePlan, ViewFrame};
pub use worker::{EncodeTask, WorkerPool};
