//! Encode Session - control layer over a native video encoder
//!
//! Sits between a per-frame rendering loop and an encoder backend:
//! - [`EncoderService`] manages any number of sessions by handle
//! - [`ExclusiveEncoder`] drives a single process-wide session
//!
//! Every session records the configuration it was created with, refuses
//! surfaces that no longer match it, keeps at most one encode outstanding
//! and latches the last error for the host to read back.
//!
//! Backends plug in through [`NativeBackend`]; [`SoftwareBackend`] encodes
//! H.264 with OpenH264.

mod config;
mod dispatch;
mod error;
mod exclusive;
mod handle;
mod latch;
mod native;
mod notify;
mod openh264_encoder;
mod packets;
mod service;
mod session;
mod stats;
mod table;
pub mod validator;

pub use config::*;
pub use dispatch::DispatchState;
pub use error::*;
pub use exclusive::*;
pub use handle::*;
pub use latch::*;
pub use native::*;
pub use notify::*;
pub use openh264_encoder::*;
pub use packets::*;
pub use service::*;
pub use stats::EncoderStats;
pub use table::*;

pub use surface::{PixelFormat, SurfaceRef};
