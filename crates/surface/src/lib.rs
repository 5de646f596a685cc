//! Render Surfaces - frame references handed to the encoder
//!
//! The host rendering loop owns its surfaces. The encoder only ever sees a
//! [`SurfaceRef`]: a copyable native handle plus the dimensions the surface
//! had when the reference was taken.
//!
//! Software backends that need pixels resolve references through a
//! [`SurfaceStore`].

mod error;
mod frame;
mod store;

pub use error::*;
pub use frame::*;
pub use store::*;
