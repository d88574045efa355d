//! Instance startup: capability checks and the asynchronous handshake that
//! resolves to a [`RuntimeHandle`](crate::RuntimeHandle).
//!
//! The flow mirrors a classic ensure chain:
//! - capabilities are checked first and fail fast,
//! - the loading pipeline is started with a startup error handler armed,
//! - the first post-run signal resolves startup and disarms the handler.

mod capability;
mod coordinator;

pub use capability::{check_capabilities, GraphicsApi, SystemInfo};
pub use coordinator::{create_instance, AssetPipeline, Environment, InstanceOptions};
