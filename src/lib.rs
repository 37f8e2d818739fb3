pub mod compute;
pub mod discovery;
pub mod error;
pub mod frame;
pub mod relay;
pub mod retry;
pub mod tuple;

// Re-export key types at crate root for convenience.
pub use error::{Error, FrameError, ProtocolError, Result};
pub use frame::{Frame, FrameReader};
pub use relay::{run_relay, RelayConfig, RelayConfigBuilder};
pub use retry::RetryPolicy;
pub use tuple::buffer::TupleBuffer;
