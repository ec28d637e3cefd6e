pub mod engine;
pub mod orchestrator;
pub mod transport;

pub use engine::DiffEngine;
pub use orchestrator::{PushOrchestrator, PushResult};
pub use transport::{MockTransport, Transport};
