//! Consumer engine: session state machine (C11), rate-shaped scheduler
//! (C10), per-connection worker (C12), and the warmup/steady-state
//! controller (C14).

mod protocol;
mod scheduler;
mod session;
mod stats;
mod worker;

pub use protocol::{InboundEvent, OutboundRequest};
pub use scheduler::{Scheduler, TickPlan};
pub use session::{Session, SessionState};
pub use stats::{ThreadStats, WarmupController};
pub use worker::{Worker, WorkerConfig};
