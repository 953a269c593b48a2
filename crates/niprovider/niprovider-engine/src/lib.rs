//! Non-interactive provider engine: login/directory-push session (§4.9)
//! and the always-publishing worker (§4.8/§4.12 variant).

mod session;
mod worker;

pub use session::{NiSession, NiSessionState};
pub use worker::{NiStats, NiWorker, NiWorkerConfig};
