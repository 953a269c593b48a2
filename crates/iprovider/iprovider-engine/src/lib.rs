//! Interactive-provider engine: inverted session state machine (§4.9
//! provider variant) and per-connection provider worker (§4.12).

mod refresh_list;
mod session;
mod worker;

pub use refresh_list::{ItemInfo, RefreshItemsList};
pub use session::{ProviderSession, ProviderSessionState};
pub use worker::{ProviderStats, ProviderWorker, ProviderWorkerConfig};
