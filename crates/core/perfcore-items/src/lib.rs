//! Item templates (C5), per-item request lifecycle (C6), and the shared
//! per-tick burst-size helper used by every scheduler (§4.8).

mod burst_plan;
mod item_registry;
mod template_pool;

pub use burst_plan::BurstPlan;
pub use item_registry::{ItemRecord, ItemRegistry, ItemRegistryError, ItemState};
pub use template_pool::{MarketByOrderMeta, Template, TemplateIterator, TemplatePool};
