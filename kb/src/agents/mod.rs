//! Agent definitions loaded from disk

mod registry;

pub use registry::{AgentDefinition, AgentRecord, load_agents};
