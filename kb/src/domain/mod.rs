//! Core domain types

mod cancel;
mod id;
mod run;

pub use cancel::CancelToken;
pub use id::{RequestId, generate_id};
pub use run::{ModelTier, RunContext};
