pub mod api;
pub mod client;
pub mod types;

pub use api::AgentGateway;
pub use client::{HttpAgentGateway, INTERNAL_API_KEY_HEADER};
pub use types::{AnalysisRequest, ConsolidatedInput};
