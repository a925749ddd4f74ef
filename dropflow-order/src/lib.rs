pub mod lease;
pub mod models;
pub mod orchestrator;
pub mod store;

pub use models::{FulfillmentOrder, FulfillmentRequest, OrderState};
pub use orchestrator::{OrderOrchestrator, OrchestratorConfig};
pub use store::OrderStore;
