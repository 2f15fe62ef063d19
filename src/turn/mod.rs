pub mod context;
pub mod events;
pub mod orchestrator;

pub use context::{TurnContext, TurnState};
pub use events::{EventSink, PipelineStatus, ThinkingPhase, TurnEvent};
pub use orchestrator::{TurnOrchestrator, TurnOrchestratorBuilder};
