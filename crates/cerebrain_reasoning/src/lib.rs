pub mod api_types;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod skills;
pub mod state;
pub mod text_tool_parser;

pub use orchestrator::{TurnOrchestrator, TurnReport, TurnStatus};
pub use state::{BrainState, LiveState};
