pub mod error;
pub mod memory_filter;
pub mod outbox_writer;
pub mod parse;
pub mod prompt;
pub mod resolver;
pub mod rewind;
pub mod stubs;
pub mod turn_context;

pub use memory_filter::filter_memory_hits_by_visibility;
pub use resolver::{ResolveTurnInput, ResolveTurnResult, TurnEngine};
pub use rewind::{rewind_to_external_message, rewind_to_turn, RewindResult};
pub use turn_context::TurnContext;
