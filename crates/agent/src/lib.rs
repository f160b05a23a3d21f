//! The ReAct engine — the heart of Reagent.
//!
//! The agent follows a **Thought → Action → Observation** cycle:
//!
//! 1. **Think**: ask the model what to do next, given the question, the
//!    tool catalog and the scratchpad so far
//! 2. **Act**: parse the response into an action, either a tool call or a
//!    final answer
//! 3. **Observe**: run the tool and record what came back
//!
//! The loop continues until the model gives a final answer, the iteration
//! or time limit is hit, or tools keep failing.

pub mod action_builder;
pub mod executor;
pub mod monitor;
pub mod observation;
pub mod parser;
pub mod prompt;
pub mod react;
pub mod retry;
pub mod thought;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use action_builder::{ActionBuilder, format_action_for_llm, is_valid_action, parse_action_input};
pub use executor::ActionExecutor;
pub use monitor::{ExecutionMonitor, TimelineEntry, timeline};
pub use observation::{ObservationFormatter, ObservationProcessor};
pub use parser::{LabelSet, OutputParser, ParsedOutput};
pub use prompt::{Language, PromptTemplate};
pub use react::ReactAgent;
pub use retry::RetryPolicy;
pub use thought::ThoughtGenerator;
