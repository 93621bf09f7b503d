//! Multi-step workflows over a shared variable map.

mod condition;
mod definition;
mod execution;
mod interpreter;
mod library;
mod validate;
mod vars;

pub use condition::{Condition, Operator};
pub use definition::{OnError, Step, StepKind, WorkflowDefinition, AUTO_MODEL};
pub use execution::{save_result, StepResult, WorkflowExecution, WorkflowStatus};
pub use interpreter::{NoObserver, StepError, StepObserver, WorkflowRunner};
pub use library::WorkflowLibrary;
pub use validate::{validate, ValidationError};
pub use vars::{placeholders, substitute, substitute_with, Value, Variables};
