//! Asynchronous operation bookkeeping.
//!
//! # State Machine
//!
//! ```text
//! Running ──complete──▶ Completed
//!    │
//!    └─────fail───────▶ Failed
//! ```
//!
//! Terminal states are final: [`OperationResult::complete`] and
//! [`OperationResult::fail`] refuse to leave them.

use crate::model::SubmodelElement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one asynchronous invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHandle {
    /// Id of the API request that started the invocation
    pub request_id: String,
    /// Unique token used to poll the result
    pub handle_id: String,
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handle_id)
    }
}

/// Execution state of an asynchronous invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionState {
    /// Still executing on the asset
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl ExecutionState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Running)
    }
}

/// Pollable state and arguments of an asynchronous invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Id of the originating request
    pub request_id: String,
    /// Current state
    pub execution_state: ExecutionState,
    /// Failure detail, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// In-out arguments
    #[serde(default)]
    pub inoutput_arguments: Vec<SubmodelElement>,
    /// Output arguments
    #[serde(default)]
    pub output_arguments: Vec<SubmodelElement>,
}

impl OperationResult {
    /// A freshly started invocation.
    #[must_use]
    pub fn running(request_id: impl Into<String>, inoutput: Vec<SubmodelElement>) -> Self {
        Self {
            request_id: request_id.into(),
            execution_state: ExecutionState::Running,
            message: None,
            inoutput_arguments: inoutput,
            output_arguments: Vec::new(),
        }
    }

    /// Transition to [`ExecutionState::Completed`].
    ///
    /// # Errors
    ///
    /// Returns [`OperationStateError::AlreadyTerminal`] if already finished.
    pub fn complete(
        &mut self,
        output: Vec<SubmodelElement>,
        inoutput: Vec<SubmodelElement>,
    ) -> Result<(), OperationStateError> {
        self.ensure_running()?;
        self.execution_state = ExecutionState::Completed;
        self.output_arguments = output;
        self.inoutput_arguments = inoutput;
        Ok(())
    }

    /// Transition to [`ExecutionState::Failed`], keeping the in-out arguments.
    ///
    /// # Errors
    ///
    /// Returns [`OperationStateError::AlreadyTerminal`] if already finished.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), OperationStateError> {
        self.ensure_running()?;
        self.execution_state = ExecutionState::Failed;
        self.message = Some(message.into());
        self.output_arguments.clear();
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), OperationStateError> {
        if self.execution_state.is_terminal() {
            return Err(OperationStateError::AlreadyTerminal(self.execution_state));
        }
        Ok(())
    }
}

/// Errors that can occur transitioning an operation result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationStateError {
    /// The result already reached a terminal state
    #[error("operation already finished: {0:?}")]
    AlreadyTerminal(ExecutionState),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;

    #[test]
    fn running_to_completed() {
        let mut result = OperationResult::running("req-1", vec![]);
        let output = vec![SubmodelElement::property("x_sqrt", TypedValue::Double(3.0))];
        result.complete(output.clone(), vec![]).unwrap();
        assert_eq!(result.execution_state, ExecutionState::Completed);
        assert_eq!(result.output_arguments, output);
    }

    #[test]
    fn failure_keeps_inoutput() {
        let inoutput = vec![SubmodelElement::property("counter", TypedValue::Integer(1))];
        let mut result = OperationResult::running("req-1", inoutput.clone());
        result.fail("connection refused").unwrap();
        assert_eq!(result.execution_state, ExecutionState::Failed);
        assert_eq!(result.inoutput_arguments, inoutput);
        assert!(result.output_arguments.is_empty());
        assert_eq!(result.message.as_deref(), Some("connection refused"));
    }

    #[test]
    fn terminal_states_are_final() {
        let mut result = OperationResult::running("req-1", vec![]);
        result.fail("boom").unwrap();
        let snapshot = result.clone();

        assert_eq!(
            result.complete(vec![], vec![]),
            Err(OperationStateError::AlreadyTerminal(ExecutionState::Failed))
        );
        assert!(result.fail("again").is_err());
        assert_eq!(result, snapshot);
    }
}
