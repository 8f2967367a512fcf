//! Event taxonomy published on the message bus.

use crate::model::{Referable, SubmodelElement};
use crate::reference::Reference;
use crate::value::ElementValue;

/// Discriminant of an [`EventMessage`], used for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Element was created
    ElementCreate,
    /// Element was read
    ElementRead,
    /// Element was updated
    ElementUpdate,
    /// Element was deleted
    ElementDelete,
    /// Element value changed
    ValueChange,
    /// Operation was invoked
    OperationInvoke,
    /// Operation finished
    OperationFinish,
}

/// A notification about a model change or operation lifecycle step.
#[derive(Debug, Clone, PartialEq)]
pub enum EventMessage {
    /// Element was created
    ElementCreate {
        /// Created element
        element: Reference,
        /// Snapshot after creation
        value: Referable,
    },
    /// Element was read
    ElementRead {
        /// Read element
        element: Reference,
        /// Snapshot returned to the client
        value: Referable,
    },
    /// Element was updated
    ElementUpdate {
        /// Updated element
        element: Reference,
        /// Snapshot after the update
        value: Referable,
    },
    /// Element was deleted
    ElementDelete {
        /// Deleted element
        element: Reference,
        /// Snapshot before deletion
        value: Referable,
    },
    /// Element value changed
    ValueChange {
        /// Changed element
        element: Reference,
        /// Value before the change
        old_value: Option<ElementValue>,
        /// Value after the change
        new_value: ElementValue,
    },
    /// Operation was invoked
    OperationInvoke {
        /// Invoked operation
        element: Reference,
        /// Input arguments
        input: Vec<SubmodelElement>,
        /// In-out arguments
        inoutput: Vec<SubmodelElement>,
    },
    /// Operation finished
    OperationFinish {
        /// Finished operation
        element: Reference,
        /// Output arguments, empty on failure
        output: Vec<SubmodelElement>,
        /// In-out arguments
        inoutput: Vec<SubmodelElement>,
    },
}

impl EventMessage {
    /// Kind of this message.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            EventMessage::ElementCreate { .. } => EventKind::ElementCreate,
            EventMessage::ElementRead { .. } => EventKind::ElementRead,
            EventMessage::ElementUpdate { .. } => EventKind::ElementUpdate,
            EventMessage::ElementDelete { .. } => EventKind::ElementDelete,
            EventMessage::ValueChange { .. } => EventKind::ValueChange,
            EventMessage::OperationInvoke { .. } => EventKind::OperationInvoke,
            EventMessage::OperationFinish { .. } => EventKind::OperationFinish,
        }
    }

    /// Reference the message is about.
    #[must_use]
    pub fn element(&self) -> &Reference {
        match self {
            EventMessage::ElementCreate { element, .. }
            | EventMessage::ElementRead { element, .. }
            | EventMessage::ElementUpdate { element, .. }
            | EventMessage::ElementDelete { element, .. }
            | EventMessage::ValueChange { element, .. }
            | EventMessage::OperationInvoke { element, .. }
            | EventMessage::OperationFinish { element, .. } => element,
        }
    }
}
