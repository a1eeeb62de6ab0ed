//! Engine errors
//!
//! Every error here is a usage error raised at class-definition or
//! construction time. None of them are retryable.

use thiserror::Error;

/// Errors raised by the metaclass engine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetaError {
    /// The mixin is not a member of the target's hierarchy, or mixing it would
    /// create a cycle
    #[error("Invalid mixin {mixin} for {target}: {reason}")]
    InvalidMixin {
        /// Name of the class being mixed in
        mixin: String,
        /// Name of the class receiving the mixin
        target: String,
        /// Why the mixin was rejected
        reason: String,
    },

    /// Structural mutation attempted after the class was completed
    #[error("Too late to {action} class {class}: the class is already complete")]
    TooLate {
        /// Name of the completed class
        class: String,
        /// What was attempted (e.g. "apply a mixin to")
        action: String,
    },

    /// A class option has no matching processor or applier
    #[error("Invalid class option for {class}: {option}")]
    UnknownOption {
        /// Name of the class being defined
        class: String,
        /// The unrecognized option key
        option: String,
    },

    /// Processor dependencies form a cycle
    #[error("Circular processor dependencies: {}", .path.join(" --> "))]
    CircularDependency {
        /// Dependency path, ending with the processor that closes the cycle
        path: Vec<String>,
    },

    /// An operation needs resolved members but the class is not complete
    #[error("Class is incomplete: {class}")]
    IncompleteClass {
        /// Name of the incomplete class
        class: String,
    },

    /// A `before` or `after` dependency names a processor that does not exist
    #[error("No processor matches \"{relation}\" {target} on {processor}")]
    UnknownProcessor {
        /// The processor declaring the dependency
        processor: String,
        /// "before" or "after"
        relation: String,
        /// The missing processor name
        target: String,
    },

    /// A method (or super method) does not exist on the receiver
    #[error("No method {method} on {receiver}")]
    NoSuchMethod {
        /// Receiver description (class name or instance of class)
        receiver: String,
        /// Method name
        method: String,
    },

    /// A value has the wrong shape for the operation
    #[error("Type error: {0}")]
    TypeError(String),
}

impl MetaError {
    pub(crate) fn too_late(class: &str, action: &str) -> Self {
        MetaError::TooLate {
            class: class.to_string(),
            action: action.to_string(),
        }
    }

    pub(crate) fn invalid_mixin(mixin: &str, target: &str, reason: impl Into<String>) -> Self {
        MetaError::InvalidMixin {
            mixin: mixin.to_string(),
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}

/// Engine result type
pub type MetaResult<T> = Result<T, MetaError>;
