//! Error types for bean registration, resolution and wiring
//!
//! Every failure is fatal to the operation that raised it: an error escaping
//! the autowire pass aborts the whole pass, an error escaping an on-demand
//! lookup aborts that lookup. Nothing is retried internally.
//!
//! Errors raised inside a wiring session are wrapped in
//! [`ContextError::Wiring`] together with the wiring path at the point of
//! failure. Use [`ContextError::root_cause`] to match on the underlying kind:
//!
//! ```ignore
//! match ctx.auto_wire_beans() {
//!     Err(e) if matches!(e.root_cause(), ContextError::CircularDependency { .. }) => { /* ... */ }
//!     Err(e) => eprintln!("{}", e),
//!     Ok(()) => {}
//! }
//! ```

use thiserror::Error;

/// Boxed error returned by constructor, method and lifecycle callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used across the crate
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors that can occur while registering, resolving or wiring beans
#[derive(Debug, Error)]
pub enum ContextError {
    /// A bean with the same type and name is already registered
    #[error("duplicate registration, bean: \"{bean_id}\" {caller}")]
    DuplicateBean { bean_id: String, caller: String },

    /// Registration attempted after the autowire pass started
    #[error("bean registration has been frozen, bean: \"{bean_id}\"")]
    RegistrationFrozen { bean_id: String },

    /// `auto_wire_beans` called a second time
    #[error("auto_wire_beans() has already been called")]
    AlreadyWired,

    /// Lookup attempted before the autowire pass
    #[error("{operation}() must be called after auto_wire_beans()")]
    NotYetWired { operation: &'static str },

    /// A non-nullable selector matched no bean
    #[error("can't find bean, bean: \"{selector}\" field: {field} type: {bean_type}")]
    BeanNotFound {
        selector: String,
        field: String,
        bean_type: String,
    },

    /// A selector matched several beans and none is primary
    #[error(
        "found {} beans, bean: \"{selector}\" field: {field} type: {bean_type} [{}]",
        .candidates.len(),
        .candidates.join(", ")
    )]
    AmbiguousBean {
        selector: String,
        field: String,
        bean_type: String,
        candidates: Vec<String>,
    },

    /// A selector matched several primary beans
    #[error(
        "found {} primary beans, bean: \"{selector}\" field: {field} type: {bean_type} [{}]",
        .candidates.len(),
        .candidates.join(", ")
    )]
    AmbiguousPrimary {
        selector: String,
        field: String,
        bean_type: String,
        candidates: Vec<String>,
    },

    /// A constructor or method bean was re-entered while being wired
    #[error("found circular autowire, bean: \"{bean_id}\"\n{path}")]
    CircularDependency { bean_id: String, path: String },

    /// A constructor or method bean returned an error
    #[error("function bean: {bean} returned error: {source}")]
    Constructor {
        bean: String,
        #[source]
        source: BoxError,
    },

    /// A constructor or method bean returned no value
    #[error("function bean: {bean} returned nil")]
    NilBean { bean: String },

    /// An init or destroy callback returned an error
    #[error("lifecycle callback of {bean} failed: {source}")]
    Lifecycle {
        bean: String,
        #[source]
        source: BoxError,
    },

    /// The injection target cannot receive the resolved value
    #[error("invalid injection target {target}: {message}")]
    InvalidTarget { target: String, message: String },

    /// A declared export type has no implementation for the bean's type
    #[error("{bean} does not implement {export}")]
    ExportMismatch { bean: String, export: String },

    /// A bean in a terminal state was asked to do work
    #[error("bean: \"{bean_id}\" {message}")]
    InvalidState { bean_id: String, message: String },

    /// A property could not be bound to a field
    #[error("can't bind property for field {field}: {message}")]
    Bind { field: String, message: String },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// An error raised during wiring, with the wiring path at failure
    #[error("{source}\nwiring path:\n{path}")]
    Wiring {
        #[source]
        source: Box<ContextError>,
        path: String,
    },
}

impl ContextError {
    /// The underlying error, looking through [`ContextError::Wiring`]
    pub fn root_cause(&self) -> &ContextError {
        match self {
            ContextError::Wiring { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The wiring path captured at failure, if any
    pub fn wiring_path(&self) -> Option<&str> {
        match self {
            ContextError::Wiring { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Attach a wiring path. Empty paths and already-wrapped errors are kept as is.
    pub(crate) fn with_path(self, path: String) -> Self {
        if path.is_empty() || matches!(self, ContextError::Wiring { .. }) {
            return self;
        }
        ContextError::Wiring {
            source: Box::new(self),
            path,
        }
    }

    /// Recover a `ContextError` smuggled through a factory's boxed error,
    /// otherwise report the failure as a constructor error.
    pub(crate) fn from_factory(bean: String, error: BoxError) -> Self {
        match error.downcast::<ContextError>() {
            Ok(context_error) => *context_error,
            Err(source) => ContextError::Constructor { bean, source },
        }
    }
}
