use audex_core_types::RequestId;
use thiserror::Error;

/// Result type alias using AuditError
pub type Result<T> = std::result::Result<T, AuditError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing, and log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural/Validation
    InvalidInput,
    NotFound,
    NotSaved,
    InvalidSchema,
    UnknownActionKind,
    ConstraintViolation,

    // Integration/IO
    Io,
    Config,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::NotSaved => "ERR_NOT_SAVED",
            ExErrorKind::InvalidSchema => "ERR_INVALID_SCHEMA",
            ExErrorKind::UnknownActionKind => "ERR_UNKNOWN_ACTION_KIND",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification fields for programmatic handling plus context for debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity context, usually `type:id`
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for audit operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    /// Entity type is not registered in the schema
    #[error("Unknown entity type: {entity_type}")]
    UnknownEntityType { entity_type: String },

    /// Field is not declared on the entity type
    #[error("Unknown field {field} on entity type {entity_type}")]
    UnknownField { entity_type: String, field: String },

    /// Relationship operation on a field that is not many-to-many
    #[error("Field {field} on entity type {entity_type} is not a many-to-many relation")]
    NotManyToMany { entity_type: String, field: String },

    /// Persisted row for an entity could not be found
    #[error("Entity not found: {entity_type}:{entity_id}")]
    EntityNotFound { entity_type: String, entity_id: i64 },

    /// Operation needs a persisted entity but it has no id yet
    #[error("Entity of type {entity_type} has not been saved")]
    EntityNotSaved { entity_type: String },

    /// Stored action kind does not name a lifecycle action
    #[error("Unknown action kind: '{value}'")]
    UnknownActionKind { value: String },

    /// Stored change kind does not name a field action
    #[error("Unknown field action kind: '{value}'")]
    UnknownFieldActionKind { value: String },

    /// Two many-to-many fields declare the same junction
    #[error("Junction {junction} is declared by more than one field")]
    DuplicateJunction { junction: String },

    /// Schema declaration is inconsistent
    #[error("Invalid schema: {reason}")]
    InvalidSchema { reason: String },

    /// Settings could not be read or parsed
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Failure reported by a storage backend
    #[error("Store error: {0}")]
    Store(ExError),

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<AuditError> for ExError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::UnknownEntityType { entity_type } => {
                ExError::new(ExErrorKind::InvalidSchema)
                    .with_entity(entity_type)
                    .with_message("Entity type is not registered")
            }

            AuditError::UnknownField { entity_type, field } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_entity(entity_type)
                    .with_message(format!("Unknown field {}", field))
            }

            AuditError::NotManyToMany { entity_type, field } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_entity(entity_type)
                    .with_message(format!("Field {} is not a many-to-many relation", field))
            }

            AuditError::EntityNotFound {
                entity_type,
                entity_id,
            } => ExError::new(ExErrorKind::NotFound)
                .with_entity(format!("{}:{}", entity_type, entity_id))
                .with_message("Entity not found"),

            AuditError::EntityNotSaved { entity_type } => ExError::new(ExErrorKind::NotSaved)
                .with_entity(entity_type)
                .with_message("Entity has not been saved"),

            AuditError::UnknownActionKind { value } => {
                ExError::new(ExErrorKind::UnknownActionKind)
                    .with_message(format!("Unknown action kind: '{}'", value))
            }

            AuditError::UnknownFieldActionKind { value } => {
                ExError::new(ExErrorKind::UnknownActionKind)
                    .with_message(format!("Unknown field action kind: '{}'", value))
            }

            AuditError::DuplicateJunction { junction } => ExError::new(ExErrorKind::InvalidSchema)
                .with_message(format!("Duplicate junction {}", junction)),

            AuditError::InvalidSchema { reason } => {
                ExError::new(ExErrorKind::InvalidSchema).with_message(reason)
            }

            AuditError::Config { message } => ExError::new(ExErrorKind::Config).with_message(message),

            AuditError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            AuditError::Store(inner) => inner,

            AuditError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<ExError> for AuditError {
    fn from(err: ExError) -> Self {
        AuditError::Store(err)
    }
}

/// Conversion from serde_json::Error to AuditError
impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Serialization {
            message: err.to_string(),
        }
    }
}
