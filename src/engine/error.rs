use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// Check-out is not at least one whole night after check-in.
    InvalidRange,
    /// Candidate stay overlaps the named live booking on the same property.
    RangeConflict(Ulid),
    PropertyNotFound(Ulid),
    BookingNotFound(Ulid),
    LimitExceeded(&'static str),
    JournalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange => {
                write!(f, "check-out must be at least one night after check-in")
            }
            EngineError::RangeConflict(id) => {
                write!(f, "date range already booked: conflicts with {id}")
            }
            EngineError::PropertyNotFound(id) => write!(f, "property not found: {id}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::JournalError(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
