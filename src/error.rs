use thiserror::Error;

/// The closed taxonomy of runtime/parse errors a statement or expression can
/// fail with. Mirrors `BASIC_ERROR_ID` one-for-one, minus `OK` (represented
/// structurally by `Result::Ok` everywhere in this crate) and `MAX` (a C
/// sizing sentinel with no Rust counterpart).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BasicError {
    #[error("NEXT without FOR")]
    NextWithoutFor,
    #[error("Syntax")]
    Syntax,
    #[error("RETURN without GOSUB")]
    ReturnWithoutGosub,
    #[error("Out of DATA")]
    OutOfData,
    #[error("Parameter")]
    Parameter,
    #[error("Overflow")]
    Overflow,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("No such line")]
    NoSuchLine,
    #[error("Subscript")]
    Subscript,
    #[error("Redimension")]
    Redimension,
    #[error("Division by 0")]
    DivisionByZero,
    #[error("In program only")]
    InProgramOnly,
    #[error("STOP")]
    Stop,
    #[error("Internal")]
    Internal,
}

pub type BasicResult<T> = Result<T, BasicError>;

/// Return convenience used only inside the parser/evaluator layer: parsing
/// a token is allowed to cleanly fail over ("this wasn't a number/variable/
/// expression at all") without that being a reportable error, distinct from
/// an error encountered partway through a successful match.
pub enum ParseOutcome<T> {
    Found(T),
    NotFound,
    Err(BasicError),
}

impl<T> ParseOutcome<T> {
    /// Collapse to a `BasicResult` at a boundary that requires a value,
    /// mapping `NotFound` to `Syntax` the way every BASIC_PARSING_RESULT
    /// caller in the reference interpreter does.
    pub fn require(self) -> BasicResult<T> {
        match self {
            ParseOutcome::Found(v) => Ok(v),
            ParseOutcome::NotFound => Err(BasicError::Syntax),
            ParseOutcome::Err(e) => Err(e),
        }
    }
}

impl<T> From<BasicResult<T>> for ParseOutcome<T> {
    fn from(r: BasicResult<T>) -> Self {
        match r {
            Ok(v) => ParseOutcome::Found(v),
            Err(e) => ParseOutcome::Err(e),
        }
    }
}

/// Composes a `BasicError` with the optional current line number the way
/// the reference interpreter's `basic_error_print` does, for callers (the
/// REPL loop) that need the full rendered line. `BasicError`'s own
/// `Display` stays the bare variant text so it remains reusable elsewhere.
pub struct ErrorReport {
    pub error: BasicError,
    pub line: Option<u32>,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if self.error != BasicError::Stop {
            write!(f, " error")?;
        }
        if let Some(line) = self.line {
            write!(f, " in line {}", line)?;
        }
        Ok(())
    }
}

impl BasicError {
    pub fn report(self, line: Option<u32>) -> String {
        ErrorReport { error: self, line }.to_string()
    }
}
