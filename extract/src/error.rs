//! Error types and result definitions for extraction runs.
//!
//! Every failure is an [`ExtractError`] carrying an [`ErrorKind`], a static description, an
//! optional dynamic detail, an optional source error and the location where it was raised. The
//! pipeline decides from the kind alone whether an entry is skipped or the run aborted.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use extract_mysql::db::IndexMetadataError;
use sqlparser::parser::ParserError;

/// Convenient result type for extraction operations using [`ExtractError`] as the error type.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Main error type for extraction operations.
#[derive(Debug, Clone)]
pub struct ExtractError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Categories of errors raised while replaying a query log.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Statement Errors
    NotASelect,
    InvalidStatement,
    UnsupportedNestedQuery,

    // Schema Errors
    MissingIdentityColumns,

    // Replication Errors
    SameServer,

    // Connection Errors
    SourceConnectionFailed,
    DestinationConnectionFailed,

    // Query & Execution Errors
    SourceQueryFailed,
    DestinationQueryFailed,

    // Data & Transformation Errors
    ConversionError,
    InvalidData,

    // IO Errors
    IoError,

    // Run Errors
    EmptyLog,
    NoSelectStatements,

    // State Errors
    InvalidState,

    // Raised by fault injection in tests.
    #[cfg(feature = "failpoints")]
    InjectedFailure,
}

impl ExtractError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Appends the log entry that triggered this error to the detail.
    pub fn with_statement(mut self, line: usize, statement: &str) -> Self {
        let context = format!("Statement (line {line}): {statement}");
        self.detail = Some(match self.detail.take() {
            Some(detail) => Cow::Owned(format!("{detail}\n{context}")),
            None => Cow::Owned(context),
        });
        self
    }

    /// Creates an [`ExtractError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        ExtractError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

impl PartialEq for ExtractError {
    fn eq(&self, other: &ExtractError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        write_detail(self.detail.as_deref(), f, 1)
    }
}

impl error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                if line.trim().is_empty() {
                    write!(f, "\n{indent_str}  ")?;
                } else {
                    write!(f, "\n{indent_str}  {line}")?;
                }
            }
        }
    }

    Ok(())
}

/// Creates an [`ExtractError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for ExtractError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ExtractError {
        ExtractError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates an [`ExtractError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for ExtractError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ExtractError {
        ExtractError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`ExtractError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for ExtractError {
    #[track_caller]
    fn from(err: std::io::Error) -> ExtractError {
        let detail = err.to_string();
        ExtractError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`ParserError`] to [`ExtractError`] with [`ErrorKind::InvalidStatement`].
impl From<ParserError> for ExtractError {
    #[track_caller]
    fn from(err: ParserError) -> ExtractError {
        let detail = err.to_string();
        ExtractError::from_components(
            ErrorKind::InvalidStatement,
            Cow::Borrowed("SQL parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`sqlx::Error`] to [`ExtractError`] with the appropriate error kind.
///
/// Errors raised while talking to a known side should go through
/// [`crate::database::mysql`], which also attaches the failing SQL.
impl From<sqlx::Error> for ExtractError {
    #[track_caller]
    fn from(err: sqlx::Error) -> ExtractError {
        let kind = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => ErrorKind::SourceConnectionFailed,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => ErrorKind::ConversionError,
            _ => ErrorKind::SourceQueryFailed,
        };

        let detail = err.to_string();
        ExtractError::from_components(
            kind,
            Cow::Borrowed("Database operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`IndexMetadataError`] to [`ExtractError`].
impl From<IndexMetadataError> for ExtractError {
    #[track_caller]
    fn from(err: IndexMetadataError) -> ExtractError {
        match err {
            IndexMetadataError::Database(err) => err.into(),
            IndexMetadataError::InvalidRow(table) => ExtractError::from_components(
                ErrorKind::InvalidData,
                Cow::Borrowed("Index metadata row is malformed"),
                Some(Cow::Owned(table.to_string())),
                None,
            ),
        }
    }
}
