// Error kinds and the context-carrying error shared by fragments and cursors.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Query,
    Cursor,
    Scan,
    Release,
    Multiple,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    row: Option<u64>,
    column: Option<usize>,
    source: Option<Box<dyn StdError + Send + Sync>>,
    errors: Vec<Error>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            row: None,
            column: None,
            source: None,
            errors: Vec::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn row(&self) -> Option<u64> {
        self.row
    }

    /// Members of a [`ErrorKind::Multiple`] aggregate, in join order.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_row(mut self, row: u64) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Combines errors so none of them is lost.
    ///
    /// Nothing to join yields `None` and a single error is returned untouched.
    /// Two or more become one `Multiple` error listing every member.
    pub fn join(errors: impl IntoIterator<Item = Error>) -> Option<Error> {
        let mut errors: Vec<Error> = errors.into_iter().collect();
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self {
                errors,
                ..Self::new(ErrorKind::Multiple)
            }),
        }
    }

    /// Finds the first error of `kind` in this error, its joined members, or
    /// its source chain.
    pub fn find(&self, kind: ErrorKind) -> Option<&Error> {
        if self.kind == kind {
            return Some(self);
        }
        if let Some(found) = self.errors.iter().find_map(|err| err.find(kind)) {
            return Some(found);
        }
        let mut source = StdError::source(self);
        while let Some(err) = source {
            if let Some(inner) = err.downcast_ref::<Error>() {
                return inner.find(kind);
            }
            source = err.source();
        }
        None
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ErrorKind::Multiple {
            for (idx, err) in self.errors.iter().enumerate() {
                if idx > 0 {
                    writeln!(f)?;
                }
                write!(f, "{err}")?;
            }
            return Ok(());
        }

        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(row) = self.row {
            write!(f, " (row: {row})")?;
        }
        if let Some(column) = self.column {
            write!(f, " (column: {column})")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}
