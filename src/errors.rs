//! Error management module

use std::fmt;
use std::io::Error as IoError;
use std::str::Utf8Error;
use std::sync::Arc;

use crate::node::NodeType;

/// Line and column of a node in the source document, both 1-based.
///
/// Columns are counted in bytes from the start of the line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextPosition {
    /// Line number, starting from 1
    pub line: usize,
    /// Column number, starting from 1
    pub column: usize,
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Well-formedness violations detected while reading markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IllFormedError {
    /// Input ended while the named construct was still open
    UnexpectedEof(String),
    /// End event mismatch
    EndEventMismatch {
        /// Expected end event
        expected: String,
        /// Found end event
        found: String,
    },
    /// Unexpected token inside markup
    UnexpectedToken(String),
    /// Unexpected <!>
    UnexpectedBang(u8),
    /// The XML declaration was found somewhere other than at the very start
    MisplacedDeclaration,
    /// Attribute syntax is broken at the specified byte offset inside the tag
    MalformedAttribute(usize),
    /// The same attribute name appears twice on one element
    DuplicatedAttribute(String),
    /// An element or attribute uses a prefix that has no namespace binding
    UnknownPrefix(String),
    /// A namespace declaration tries to rebind a reserved prefix
    InvalidPrefixBinding(String),
    /// A general entity reference names an entity that was never declared
    UndeclaredEntity(String),
    /// An entity refers to itself, directly or indirectly
    RecursiveEntity(String),
    /// A character reference does not denote a legal character
    InvalidCharRef(String),
    /// Document has no root element
    MissingRoot,
    /// A second top-level element was found in a document
    MultipleRoots(String),
    /// Character data outside of the root element
    TextAtRootLevel,
    /// DOCTYPE found while DTD processing is prohibited
    DtdProhibited,
    /// Input ended while these elements were still open
    UnclosedElements(Vec<String>),
}

impl fmt::Display for IllFormedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IllFormedError::UnexpectedEof(e) => write!(f, "Unexpected EOF during reading {}", e),
            IllFormedError::EndEventMismatch { expected, found } => {
                write!(f, "Expecting </{}> found </{}>", expected, found)
            }
            IllFormedError::UnexpectedToken(e) => write!(f, "Unexpected token '{}'", e),
            IllFormedError::UnexpectedBang(b) => write!(
                f,
                "only Comment (`--`), CDATA (`[CDATA[`) and DOCTYPE (`DOCTYPE`) nodes can start with a '!', but symbol `{}` found",
                *b as char
            ),
            IllFormedError::MisplacedDeclaration => {
                write!(f, "XML declaration allowed only at the start of the document")
            }
            IllFormedError::MalformedAttribute(pos) => {
                write!(f, "malformed attribute at position {} of the tag", pos)
            }
            IllFormedError::DuplicatedAttribute(name) => {
                write!(f, "attribute `{}` is specified more than once", name)
            }
            IllFormedError::UnknownPrefix(p) => write!(f, "`{}` is an undeclared prefix", p),
            IllFormedError::InvalidPrefixBinding(p) => {
                write!(f, "prefix `{}` cannot be bound to that namespace", p)
            }
            IllFormedError::UndeclaredEntity(e) => {
                write!(f, "reference to undeclared entity `{}`", e)
            }
            IllFormedError::RecursiveEntity(e) => {
                write!(f, "entity `{}` references itself", e)
            }
            IllFormedError::InvalidCharRef(e) => write!(f, "invalid character reference `{}`", e),
            IllFormedError::MissingRoot => write!(f, "root element is missing"),
            IllFormedError::MultipleRoots(name) => {
                write!(f, "there are multiple root elements, found `{}`", name)
            }
            IllFormedError::TextAtRootLevel => write!(f, "data at the root level is invalid"),
            IllFormedError::DtdProhibited => {
                write!(f, "DTD is prohibited by the reader settings")
            }
            IllFormedError::UnclosedElements(names) => {
                write!(f, "unexpected end of file, unclosed elements: {:?}", names)
            }
        }
    }
}

/// A lexical value could not be converted to the requested type.
#[derive(Clone, Debug)]
pub struct ConversionError {
    /// Name of the requested type
    pub type_name: &'static str,
    /// The content that failed to convert
    pub value: String,
    /// The underlying parse failure
    pub source: Arc<dyn std::error::Error + Send + Sync>,
    /// Position of the node the content was read from, when known
    pub position: Option<TextPosition>,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "content `{}` cannot be converted to {}: {}",
            self.value, self.type_name, self.source
        )?;
        if let Some(position) = self.position {
            write!(f, " (at {})", position)?;
        }
        Ok(())
    }
}

/// The error type used by this crate.
#[derive(Clone, Debug)]
pub enum Error {
    /// IO error
    Io(Arc<IoError>),
    /// Input decoding error. If `encoding` feature is disabled, contains `None`,
    /// otherwise contains the UTF-8 decoding error
    NonDecodable(Option<Utf8Error>),
    /// The document is not well-formed
    IllFormed {
        /// What is wrong with the markup
        error: IllFormedError,
        /// Where the offending node starts, when known
        position: Option<TextPosition>,
    },
    /// The operation cannot be performed in the current reader position or state
    InvalidOperation(String),
    /// Content could not be converted to the requested type
    Conversion(ConversionError),
    /// The reader does not implement the requested capability
    NotSupported(&'static str),
}

impl Error {
    /// Creates an `IllFormed` error without position information.
    #[inline]
    pub(crate) fn ill_formed(error: IllFormedError) -> Self {
        Error::IllFormed {
            error,
            position: None,
        }
    }

    /// Error raised when an operation is attempted on a node of a wrong kind.
    pub(crate) fn invalid_node(operation: &str, node_type: NodeType) -> Self {
        Error::InvalidOperation(format!(
            "the {} method is not supported on node type {:?}",
            operation, node_type
        ))
    }

    /// Attaches position information, unless the error already has some.
    pub(crate) fn with_position(self, at: Option<TextPosition>) -> Self {
        match self {
            Error::IllFormed {
                error,
                position: None,
            } => Error::IllFormed {
                error,
                position: at,
            },
            Error::Conversion(mut e) if e.position.is_none() => {
                e.position = at;
                Error::Conversion(e)
            }
            e => e,
        }
    }

    /// Returns the position carried by the error, if any.
    pub fn position(&self) -> Option<TextPosition> {
        match self {
            Error::IllFormed { position, .. } => *position,
            Error::Conversion(e) => e.position,
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    /// Creates a new `Error::Io` from the given error
    #[inline]
    fn from(error: IoError) -> Error {
        Error::Io(Arc::new(error))
    }
}

impl From<Utf8Error> for Error {
    /// Creates a new `Error::NonDecodable` from the given error
    #[inline]
    fn from(error: Utf8Error) -> Error {
        Error::NonDecodable(Some(error))
    }
}

impl From<IllFormedError> for Error {
    #[inline]
    fn from(error: IllFormedError) -> Error {
        Error::ill_formed(error)
    }
}

impl From<ConversionError> for Error {
    #[inline]
    fn from(error: ConversionError) -> Error {
        Error::Conversion(error)
    }
}

/// A specialized `Result` type where the error is hard-wired to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NonDecodable(None) => write!(f, "Malformed input, decoding impossible"),
            Error::NonDecodable(Some(e)) => write!(f, "Malformed UTF-8 input: {}", e),
            Error::IllFormed {
                error,
                position: Some(p),
            } => write!(f, "ill-formed document at {}: {}", p, error),
            Error::IllFormed {
                error,
                position: None,
            } => write!(f, "ill-formed document: {}", error),
            Error::InvalidOperation(e) => write!(f, "invalid operation: {}", e),
            Error::Conversion(e) => e.fmt(f),
            Error::NotSupported(op) => write!(f, "{} is not supported by this reader", op),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e.as_ref()),
            Error::NonDecodable(Some(e)) => Some(e),
            Error::Conversion(e) => Some(e.source.as_ref()),
            _ => None,
        }
    }
}
