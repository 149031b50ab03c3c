use std::io;

/// Location of a record-level failure in the source stream.
///
/// Text formats report 1-based line numbers; binary formats report byte
/// offsets from the start of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Line(usize),
    Offset(u64),
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Line(n) => write!(f, "line {}", n),
            Position::Offset(n) => write!(f, "byte offset {}", n),
        }
    }
}

/// Pipeline error types. Every kind is terminal for the file being decoded;
/// no partial mesh is ever produced.
#[derive(Debug)]
pub enum MeshError {
    /// IO error from the byte source
    Io(io::Error),

    /// Stream truncated or ill-formed at the lexical level
    MalformedRecord { position: Position, message: String },

    /// Well-formed record outside the documented format subset
    UnsupportedFeature { position: Position, keyword: String },

    /// Material reference that no loaded library satisfies; carries the
    /// unjoined token list exactly as it appeared after `usemtl`
    UnresolvedMaterial { tokens: Vec<String> },

    /// Canonical mesh invariant violated after unification; `face` is the
    /// zero-based index of the offending face when one can be named
    InvalidMesh {
        face: Option<usize>,
        message: String,
    },
}

impl std::fmt::Display for MeshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshError::Io(e) => write!(f, "IO error: {}", e),
            MeshError::MalformedRecord { position, message } => {
                write!(f, "malformed record at {}: {}", position, message)
            }
            MeshError::UnsupportedFeature { position, keyword } => {
                write!(f, "unsupported feature at {}: {}", position, keyword)
            }
            MeshError::UnresolvedMaterial { tokens } => {
                write!(f, "unresolved material reference (tokens: {:?})", tokens)
            }
            MeshError::InvalidMesh { face, message } => match face {
                Some(n) => write!(f, "invalid mesh at face {}: {}", n, message),
                None => write!(f, "invalid mesh: {}", message),
            },
        }
    }
}

impl std::error::Error for MeshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeshError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MeshError {
    fn from(err: io::Error) -> Self {
        MeshError::Io(err)
    }
}

/// Result type for decode and unification operations
pub type Result<T> = std::result::Result<T, MeshError>;
