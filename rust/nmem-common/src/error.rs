use thiserror::Error;

/// Error raised by the native memory layer.
///
/// Every variant describes a programmer error: none of them is transient, and
/// no operation in this workspace retries.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn out_of_memory(size: usize) -> Error {
        ErrorKind::OutOfMemory { size }.into()
    }

    pub fn null_pointer(context: impl Into<String>) -> Error {
        ErrorKind::NullPointer {
            context: context.into(),
        }
        .into()
    }

    pub fn disposed(object: impl Into<String>) -> Error {
        ErrorKind::Disposed {
            object: object.into(),
        }
        .into()
    }

    pub fn overflow(offset: usize, count: usize, len: usize) -> Error {
        ErrorKind::Overflow { offset, count, len }.into()
    }

    pub fn unsupported(operation: impl Into<String>, mode: impl Into<String>) -> Error {
        ErrorKind::UnsupportedOperation {
            operation: operation.into(),
            mode: mode.into(),
        }
        .into()
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        ErrorKind::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
        .into()
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.kind(), ErrorKind::Disposed { .. })
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self.kind(), ErrorKind::Overflow { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind(), ErrorKind::UnsupportedOperation { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("native allocation of {size} bytes failed")]
    OutOfMemory { size: usize },

    #[error("null native pointer: {context}")]
    NullPointer { context: String },

    #[error("{object} has already been disposed")]
    Disposed { object: String },

    #[error("access of {count} bytes at offset {offset} exceeds region length {len}")]
    Overflow {
        offset: usize,
        count: usize,
        len: usize,
    },

    #[error("{operation} is not supported in {mode} mode")]
    UnsupportedOperation { operation: String, mode: String },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        use std::io::ErrorKind as IoKind;
        let kind = match e.kind() {
            ErrorKind::OutOfMemory { .. } => IoKind::OutOfMemory,
            ErrorKind::Overflow { .. } => IoKind::UnexpectedEof,
            ErrorKind::UnsupportedOperation { .. } => IoKind::Unsupported,
            ErrorKind::NullPointer { .. }
            | ErrorKind::Disposed { .. }
            | ErrorKind::InvalidArgument { .. } => IoKind::InvalidInput,
        };
        std::io::Error::new(kind, e)
    }
}
