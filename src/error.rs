use crate::exit;

pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced by the command-line driver
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{path}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: String,
        exit_code: exit::Code,
    },

    #[error("{message}")]
    Generic {
        message: String,
        exit_code: exit::Code,
    },
}

impl CliError {
    /// The sysexits code this error maps to
    pub fn exit_code(&self) -> exit::Code {
        match self {
            CliError::Io { exit_code, .. } => *exit_code,
            CliError::Generic { exit_code, .. } => *exit_code,
        }
    }

    /// Wraps a read failure with its path
    pub fn from_read_error(source: std::io::Error, path: &str) -> Self {
        let exit_code = if source.kind() == std::io::ErrorKind::NotFound {
            exit::Code::NoInput
        } else {
            exit::Code::IoErr
        };
        CliError::Io {
            source,
            path: path.to_string(),
            exit_code,
        }
    }

    /// Wraps a write failure with its path
    pub fn from_write_error(source: std::io::Error, path: &str) -> Self {
        let exit_code = if source.kind() == std::io::ErrorKind::PermissionDenied {
            exit::Code::CantCreat
        } else {
            exit::Code::IoErr
        };
        CliError::Io {
            source,
            path: path.to_string(),
            exit_code,
        }
    }
}
