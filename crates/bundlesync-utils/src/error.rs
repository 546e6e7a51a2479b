use std::{error::Error, fmt, path::PathBuf};

#[derive(Debug)]
pub enum HashError {
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::ReadFailed { path, .. } => {
                write!(f, "Failed to read file `{}`", path.display())
            }
        }
    }
}

impl Error for HashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HashError::ReadFailed { source, .. } => Some(source),
        }
    }
}

#[derive(Debug)]
pub enum PathError {
    CurrentDir { source: std::io::Error },

    Empty,

    MissingEnvVar { var: String, input: String },

    UnclosedVariable { input: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "Path is empty"),
            PathError::CurrentDir { .. } => write!(f, "Failed to get current directory"),
            PathError::UnclosedVariable { input } => {
                write!(f, "Unclosed variable expression starting at `{input}`")
            }
            PathError::MissingEnvVar { var, input } => {
                write!(f, "Environment variable `{var}` not set in `{input}`")
            }
        }
    }
}

impl Error for PathError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PathError::CurrentDir { source } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum FileSystemError {
    File {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    Directory {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    NotADirectory {
        path: PathBuf,
    },
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::File { path, action, .. } => {
                write!(f, "Failed to {action} file `{}`", path.display())
            }
            FileSystemError::Directory { path, action, .. } => {
                write!(f, "Failed to {action} directory `{}`", path.display())
            }
            FileSystemError::NotADirectory { path } => {
                write!(f, "`{}` is not a directory", path.display())
            }
        }
    }
}

impl Error for FileSystemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FileSystemError::File { source, .. } => Some(source),
            FileSystemError::Directory { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum LockError {
    Io(std::io::Error),

    AcquireFailed(String),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Io(_) => write!(f, "Lock file I/O error"),
            LockError::AcquireFailed(reason) => write!(f, "Failed to acquire lock: {reason}"),
        }
    }
}

impl Error for LockError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LockError::Io(err) => Some(err),
            LockError::AcquireFailed(_) => None,
        }
    }
}

impl From<std::io::Error> for LockError {
    fn from(err: std::io::Error) -> Self {
        LockError::Io(err)
    }
}

#[derive(Debug)]
pub enum UtilsError {
    Path(PathError),
    FileSystem(FileSystemError),
    Lock(LockError),
}

impl fmt::Display for UtilsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UtilsError::Path(err) => write!(f, "{err}"),
            UtilsError::FileSystem(err) => write!(f, "{err}"),
            UtilsError::Lock(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UtilsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            UtilsError::Path(err) => Some(err),
            UtilsError::FileSystem(err) => Some(err),
            UtilsError::Lock(err) => Some(err),
        }
    }
}

impl From<PathError> for UtilsError {
    fn from(err: PathError) -> Self {
        UtilsError::Path(err)
    }
}

impl From<FileSystemError> for UtilsError {
    fn from(err: FileSystemError) -> Self {
        UtilsError::FileSystem(err)
    }
}

impl From<LockError> for UtilsError {
    fn from(err: LockError) -> Self {
        UtilsError::Lock(err)
    }
}

pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
pub type HashResult<T> = std::result::Result<T, HashError>;
pub type LockResult<T> = std::result::Result<T, LockError>;
pub type PathResult<T> = std::result::Result<T, PathError>;

pub type UtilsResult<T> = std::result::Result<T, UtilsError>;
