use std::path::PathBuf;

/// MySQL's `ER_DUP_ENTRY`.
#[cfg(feature = "mysql")]
const MYSQL_DUPLICATE_ENTRY: u16 = 1062;

/// Error type for the migrun crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The migrations source directory does not exist.
    #[error("migrations directory '{}' does not exist", .0.display())]
    DirectoryNotFound(PathBuf),
    /// No source file exists for the named or recorded migration.
    #[error("migration '{0}' not found")]
    UnitNotFound(String),
    /// A source file exists but no `apply`/`revert` pair is bound to it.
    #[error("migration '{identifier}' is malformed: {reason}")]
    MalformedUnit { identifier: String, reason: String },
    /// The ledger already holds an entry for this identifier.
    #[error("migration '{0}' is already recorded in the ledger")]
    DuplicateIdentifier(String),
    /// The same identifier was registered twice.
    #[error("migration '{0}' is registered more than once")]
    DuplicateRegistration(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[cfg(feature = "mysql")]
    #[error("{message}")]
    Mysql { code: Option<u16>, message: String },
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// Whether this error was raised by the database executor.
    pub fn is_data_access(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Rusqlite(_) => true,
            #[cfg(feature = "mysql")]
            Self::Mysql { .. } => true,
            _ => false,
        }
    }

    /// Whether this error is the database rejecting a duplicate key.
    pub(crate) fn is_unique_violation(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Rusqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ),
            #[cfg(feature = "mysql")]
            Self::Mysql { code, .. } => *code == Some(MYSQL_DUPLICATE_ENTRY),
            _ => false,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(value: mysql::Error) -> Self {
        let code = match &value {
            mysql::Error::MySqlError(err) => Some(err.code),
            _ => None,
        };
        Self::Mysql {
            code,
            message: value.to_string(),
        }
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

// Manual PartialEq implementation because std::io::Error doesn't implement PartialEq
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::DirectoryNotFound(a), Self::DirectoryNotFound(b)) => a == b,
            (Self::UnitNotFound(a), Self::UnitNotFound(b)) => a == b,
            (
                Self::MalformedUnit {
                    identifier: a,
                    reason: ra,
                },
                Self::MalformedUnit {
                    identifier: b,
                    reason: rb,
                },
            ) => a == b && ra == rb,
            (Self::DuplicateIdentifier(a), Self::DuplicateIdentifier(b)) => a == b,
            (Self::DuplicateRegistration(a), Self::DuplicateRegistration(b)) => a == b,
            (Self::InvalidConfig(a), Self::InvalidConfig(b)) => a == b,
            #[cfg(feature = "sqlite")]
            (Self::Rusqlite(a), Self::Rusqlite(b)) => a == b,
            #[cfg(feature = "mysql")]
            (
                Self::Mysql {
                    code: a,
                    message: ma,
                },
                Self::Mysql {
                    code: b,
                    message: mb,
                },
            ) => a == b && ma == mb,
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind() && a.to_string() == b.to_string(),
            (Self::Generic(a), Self::Generic(b)) => a == b,
            _ => false,
        }
    }
}
