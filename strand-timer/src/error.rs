/// Error returned from wake-up scheduling.
#[derive(thiserror::Error, Debug, Clone, Copy)]
#[error(transparent)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// A service runner that will not accept further wake-ups.
    pub fn shutdown() -> Self {
        Self {
            kind: ErrorKind::Shutdown,
        }
    }

    /// The kind of error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The kind of wake-up scheduling error.
#[derive(thiserror::Error, Debug, Clone, Copy)]
pub enum ErrorKind {
    /// The service runner has shut down and will not deliver wake-ups.
    #[error("the service runner has shut down")]
    Shutdown,
}
