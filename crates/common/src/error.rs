//! Error related data structures to be shared and used.
//!
//! This module contains the [`Error`] enum, which is used to represent
//! errors that can occur within the Matcha domain.

use std::{
    fmt::{self, Display, Formatter},
    io,
};

/// Top level enum for error handling within Matcha.
///
/// The first three variants are the boundary errors raised by the
/// cartridge loader, everything else should use `CustomError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    RomTooSmall,
    UnsupportedCartridge(String),
    UnknownCartridge(u8),
    CustomError(String),
}

impl Error {
    pub fn description(&self) -> String {
        match self {
            Error::RomTooSmall => String::from("ROM buffer is too small"),
            Error::UnsupportedCartridge(kind) => {
                format!("Unsupported cartridge type: {}", kind)
            }
            Error::UnknownCartridge(value) => {
                format!("Unknown cartridge type: 0x{:02x}", value)
            }
            Error::CustomError(message) => String::from(message),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::CustomError(format!("I/O error: {}", error))
    }
}
