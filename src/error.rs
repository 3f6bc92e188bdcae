use std::{num::TryFromIntError, sync::PoisonError};

use thiserror::Error;

use crate::packets::status::Status;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unexpected message, {0}")]
    InvalidMessage(String),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Binrw Error: {0}")]
    BinRwError(#[from] binrw::Error),
    #[error("Int parsing Error: {0}")]
    ParsingError(#[from] TryFromIntError),
    #[error("Client is not connected.")]
    NotConnected,
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid address {0}")]
    InvalidAddress(String),
    #[error("Server returned status {0}")]
    ServerError(Status),
    #[error("Unexpected message status: {0:#010x}")]
    UnexpectedMessageStatus(u32),
    #[error("Negotiation error: {0}")]
    NegotiationError(String),
    #[error("Sspi error: {0}")]
    SspiError(#[from] sspi::Error),
    #[error("Username error: {0}")]
    UsernameError(String),
    #[error("Operation timed out: {0}, took >{1:?}")]
    OperationTimeout(String, std::time::Duration),
    #[error("Lock error.")]
    LockError,
    #[error("Thread join error: {0}")]
    JoinError(String),
    #[error("{0} is not implemented by this client")]
    NotImplemented(&'static str),
    #[error("File handle does not belong to this file store")]
    InvalidHandle,
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::LockError
    }
}
