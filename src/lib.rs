//! A dual-dialect SMB client.
//!
//! Supports the legacy SMB1 (`NT LM 0.12`) dialect and SMB2 (2.0.2 / 2.1),
//! over Direct TCP (port 445) or NetBIOS session service (port 139).
//!
//! The two entry points are [`Smb1Client`] and [`Smb2Client`]; both expose
//! the same lifecycle (`connect`, `login`, `tree_connect`, `list_shares`,
//! `logoff`, `disconnect`) and both hand out a [`FileStore`] per connected
//! tree for file-level operations.

pub mod auth;
pub mod connection;
pub mod error;
pub mod filestore;
pub mod packets;
pub mod rpc;
pub mod smb1;
pub mod smb2;

pub use auth::AuthMethod;
pub use connection::config::ClientConfig;
pub use connection::transport::TransportKind;
pub use error::Error;
pub use filestore::{CreateFileArgs, FileHandle, FileStatus, FileStore};
pub use packets::status::Status;
pub use smb1::Smb1Client;
pub use smb2::Smb2Client;

pub type Result<T> = std::result::Result<T, Error>;
