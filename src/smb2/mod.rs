//! The SMB2 protocol engine: connection state machine, credit-based flow
//! control, and the file store surface.

mod client;
mod file_store;

pub use client::{Smb2Client, Smb2NegotiateInfo};
pub use file_store::Smb2FileStore;
