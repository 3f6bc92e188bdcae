//! The SMB1 (`NT LM 0.12`) protocol engine: connection state machine,
//! both session setup flavors, and the legacy AndX file store.

mod client;
mod file_store;

pub use client::{Smb1Client, Smb1NegotiateInfo, Smb1Security};
pub use file_store::Smb1FileStore;
