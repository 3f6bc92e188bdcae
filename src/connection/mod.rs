//! The connection engine shared by both dialects: framed TCP transport,
//! the receive buffer, the inbox the background reader dispatches into,
//! and the SMB2 credit ledger.

pub mod config;
pub mod credits;
pub mod inbox;
pub mod reader;
pub mod recv_buffer;
pub mod transport;
