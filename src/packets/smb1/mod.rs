//! SMB1 / CIFS message structures (MS-CIFS), `NT LM 0.12` dialect.
//!
//! Only single (un-chained) AndX commands are produced: every AndX block
//! this client writes carries `0xFF` (no follow-up command).

mod file;
mod header;
mod message;
mod negotiate;
mod session_setup;
mod transaction;
mod tree;

pub use file::*;
pub use header::*;
pub use message::*;
pub use negotiate::*;
pub use session_setup::*;
pub use transaction::*;
pub use tree::*;
