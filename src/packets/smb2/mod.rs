//! SMB2 message structures (MS-SMB2), dialects 2.0.2 and 2.1.

mod create;
mod file;
mod header;
mod info;
mod ioctl;
mod message;
mod negotiate;
mod query_dir;
mod session;
mod tree;

pub use create::*;
pub use file::*;
pub use header::*;
pub use info::*;
pub use ioctl::*;
pub use message::*;
pub use negotiate::*;
pub use query_dir::*;
pub use session::*;
pub use tree::*;
