//! Wire structures for every protocol layer this client speaks:
//! NetBIOS session service framing, SMB1 and SMB2 messages, shared FSCC
//! information classes, and DCE/RPC PDUs.

pub mod binrw_util;
pub mod fscc;
pub mod guid;
pub mod netbios;
pub mod smb1;
pub mod smb2;
pub mod status;
