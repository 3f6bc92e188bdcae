use binrw::prelude::*;
use modular_bitfield::prelude::*;

#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy)]
#[brw(repr(u8))]
pub enum Command {
    Close = 0x04,
    Flush = 0x05,
    Echo = 0x2B,
    LockingAndX = 0x24,
    Transaction = 0x25,
    ReadAndX = 0x2E,
    WriteAndX = 0x2F,
    Transaction2 = 0x32,
    TreeDisconnect = 0x71,
    Negotiate = 0x72,
    SessionSetupAndX = 0x73,
    LogoffAndX = 0x74,
    TreeConnectAndX = 0x75,
    NtTransact = 0xA0,
    NtCreateAndX = 0xA2,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({:#04x})", self, *self as u8)
    }
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct HeaderFlags {
    pub lock_and_read_ok: bool,
    pub buf_avail: bool,
    #[skip]
    __: bool,
    pub case_insensitive: bool,
    pub canonicalized_paths: bool,
    pub oplock: bool,
    pub opbatch: bool,
    pub reply: bool,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct HeaderFlags2 {
    pub long_names_allowed: bool,
    pub eas: bool,
    pub security_signature: bool,
    pub compressed: bool,
    pub security_signature_required: bool,
    #[skip]
    __: bool,
    pub is_long_name: bool,
    #[skip]
    __: B3,
    pub reparse_path: bool,
    pub extended_security: bool,
    pub dfs: bool,
    pub paging_io: bool,
    pub nt_status: bool,
    pub unicode: bool,
}

/// SMB1 server capability bits, from the negotiate response.
#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct Capabilities {
    pub raw_mode: bool,
    pub mpx_mode: bool,
    pub unicode: bool,
    pub large_files: bool,
    pub nt_smbs: bool,
    pub rpc_remote_apis: bool,
    pub nt_status: bool,
    pub level2_oplocks: bool,
    pub lock_and_read: bool,
    pub nt_find: bool,
    #[skip]
    __: B2,
    pub dfs: bool,
    pub info_level_passthrough: bool,
    pub large_read: bool,
    pub large_write: bool,
    #[skip]
    __: B15,
    pub extended_security: bool,
}

/// The 32-byte SMB1 message header.
#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little, magic(b"\xffSMB"))]
pub struct Header {
    pub command: Command,
    /// Raw NT status (the client always negotiates `NT_STATUS` codes).
    pub status: u32,
    pub flags: HeaderFlags,
    pub flags2: HeaderFlags2,
    pub pid_high: u16,
    pub security_features: u64,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
    pub tid: u16,
    pub pid_low: u16,
    pub uid: u16,
    pub mid: u16,
}

impl Header {
    pub const STRUCT_SIZE: usize = 32;

    pub fn status(&self) -> crate::Result<crate::packets::status::Status> {
        self.status.try_into()
    }
}

/// The AndX follow-up block carried by AndX commands. This client never
/// chains commands, so the block is always "none".
#[binrw::binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct AndXBlock {
    pub andx_command: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _andx_reserved: u8,
    pub andx_offset: u16,
}

impl Default for AndXBlock {
    fn default() -> Self {
        AndXBlock {
            andx_command: 0xFF,
            andx_offset: 0,
        }
    }
}
