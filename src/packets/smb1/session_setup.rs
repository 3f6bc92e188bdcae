use binrw::prelude::*;

use crate::packets::binrw_util::to_utf16_le;

use super::header::{AndXBlock, Capabilities};

/// Builds the trailing account/domain/OS strings of a session setup
/// request, with the pad byte unicode strings require when their start
/// offset (from the header) is odd.
fn setup_trailing_strings(
    start_offset: usize,
    account: &str,
    domain: &str,
    unicode: bool,
) -> Vec<u8> {
    let mut bytes = Vec::new();
    if unicode {
        if start_offset % 2 != 0 {
            bytes.push(0);
        }
        for s in [account, domain, NATIVE_OS, NATIVE_LAN_MAN] {
            bytes.extend_from_slice(&to_utf16_le(s));
            bytes.extend_from_slice(&[0, 0]);
        }
    } else {
        for s in [account, domain, NATIVE_OS, NATIVE_LAN_MAN] {
            bytes.extend_from_slice(s.as_bytes());
            bytes.push(0);
        }
    }
    bytes
}

const NATIVE_OS: &str = "Unix";
const NATIVE_LAN_MAN: &str = "smbclient";

/// Classic (pre-extended-security) SessionSetupAndX request: the NTLM
/// responses travel directly in the two password fields.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct SessionSetupRequest {
    #[bw(calc = 13)]
    #[br(assert(_word_count == 13))]
    _word_count: u8,
    pub andx: AndXBlock,
    pub max_buffer_size: u16,
    pub max_mpx_count: u16,
    pub vc_number: u16,
    pub session_key: u32,
    #[bw(try_calc(u16::try_from(oem_password.len())))]
    oem_password_length: u16,
    #[bw(try_calc(u16::try_from(unicode_password.len())))]
    unicode_password_length: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    pub capabilities: Capabilities,
    #[bw(try_calc(u16::try_from(oem_password.len() + unicode_password.len() + trailing.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(count = oem_password_length)]
    pub oem_password: Vec<u8>,
    #[br(count = unicode_password_length)]
    pub unicode_password: Vec<u8>,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub trailing: Vec<u8>,
}

impl SessionSetupRequest {
    /// Fixed offset of the data bytes from the start of the header:
    /// 32-byte header, word count, 13 words, byte count.
    const BYTES_OFFSET: usize = 32 + 1 + 26 + 2;

    pub fn new(
        oem_password: Vec<u8>,
        unicode_password: Vec<u8>,
        account: &str,
        domain: &str,
        capabilities: Capabilities,
        max_buffer_size: u16,
        max_mpx_count: u16,
        unicode: bool,
    ) -> Self {
        let strings_start = Self::BYTES_OFFSET + oem_password.len() + unicode_password.len();
        let trailing = setup_trailing_strings(strings_start, account, domain, unicode);
        SessionSetupRequest {
            andx: AndXBlock::default(),
            max_buffer_size,
            max_mpx_count,
            vc_number: 1,
            session_key: 0,
            capabilities,
            oem_password,
            unicode_password,
            trailing,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct SessionSetupResponse {
    #[bw(calc = 3)]
    #[br(assert(_word_count == 3))]
    _word_count: u8,
    pub andx: AndXBlock,
    pub action: u16,
    #[bw(try_calc(u16::try_from(trailing.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub trailing: Vec<u8>,
}

/// Extended-security SessionSetupAndX request, carrying an SPNEGO/NTLM
/// token instead of password fields.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct SessionSetupRequestExtended {
    #[bw(calc = 12)]
    #[br(assert(_word_count == 12))]
    _word_count: u8,
    pub andx: AndXBlock,
    pub max_buffer_size: u16,
    pub max_mpx_count: u16,
    pub vc_number: u16,
    pub session_key: u32,
    #[bw(try_calc(u16::try_from(security_blob.len())))]
    security_blob_length: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u32,
    pub capabilities: Capabilities,
    #[bw(try_calc(u16::try_from(security_blob.len() + trailing.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(count = security_blob_length)]
    pub security_blob: Vec<u8>,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub trailing: Vec<u8>,
}

impl SessionSetupRequestExtended {
    /// 32-byte header, word count, 12 words, byte count.
    const BYTES_OFFSET: usize = 32 + 1 + 24 + 2;

    pub fn new(
        security_blob: Vec<u8>,
        capabilities: Capabilities,
        max_buffer_size: u16,
        max_mpx_count: u16,
        unicode: bool,
    ) -> Self {
        let strings_start = Self::BYTES_OFFSET + security_blob.len();
        let trailing = setup_trailing_strings(strings_start, "", "", unicode);
        SessionSetupRequestExtended {
            andx: AndXBlock::default(),
            max_buffer_size,
            max_mpx_count,
            vc_number: 1,
            session_key: 0,
            capabilities,
            security_blob,
            trailing,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct SessionSetupResponseExtended {
    #[bw(calc = 4)]
    #[br(assert(_word_count == 4))]
    _word_count: u8,
    pub andx: AndXBlock,
    pub action: u16,
    #[bw(try_calc(u16::try_from(security_blob.len())))]
    security_blob_length: u16,
    #[bw(try_calc(u16::try_from(security_blob.len() + trailing.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(count = security_blob_length)]
    pub security_blob: Vec<u8>,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub trailing: Vec<u8>,
}

impl SessionSetupResponseExtended {
    pub fn new(security_blob: Vec<u8>) -> Self {
        SessionSetupResponseExtended {
            andx: AndXBlock::default(),
            action: 0,
            security_blob,
            trailing: Vec::new(),
        }
    }
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct LogoffRequest {
    #[bw(calc = 2)]
    #[br(assert(_word_count == 2))]
    _word_count: u8,
    #[bw(calc = AndXBlock::default())]
    #[br(temp)]
    _andx: AndXBlock,
    #[bw(calc = 0)]
    #[br(temp)]
    _byte_count: u16,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct LogoffResponse {
    #[bw(calc = 2)]
    #[br(assert(_word_count == 2))]
    _word_count: u8,
    #[bw(calc = AndXBlock::default())]
    #[br(temp)]
    _andx: AndXBlock,
    #[bw(calc = 0)]
    #[br(temp)]
    _byte_count: u16,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct EchoRequest {
    #[bw(calc = 1)]
    #[br(assert(_word_count == 1))]
    _word_count: u8,
    pub echo_count: u16,
    #[bw(try_calc(u16::try_from(data.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub data: Vec<u8>,
}

#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct EchoResponse {
    #[bw(calc = 1)]
    #[br(assert(_word_count == 1))]
    _word_count: u8,
    pub sequence_number: u16,
    #[bw(try_calc(u16::try_from(data.len())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub data: Vec<u8>,
}
