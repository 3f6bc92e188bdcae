use binrw::prelude::*;

use crate::packets::binrw_util::FileTime;
use crate::packets::guid::Guid;

use super::header::Capabilities;

/// The single dialect this client negotiates.
pub const DIALECT_NT_LM_012: &str = "NT LM 0.12";

#[derive(BinRead, BinWrite, Debug, PartialEq, Eq)]
#[brw(magic(b"\x02"))]
pub struct Dialect {
    pub name: binrw::NullString,
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct NegotiateRequest {
    #[bw(calc = 0)]
    #[br(assert(_word_count == 0))]
    _word_count: u8,
    #[bw(try_calc(u16::try_from(dialects.iter().map(|d| d.name.len() + 2).sum::<usize>())))]
    #[br(temp)]
    _byte_count: u16,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub dialects: Vec<Dialect>,
}

impl Default for NegotiateRequest {
    fn default() -> Self {
        NegotiateRequest {
            dialects: vec![Dialect {
                name: binrw::NullString::from(DIALECT_NT_LM_012),
            }],
        }
    }
}

/// Negotiate response for the `NT LM 0.12` dialect.
///
/// The server answers in one of two shapes selected by the
/// `CAP_EXTENDED_SECURITY` capability bit: the classic shape carries an
/// 8-byte challenge (plus the domain name), the extended shape carries the
/// server GUID and an SPNEGO blob.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct NegotiateResponse {
    #[bw(calc = 17)]
    #[br(assert(_word_count == 17))]
    _word_count: u8,
    pub dialect_index: u16,
    pub security_mode: u8,
    pub max_mpx_count: u16,
    pub max_number_vcs: u16,
    pub max_buffer_size: u32,
    pub max_raw_size: u32,
    pub session_key: u32,
    pub capabilities: Capabilities,
    pub system_time: FileTime,
    pub server_time_zone: i16,
    #[bw(try_calc(u8::try_from(challenge.len())))]
    challenge_length: u8,
    #[bw(try_calc(u16::try_from(
        challenge.len() + domain_raw.len()
            + if capabilities.extended_security() { 16 + security_blob.len() } else { 0 }
    )))]
    byte_count: u16,
    #[br(if(!capabilities.extended_security()), count = challenge_length)]
    pub challenge: Vec<u8>,
    /// Raw domain/server name bytes of a classic response.
    #[br(if(!capabilities.extended_security()), count = byte_count.saturating_sub(challenge_length as u16))]
    pub domain_raw: Vec<u8>,
    #[br(if(capabilities.extended_security()))]
    pub server_guid: Option<Guid>,
    #[br(if(capabilities.extended_security()), count = byte_count.saturating_sub(16))]
    pub security_blob: Vec<u8>,
}

impl NegotiateResponse {
    pub fn is_extended_security(&self) -> bool {
        self.capabilities.extended_security()
    }
}
