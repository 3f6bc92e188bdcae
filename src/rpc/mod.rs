//! Minimal connection-oriented DCE/RPC over SMB named pipes: enough of
//! the bind / request machinery to drive the Server Service
//! (`NetrShareEnum`) through `FSCTL_PIPE_TRANSCEIVE`.

pub mod srvsvc;

use std::io::Cursor;

use binrw::prelude::*;

use crate::packets::binrw_util::encode_le;
use crate::packets::guid::Guid;
use crate::Error;

pub const PDU_TYPE_REQUEST: u8 = 0;
pub const PDU_TYPE_RESPONSE: u8 = 2;
pub const PDU_TYPE_BIND: u8 = 11;
pub const PDU_TYPE_BIND_ACK: u8 = 12;

/// First and last fragment: this client never fragments.
const PFC_FIRST_AND_LAST: u8 = 0x03;
/// Little-endian, ASCII data representation.
const PACKED_DREP: [u8; 4] = [0x10, 0, 0, 0];
const HEADER_SIZE: usize = 16;
const DEFAULT_FRAG_SIZE: u16 = 4280;

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
struct PduHeader {
    #[bw(calc = 5)]
    #[br(assert(_version == 5))]
    _version: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _version_minor: u8,
    ptype: u8,
    pfc_flags: u8,
    drep: [u8; 4],
    frag_length: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _auth_length: u16,
    call_id: u32,
}

/// A decoded (unfragmented) PDU.
#[derive(Debug)]
pub struct Pdu {
    pub ptype: u8,
    pub call_id: u32,
    pub body: Vec<u8>,
}

pub fn encode_pdu(ptype: u8, call_id: u32, body: &[u8]) -> crate::Result<Vec<u8>> {
    let header = PduHeader {
        ptype,
        pfc_flags: PFC_FIRST_AND_LAST,
        drep: PACKED_DREP,
        frag_length: (HEADER_SIZE + body.len()) as u16,
        call_id,
    };
    let mut out = encode_le(&header)?;
    out.extend_from_slice(body);
    Ok(out)
}

pub fn decode_pdu(bytes: &[u8]) -> crate::Result<Pdu> {
    let mut cursor = Cursor::new(bytes);
    let header = PduHeader::read(&mut cursor)?;
    if header.drep != PACKED_DREP {
        return Err(Error::InvalidMessage(format!(
            "Unsupported RPC data representation: {:?}",
            header.drep
        )));
    }
    if header.pfc_flags & PFC_FIRST_AND_LAST != PFC_FIRST_AND_LAST {
        return Err(Error::InvalidMessage(
            "Fragmented RPC responses are not supported".to_string(),
        ));
    }
    let end = (header.frag_length as usize).min(bytes.len());
    Ok(Pdu {
        ptype: header.ptype,
        call_id: header.call_id,
        body: bytes[HEADER_SIZE..end].to_vec(),
    })
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
#[brw(little)]
pub struct SyntaxId {
    pub uuid: Guid,
    pub version: u16,
    pub version_minor: u16,
}

/// The NDR32 transfer syntax.
pub fn ndr32_syntax() -> SyntaxId {
    SyntaxId {
        uuid: "8a885d04-1ceb-11c9-9fe8-08002b104860".parse().unwrap(),
        version: 2,
        version_minor: 0,
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
struct BindBody {
    max_xmit_frag: u16,
    max_recv_frag: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _assoc_group_id: u32,
    #[bw(calc = 1)]
    #[br(temp)]
    _num_context_items: u8,
    #[bw(calc = [0u8; 3])]
    #[br(temp)]
    _pad: [u8; 3],
    context_id: u16,
    #[bw(calc = 1)]
    #[br(temp)]
    _num_transfer_syntaxes: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    abstract_syntax: SyntaxId,
    transfer_syntax: SyntaxId,
}

pub fn encode_bind(abstract_syntax: &SyntaxId, call_id: u32) -> crate::Result<Vec<u8>> {
    let body = BindBody {
        max_xmit_frag: DEFAULT_FRAG_SIZE,
        max_recv_frag: DEFAULT_FRAG_SIZE,
        context_id: 0,
        abstract_syntax: abstract_syntax.clone(),
        transfer_syntax: ndr32_syntax(),
    };
    encode_pdu(PDU_TYPE_BIND, call_id, &encode_le(&body)?)
}

/// Validates a bind-ack body: the one presented context must have been
/// accepted with the NDR32 transfer syntax.
pub fn check_bind_ack(body: &[u8]) -> crate::Result<()> {
    let mut cursor = Cursor::new(body);
    let _max_xmit = u16::read_le(&mut cursor)?;
    let _max_recv = u16::read_le(&mut cursor)?;
    let _assoc_group = u32::read_le(&mut cursor)?;
    let sec_addr_len = u16::read_le(&mut cursor)?;
    let mut port = vec![0u8; sec_addr_len as usize];
    std::io::Read::read_exact(&mut cursor, &mut port)?;
    // Result list is aligned to 4 bytes from the start of the PDU; the
    // body begins 16 bytes in, so body-relative alignment is identical.
    let misalignment = cursor.position() as usize % 4;
    if misalignment != 0 {
        cursor.set_position(cursor.position() + (4 - misalignment) as u64);
    }
    let num_results = u8::read_le(&mut cursor)?;
    cursor.set_position(cursor.position() + 3);
    if num_results < 1 {
        return Err(Error::InvalidMessage("Empty bind-ack result list".to_string()));
    }
    let result = u16::read_le(&mut cursor)?;
    let reason = u16::read_le(&mut cursor)?;
    if result != 0 {
        return Err(Error::InvalidMessage(format!(
            "RPC bind rejected: result {result}, reason {reason}"
        )));
    }
    let syntax = SyntaxId::read_le(&mut cursor)?;
    if syntax != ndr32_syntax() {
        return Err(Error::InvalidMessage(format!(
            "RPC bind accepted an unexpected transfer syntax: {syntax:?}"
        )));
    }
    Ok(())
}

/// Builds a bind-ack body accepting NDR32. Used by tests standing in for
/// a server.
pub fn encode_bind_ack() -> crate::Result<Vec<u8>> {
    let mut body = Vec::new();
    body.extend_from_slice(&DEFAULT_FRAG_SIZE.to_le_bytes());
    body.extend_from_slice(&DEFAULT_FRAG_SIZE.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    let port = b"\\PIPE\\srvsvc\0";
    body.extend_from_slice(&(port.len() as u16).to_le_bytes());
    body.extend_from_slice(port);
    while body.len() % 4 != 0 {
        body.push(0);
    }
    body.push(1); // one result
    body.extend_from_slice(&[0u8; 3]);
    body.extend_from_slice(&0u16.to_le_bytes()); // acceptance
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&encode_le(&ndr32_syntax())?);
    Ok(body)
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
struct RequestBody {
    #[bw(try_calc(u32::try_from(stub.len())))]
    #[br(temp)]
    _alloc_hint: u32,
    context_id: u16,
    opnum: u16,
    #[br(parse_with = binrw::helpers::until_eof)]
    stub: Vec<u8>,
}

pub fn encode_request(call_id: u32, opnum: u16, stub: &[u8]) -> crate::Result<Vec<u8>> {
    let body = RequestBody {
        context_id: 0,
        opnum,
        stub: stub.to_vec(),
    };
    encode_pdu(PDU_TYPE_REQUEST, call_id, &encode_le(&body)?)
}

/// Extracts the stub data from a response PDU body.
pub fn response_stub(body: &[u8]) -> crate::Result<Vec<u8>> {
    if body.len() < 8 {
        return Err(Error::InvalidMessage("RPC response body too short".to_string()));
    }
    Ok(body[8..].to_vec())
}

/// Wraps stub data into a response PDU. Used by tests standing in for a
/// server.
pub fn encode_response(call_id: u32, stub: &[u8]) -> crate::Result<Vec<u8>> {
    let mut body = Vec::new();
    body.extend_from_slice(&(stub.len() as u32).to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes()); // context id
    body.push(0); // cancel count
    body.push(0);
    body.extend_from_slice(stub);
    encode_pdu(PDU_TYPE_RESPONSE, call_id, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdu_round_trip() {
        let pdu = encode_pdu(PDU_TYPE_REQUEST, 7, &[1, 2, 3]).unwrap();
        assert_eq!(pdu.len(), 19);
        assert_eq!(pdu[0], 5);
        let parsed = decode_pdu(&pdu).unwrap();
        assert_eq!(parsed.ptype, PDU_TYPE_REQUEST);
        assert_eq!(parsed.call_id, 7);
        assert_eq!(parsed.body, vec![1, 2, 3]);
    }

    #[test]
    fn test_bind_ack_round_trip() {
        let ack = encode_bind_ack().unwrap();
        check_bind_ack(&ack).unwrap();
    }

    #[test]
    fn test_request_and_response_stub() {
        let req = encode_request(2, 15, &[9, 9, 9]).unwrap();
        let parsed = decode_pdu(&req).unwrap();
        assert_eq!(parsed.ptype, PDU_TYPE_REQUEST);

        let resp = encode_response(2, &[4, 5, 6]).unwrap();
        let parsed = decode_pdu(&resp).unwrap();
        assert_eq!(parsed.ptype, PDU_TYPE_RESPONSE);
        assert_eq!(response_stub(&parsed.body).unwrap(), vec![4, 5, 6]);
    }
}
