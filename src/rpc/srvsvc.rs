//! The Server Service `NetrShareEnum` call (MS-SRVS §3.1.4.8) at
//! information level 1, spoken in NDR32 over the `srvsvc` pipe.

use std::io::{Cursor, Read};

use binrw::prelude::*;

use crate::filestore::{CreateFileArgs, FileStore};
use crate::packets::binrw_util::{from_utf16_le, to_utf16_le};
use crate::packets::smb2::FsctlCode;
use crate::rpc;
use crate::Error;

const SRVSVC_PIPE: &str = "srvsvc";
const NETR_SHARE_ENUM_OPNUM: u16 = 15;
const BIND_CALL_ID: u32 = 1;
const ENUM_CALL_ID: u32 = 2;

/// STYPE special-share flag bits.
const STYPE_MASK: u32 = 0x0FFFFFFF;
pub const STYPE_DISKTREE: u32 = 0;
pub const STYPE_PRINTQ: u32 = 1;
pub const STYPE_DEVICE: u32 = 2;
pub const STYPE_IPC: u32 = 3;
pub const STYPE_SPECIAL: u32 = 0x80000000;
pub const STYPE_TEMPORARY: u32 = 0x40000000;

/// One `SHARE_INFO_1` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInfo1 {
    pub name: String,
    pub share_type: u32,
    pub remark: String,
}

impl ShareInfo1 {
    pub fn new(name: &str, share_type: u32, remark: &str) -> Self {
        ShareInfo1 {
            name: name.to_string(),
            share_type,
            remark: remark.to_string(),
        }
    }

    /// Whether this is a disk share (ignoring the special/temporary
    /// flags).
    pub fn is_disk(&self) -> bool {
        self.share_type & STYPE_MASK == STYPE_DISKTREE
    }
}

fn srvsvc_syntax() -> rpc::SyntaxId {
    rpc::SyntaxId {
        uuid: "4b324fc8-1670-01d3-1278-5a47bf6ee188".parse().unwrap(),
        version: 3,
        version_minor: 0,
    }
}

/// Enumerates the shares of `server_name` through an already-connected
/// IPC$ tree: opens the `srvsvc` pipe, binds, calls `NetrShareEnum`, and
/// closes the pipe.
pub fn net_share_enum(
    store: &dyn FileStore,
    server_name: &str,
) -> crate::Result<Vec<ShareInfo1>> {
    let (handle, _) = store.create_file(SRVSVC_PIPE, &CreateFileArgs::pipe())?;
    let result = run_share_enum(store, &handle, server_name);
    store.close_file(&handle).ok();
    result
}

fn run_share_enum(
    store: &dyn FileStore,
    handle: &crate::filestore::FileHandle,
    server_name: &str,
) -> crate::Result<Vec<ShareInfo1>> {
    // Bind the pipe to the Server Service interface.
    let bind = rpc::encode_bind(&srvsvc_syntax(), BIND_CALL_ID)?;
    let bind_reply = store.device_io_control(
        handle,
        FsctlCode::PipeTransceive as u32,
        &bind,
        4280,
    )?;
    let bind_pdu = rpc::decode_pdu(&bind_reply)?;
    if bind_pdu.ptype != rpc::PDU_TYPE_BIND_ACK {
        return Err(Error::InvalidMessage(format!(
            "Expected RPC bind-ack, got PDU type {}",
            bind_pdu.ptype
        )));
    }
    rpc::check_bind_ack(&bind_pdu.body)?;

    // Issue the enumeration.
    let stub = encode_share_enum_request(server_name);
    let request = rpc::encode_request(ENUM_CALL_ID, NETR_SHARE_ENUM_OPNUM, &stub)?;
    let reply = store.device_io_control(
        handle,
        FsctlCode::PipeTransceive as u32,
        &request,
        65536,
    )?;
    let reply_pdu = rpc::decode_pdu(&reply)?;
    if reply_pdu.ptype != rpc::PDU_TYPE_RESPONSE {
        return Err(Error::InvalidMessage(format!(
            "Expected RPC response, got PDU type {}",
            reply_pdu.ptype
        )));
    }
    let stub = rpc::response_stub(&reply_pdu.body)?;
    decode_share_enum_response(&stub)
}

struct NdrWriter {
    buf: Vec<u8>,
    next_ref_id: u32,
}

impl NdrWriter {
    fn new() -> Self {
        NdrWriter {
            buf: Vec::new(),
            next_ref_id: 0x0002_0000,
        }
    }

    fn align4(&mut self) {
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn ref_id(&mut self) -> u32 {
        let id = self.next_ref_id;
        self.next_ref_id += 4;
        self.u32(id);
        id
    }

    fn null_ptr(&mut self) {
        self.u32(0);
    }

    /// Conformant varying wide string, null-terminated, 4-aligned after.
    fn wstring(&mut self, value: &str) {
        let mut chars = to_utf16_le(value);
        chars.extend_from_slice(&[0, 0]);
        let count = (chars.len() / 2) as u32;
        self.u32(count);
        self.u32(0);
        self.u32(count);
        self.buf.extend_from_slice(&chars);
        self.align4();
    }
}

struct NdrReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> NdrReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        NdrReader {
            cursor: Cursor::new(data),
        }
    }

    fn align4(&mut self) {
        let misalignment = self.cursor.position() % 4;
        if misalignment != 0 {
            self.cursor.set_position(self.cursor.position() + 4 - misalignment);
        }
    }

    fn u32(&mut self) -> crate::Result<u32> {
        Ok(u32::read_le(&mut self.cursor)?)
    }

    /// Conformant varying wide string with its trailing alignment.
    fn wstring(&mut self) -> crate::Result<String> {
        let _max_count = self.u32()?;
        let _offset = self.u32()?;
        let actual_count = self.u32()?;
        let mut chars = vec![0u8; actual_count as usize * 2];
        self.cursor.read_exact(&mut chars)?;
        self.align4();
        Ok(from_utf16_le(&chars))
    }
}

/// Builds the `NetrShareEnum` request stub: server name pointer, a level
/// 1 enum structure with an empty container, no preferred length cap and
/// a zero resume handle.
fn encode_share_enum_request(server_name: &str) -> Vec<u8> {
    let mut w = NdrWriter::new();
    w.ref_id();
    w.wstring(&format!(r"\\{server_name}"));
    w.u32(1); // level
    w.u32(1); // union discriminant
    w.ref_id(); // SHARE_INFO_1_CONTAINER*
    w.u32(0); // EntriesRead
    w.null_ptr(); // Buffer
    w.u32(u32::MAX); // PreferedMaximumLength
    w.ref_id(); // ResumeHandle*
    w.u32(0);
    w.buf
}

/// Parses the `NetrShareEnum` response stub into share records, checking
/// the trailing return status.
fn decode_share_enum_response(stub: &[u8]) -> crate::Result<Vec<ShareInfo1>> {
    let mut r = NdrReader::new(stub);
    let _level = r.u32()?;
    let _discriminant = r.u32()?;
    let container_ptr = r.u32()?;
    if container_ptr == 0 {
        return Err(Error::InvalidMessage(
            "NetrShareEnum returned no container".to_string(),
        ));
    }
    let entries_read = r.u32()?;
    let array_ptr = r.u32()?;

    let mut shares = Vec::with_capacity(entries_read as usize);
    if array_ptr != 0 && entries_read > 0 {
        let _max_count = r.u32()?;
        let mut refs = Vec::with_capacity(entries_read as usize);
        for _ in 0..entries_read {
            let name_ref = r.u32()?;
            let share_type = r.u32()?;
            let remark_ref = r.u32()?;
            refs.push((name_ref, share_type, remark_ref));
        }
        for (name_ref, share_type, remark_ref) in refs {
            let name = if name_ref != 0 { r.wstring()? } else { String::new() };
            let remark = if remark_ref != 0 { r.wstring()? } else { String::new() };
            shares.push(ShareInfo1 {
                name,
                share_type,
                remark,
            });
        }
    }

    let _total_entries = r.u32()?;
    let resume_ptr = r.u32()?;
    if resume_ptr != 0 {
        let _resume_handle = r.u32()?;
    }
    let status = r.u32()?;
    if status != 0 {
        return Err(Error::ServerError(status.try_into()?));
    }
    Ok(shares)
}

/// Builds a `NetrShareEnum` response stub. Used by tests standing in for
/// a server.
pub fn encode_share_enum_response(shares: &[ShareInfo1], status: u32) -> Vec<u8> {
    let mut w = NdrWriter::new();
    w.u32(1); // level
    w.u32(1); // union discriminant
    w.ref_id(); // container
    w.u32(shares.len() as u32); // EntriesRead
    if shares.is_empty() {
        w.null_ptr();
    } else {
        w.ref_id(); // array
        w.u32(shares.len() as u32); // conformance
        for share in shares {
            w.ref_id();
            w.u32(share.share_type);
            w.ref_id();
        }
        for share in shares {
            w.wstring(&share.name);
            w.wstring(&share.remark);
        }
    }
    w.u32(shares.len() as u32); // TotalEntries
    w.ref_id();
    w.u32(0); // resume handle
    w.u32(status);
    w.buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_enum_stub_round_trip() {
        let shares = vec![
            ShareInfo1::new("C$", STYPE_DISKTREE | STYPE_SPECIAL, "Default share"),
            ShareInfo1::new("IPC$", STYPE_IPC | STYPE_SPECIAL, "Remote IPC"),
            ShareInfo1::new("Public", STYPE_DISKTREE, ""),
        ];
        let stub = encode_share_enum_response(&shares, 0);
        let parsed = decode_share_enum_response(&stub).unwrap();
        assert_eq!(parsed, shares);
    }

    #[test]
    fn test_disk_filter() {
        assert!(ShareInfo1::new("C$", STYPE_DISKTREE | STYPE_SPECIAL, "").is_disk());
        assert!(ShareInfo1::new("Public", STYPE_DISKTREE, "").is_disk());
        assert!(!ShareInfo1::new("IPC$", STYPE_IPC | STYPE_SPECIAL, "").is_disk());
        assert!(!ShareInfo1::new("printer", STYPE_PRINTQ, "").is_disk());
    }

    #[test]
    fn test_error_status_propagates() {
        let stub = encode_share_enum_response(&[], 0xC0000022);
        let result = decode_share_enum_response(&stub);
        assert!(matches!(result, Err(Error::ServerError(_))));
    }

    #[test]
    fn test_request_stub_shape() {
        let stub = encode_share_enum_request("192.0.2.1");
        // ref id, then the conformant varying string header.
        assert_eq!(&stub[4..8], &12u32.to_le_bytes()); // "\\\\192.0.2.1" + null
        assert_eq!(&stub[8..12], &0u32.to_le_bytes());
        assert_eq!(&stub[12..16], &12u32.to_le_bytes());
    }
}
