use std::io::Cursor;

use binrw::prelude::*;

use crate::packets::status::Status;

use super::create::{CreateRequest, CreateResponse, CloseRequest, CloseResponse};
use super::file::{ReadRequest, ReadResponse, WriteRequest, WriteResponse};
use super::header::{Command, FileId, Header};
use super::info::{QueryInfoRequest, QueryInfoResponse, SetInfoRequest, SetInfoResponse};
use super::ioctl::{IoctlRequest, IoctlResponse};
use super::negotiate::{NegotiateRequest, NegotiateResponse};
use super::query_dir::{QueryDirectoryRequest, QueryDirectoryResponse};
use super::session::{
    EchoRequest, EchoResponse, LogoffRequest, LogoffResponse, SessionSetupRequest,
    SessionSetupResponse,
};
use super::tree::{
    TreeConnectRequest, TreeConnectResponse, TreeDisconnectRequest, TreeDisconnectResponse,
};

/// The generic SMB2 error response body.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct ErrorResponse {
    #[bw(calc = 9)]
    #[br(assert(_structure_size == 9))]
    _structure_size: u16,
    pub error_context_count: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[bw(try_calc(u32::try_from(error_data.len())))]
    byte_count: u32,
    #[br(count = byte_count)]
    pub error_data: Vec<u8>,
}

impl Default for ErrorResponse {
    fn default() -> Self {
        ErrorResponse {
            error_context_count: 0,
            error_data: Vec::new(),
        }
    }
}

/// Server-initiated oplock break notification (`MessageId == u64::MAX`).
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct OplockBreakNotification {
    #[bw(calc = 24)]
    #[br(assert(_structure_size == 24))]
    _structure_size: u16,
    pub oplock_level: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    pub file_id: FileId,
}

/// An SMB2 message body, selected by command, direction and status when
/// parsing.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
#[br(import(command: Command, from_server: bool, payload: bool))]
pub enum Content {
    #[br(pre_assert(!from_server && command == Command::Negotiate))]
    NegotiateRequest(NegotiateRequest),
    #[br(pre_assert(from_server && payload && command == Command::Negotiate))]
    NegotiateResponse(NegotiateResponse),
    #[br(pre_assert(!from_server && command == Command::SessionSetup))]
    SessionSetupRequest(SessionSetupRequest),
    #[br(pre_assert(from_server && payload && command == Command::SessionSetup))]
    SessionSetupResponse(SessionSetupResponse),
    #[br(pre_assert(!from_server && command == Command::Logoff))]
    LogoffRequest(LogoffRequest),
    #[br(pre_assert(from_server && payload && command == Command::Logoff))]
    LogoffResponse(LogoffResponse),
    #[br(pre_assert(!from_server && command == Command::TreeConnect))]
    TreeConnectRequest(TreeConnectRequest),
    #[br(pre_assert(from_server && payload && command == Command::TreeConnect))]
    TreeConnectResponse(TreeConnectResponse),
    #[br(pre_assert(!from_server && command == Command::TreeDisconnect))]
    TreeDisconnectRequest(TreeDisconnectRequest),
    #[br(pre_assert(from_server && payload && command == Command::TreeDisconnect))]
    TreeDisconnectResponse(TreeDisconnectResponse),
    #[br(pre_assert(!from_server && command == Command::Create))]
    CreateRequest(CreateRequest),
    #[br(pre_assert(from_server && payload && command == Command::Create))]
    CreateResponse(CreateResponse),
    #[br(pre_assert(!from_server && command == Command::Close))]
    CloseRequest(CloseRequest),
    #[br(pre_assert(from_server && payload && command == Command::Close))]
    CloseResponse(CloseResponse),
    #[br(pre_assert(!from_server && command == Command::Read))]
    ReadRequest(ReadRequest),
    #[br(pre_assert(from_server && payload && command == Command::Read))]
    ReadResponse(ReadResponse),
    #[br(pre_assert(!from_server && command == Command::Write))]
    WriteRequest(WriteRequest),
    #[br(pre_assert(from_server && payload && command == Command::Write))]
    WriteResponse(WriteResponse),
    #[br(pre_assert(!from_server && command == Command::QueryDirectory))]
    QueryDirectoryRequest(QueryDirectoryRequest),
    #[br(pre_assert(from_server && payload && command == Command::QueryDirectory))]
    QueryDirectoryResponse(QueryDirectoryResponse),
    #[br(pre_assert(!from_server && command == Command::QueryInfo))]
    QueryInfoRequest(QueryInfoRequest),
    #[br(pre_assert(from_server && payload && command == Command::QueryInfo))]
    QueryInfoResponse(QueryInfoResponse),
    #[br(pre_assert(!from_server && command == Command::SetInfo))]
    SetInfoRequest(SetInfoRequest),
    #[br(pre_assert(from_server && payload && command == Command::SetInfo))]
    SetInfoResponse(SetInfoResponse),
    #[br(pre_assert(!from_server && command == Command::Ioctl))]
    IoctlRequest(IoctlRequest),
    #[br(pre_assert(from_server && payload && command == Command::Ioctl))]
    IoctlResponse(IoctlResponse),
    #[br(pre_assert(!from_server && command == Command::Echo))]
    EchoRequest(EchoRequest),
    #[br(pre_assert(from_server && payload && command == Command::Echo))]
    EchoResponse(EchoResponse),
    #[br(pre_assert(from_server && payload && command == Command::OplockBreak))]
    OplockBreakNotification(OplockBreakNotification),
    #[br(pre_assert(from_server && !payload))]
    ErrorResponse(ErrorResponse),
}

impl Content {
    /// The command a request body is sent under.
    pub fn command(&self) -> Command {
        match self {
            Content::NegotiateRequest(_) | Content::NegotiateResponse(_) => Command::Negotiate,
            Content::SessionSetupRequest(_) | Content::SessionSetupResponse(_) => {
                Command::SessionSetup
            }
            Content::LogoffRequest(_) | Content::LogoffResponse(_) => Command::Logoff,
            Content::TreeConnectRequest(_) | Content::TreeConnectResponse(_) => Command::TreeConnect,
            Content::TreeDisconnectRequest(_) | Content::TreeDisconnectResponse(_) => {
                Command::TreeDisconnect
            }
            Content::CreateRequest(_) | Content::CreateResponse(_) => Command::Create,
            Content::CloseRequest(_) | Content::CloseResponse(_) => Command::Close,
            Content::ReadRequest(_) | Content::ReadResponse(_) => Command::Read,
            Content::WriteRequest(_) | Content::WriteResponse(_) => Command::Write,
            Content::QueryDirectoryRequest(_) | Content::QueryDirectoryResponse(_) => {
                Command::QueryDirectory
            }
            Content::QueryInfoRequest(_) | Content::QueryInfoResponse(_) => Command::QueryInfo,
            Content::SetInfoRequest(_) | Content::SetInfoResponse(_) => Command::SetInfo,
            Content::IoctlRequest(_) | Content::IoctlResponse(_) => Command::Ioctl,
            Content::EchoRequest(_) | Content::EchoResponse(_) => Command::Echo,
            Content::OplockBreakNotification(_) => Command::OplockBreak,
            Content::ErrorResponse(_) => Command::Echo,
        }
    }

    /// Whether a response with the given status carries a command-specific
    /// payload rather than the generic error body.
    pub fn payload_expected(command: Command, status: u32) -> bool {
        match Status::try_from(status) {
            Ok(Status::Success) => true,
            Ok(Status::MoreProcessingRequired) => command == Command::SessionSetup,
            Ok(Status::BufferOverflow) => {
                matches!(command, Command::Ioctl | Command::Read)
            }
            _ => false,
        }
    }
}

/// A full SMB2 message: header plus body.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct Message {
    pub header: Header,
    #[br(args(header.command, header.flags.server_to_redir(), Content::payload_expected(header.command, header.status)))]
    pub content: Content,
}

impl Message {
    pub fn encode(&self) -> crate::Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    pub fn decode(data: &[u8]) -> crate::Result<Message> {
        Ok(Message::read(&mut Cursor::new(data))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::guid::Guid;
    use crate::packets::smb2::header::HeaderFlags;
    use crate::packets::smb2::negotiate::Dialect;

    fn request_header(command: Command) -> Header {
        Header {
            credit_charge: 1,
            status: 0,
            command,
            credit_request: 1,
            flags: HeaderFlags::new(),
            next_command: 0,
            message_id: 3,
            tree_id: Some(0),
            async_id: None,
            session_id: 0,
            signature: 0,
        }
    }

    fn response_header(command: Command, status: u32) -> Header {
        Header {
            flags: HeaderFlags::new().with_server_to_redir(true),
            status,
            ..request_header(command)
        }
    }

    #[test]
    fn test_negotiate_request_round_trip() {
        let msg = Message {
            header: request_header(Command::Negotiate),
            content: Content::NegotiateRequest(NegotiateRequest::new(Guid::from([7u8; 16]))),
        };
        let bytes = msg.encode().unwrap();
        let parsed = Message::decode(&bytes).unwrap();
        match parsed.content {
            Content::NegotiateRequest(req) => {
                assert_eq!(req.dialects, vec![Dialect::Smb0202, Dialect::Smb021]);
                assert_eq!(req.client_guid, Guid::from([7u8; 16]));
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn test_session_setup_buffer_offset() {
        let msg = Message {
            header: request_header(Command::SessionSetup),
            content: Content::SessionSetupRequest(SessionSetupRequest::new(vec![0xAA; 17])),
        };
        let bytes = msg.encode().unwrap();
        // Security buffer begins right after the 64-byte header plus the
        // 24-byte fixed part of the request.
        assert_eq!(&bytes[88..], &[0xAA; 17][..]);
        let parsed = Message::decode(&bytes).unwrap();
        match parsed.content {
            Content::SessionSetupRequest(req) => assert_eq!(req.buffer, vec![0xAA; 17]),
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn test_error_response_decode() {
        let msg = Message {
            header: response_header(Command::QueryDirectory, Status::NoMoreFiles as u32),
            content: Content::ErrorResponse(ErrorResponse::default()),
        };
        let bytes = msg.encode().unwrap();
        let parsed = Message::decode(&bytes).unwrap();
        assert!(matches!(parsed.content, Content::ErrorResponse(_)));
        assert_eq!(parsed.header.status, Status::NoMoreFiles as u32);
    }

    #[test]
    fn test_write_request_round_trip() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let msg = Message {
            header: request_header(Command::Write),
            content: Content::WriteRequest(WriteRequest::new(
                FileId {
                    persistent: 0x11,
                    volatile: 0x22,
                },
                4096,
                payload.clone(),
            )),
        };
        let bytes = msg.encode().unwrap();
        let parsed = Message::decode(&bytes).unwrap();
        match parsed.content {
            Content::WriteRequest(req) => {
                assert_eq!(req.buffer, payload);
                assert_eq!(req.offset, 4096);
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }
}
