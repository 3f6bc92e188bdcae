use std::io::Cursor;

use binrw::prelude::*;

use super::file::{
    CloseRequest, CloseResponse, NtCreateRequest, NtCreateResponse, ReadRequest, ReadResponse,
    WriteRequest, WriteResponse,
};
use super::header::{Command, Header};
use super::negotiate::{NegotiateRequest, NegotiateResponse};
use super::session_setup::{
    EchoRequest, EchoResponse, LogoffRequest, LogoffResponse, SessionSetupRequest,
    SessionSetupRequestExtended, SessionSetupResponse, SessionSetupResponseExtended,
};
use super::transaction::{
    NtTransactRequest, NtTransactResponse, Transaction2Request, Transaction2Response,
};
use super::tree::{
    TreeConnectRequest, TreeConnectResponse, TreeDisconnectRequest, TreeDisconnectResponse,
};

/// Uninterpreted SMB1 body: word and byte regions kept raw. Used for
/// error responses and commands this client does not model (for example
/// the LockingAndX oplock break).
#[binrw::binrw]
#[derive(Debug, Default, PartialEq, Eq)]
#[brw(little)]
pub struct RawBody {
    #[bw(try_calc(u8::try_from(words.len() / 2)))]
    word_count: u8,
    #[br(count = word_count as usize * 2)]
    pub words: Vec<u8>,
    #[bw(try_calc(u16::try_from(bytes.len())))]
    byte_count: u16,
    #[br(count = byte_count)]
    pub bytes: Vec<u8>,
}

/// An SMB1 message body, dispatched on (command, reply flag) with
/// backtracking between request shapes that share a command code. Falls
/// back to [`RawBody`] for anything unmodeled, including error responses
/// (whose word and byte regions are empty).
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
#[br(import(command: Command, reply: bool))]
pub enum Body {
    #[br(pre_assert(!reply && command == Command::Negotiate))]
    NegotiateRequest(NegotiateRequest),
    #[br(pre_assert(reply && command == Command::Negotiate))]
    NegotiateResponse(NegotiateResponse),
    #[br(pre_assert(!reply && command == Command::SessionSetupAndX))]
    SessionSetupRequestExtended(SessionSetupRequestExtended),
    #[br(pre_assert(!reply && command == Command::SessionSetupAndX))]
    SessionSetupRequest(SessionSetupRequest),
    #[br(pre_assert(reply && command == Command::SessionSetupAndX))]
    SessionSetupResponseExtended(SessionSetupResponseExtended),
    #[br(pre_assert(reply && command == Command::SessionSetupAndX))]
    SessionSetupResponse(SessionSetupResponse),
    #[br(pre_assert(!reply && command == Command::TreeConnectAndX))]
    TreeConnectRequest(TreeConnectRequest),
    #[br(pre_assert(reply && command == Command::TreeConnectAndX))]
    TreeConnectResponse(TreeConnectResponse),
    #[br(pre_assert(!reply && command == Command::TreeDisconnect))]
    TreeDisconnectRequest(TreeDisconnectRequest),
    #[br(pre_assert(reply && command == Command::TreeDisconnect))]
    TreeDisconnectResponse(TreeDisconnectResponse),
    #[br(pre_assert(!reply && command == Command::LogoffAndX))]
    LogoffRequest(LogoffRequest),
    #[br(pre_assert(reply && command == Command::LogoffAndX))]
    LogoffResponse(LogoffResponse),
    #[br(pre_assert(!reply && command == Command::Echo))]
    EchoRequest(EchoRequest),
    #[br(pre_assert(reply && command == Command::Echo))]
    EchoResponse(EchoResponse),
    #[br(pre_assert(!reply && command == Command::NtCreateAndX))]
    NtCreateRequest(NtCreateRequest),
    #[br(pre_assert(reply && command == Command::NtCreateAndX))]
    NtCreateResponse(NtCreateResponse),
    #[br(pre_assert(!reply && command == Command::Close))]
    CloseRequest(CloseRequest),
    #[br(pre_assert(reply && command == Command::Close))]
    CloseResponse(CloseResponse),
    #[br(pre_assert(!reply && command == Command::ReadAndX))]
    ReadRequest(ReadRequest),
    #[br(pre_assert(reply && command == Command::ReadAndX))]
    ReadResponse(ReadResponse),
    #[br(pre_assert(!reply && command == Command::WriteAndX))]
    WriteRequest(WriteRequest),
    #[br(pre_assert(reply && command == Command::WriteAndX))]
    WriteResponse(WriteResponse),
    #[br(pre_assert(!reply && command == Command::Transaction2))]
    Transaction2Request(Transaction2Request),
    #[br(pre_assert(reply && command == Command::Transaction2))]
    Transaction2Response(Transaction2Response),
    #[br(pre_assert(!reply && command == Command::NtTransact))]
    NtTransactRequest(NtTransactRequest),
    #[br(pre_assert(reply && command == Command::NtTransact))]
    NtTransactResponse(NtTransactResponse),
    Raw(RawBody),
}

/// A full SMB1 message: 32-byte header plus one (un-chained) body.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
#[brw(little)]
pub struct Message {
    pub header: Header,
    #[br(args(header.command, header.flags.reply()))]
    pub body: Body,
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
    use crate::packets::smb1::header::{HeaderFlags, HeaderFlags2};
    use crate::packets::status::Status;

    fn request_header(command: Command) -> Header {
        Header {
            command,
            status: 0,
            flags: HeaderFlags::new()
                .with_case_insensitive(true)
                .with_canonicalized_paths(true),
            flags2: HeaderFlags2::new()
                .with_long_names_allowed(true)
                .with_is_long_name(true)
                .with_nt_status(true)
                .with_unicode(true),
            pid_high: 0,
            security_features: 0,
            tid: 0,
            pid_low: 0,
            uid: 0,
            mid: 0,
        }
    }

    fn response_header(command: Command, status: u32) -> Header {
        let mut header = request_header(command);
        header.flags = header.flags.with_reply(true);
        header.status = status;
        header
    }

    #[test]
    fn test_negotiate_request_round_trip() {
        let msg = Message {
            header: request_header(Command::Negotiate),
            body: Body::NegotiateRequest(NegotiateRequest::default()),
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(&bytes[..4], b"\xffSMB");
        let parsed = Message::decode(&bytes).unwrap();
        assert!(matches!(parsed.body, Body::NegotiateRequest(_)));
    }

    #[test]
    fn test_error_response_falls_back_to_raw() {
        let msg = Message {
            header: response_header(Command::NtCreateAndX, Status::ObjectNameNotFound as u32),
            body: Body::Raw(RawBody::default()),
        };
        let bytes = msg.encode().unwrap();
        let parsed = Message::decode(&bytes).unwrap();
        assert!(matches!(parsed.body, Body::Raw(_)));
        assert_eq!(parsed.header.status, Status::ObjectNameNotFound as u32);
    }

    #[test]
    fn test_read_response_round_trip() {
        let payload: Vec<u8> = (0..100u8).collect();
        let msg = Message {
            header: response_header(Command::ReadAndX, 0),
            body: Body::ReadResponse(ReadResponse::new(payload.clone())),
        };
        let bytes = msg.encode().unwrap();
        let parsed = Message::decode(&bytes).unwrap();
        match parsed.body {
            Body::ReadResponse(resp) => assert_eq!(resp.data, payload),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_session_setup_request_shapes_disambiguate() {
        let extended = Message {
            header: request_header(Command::SessionSetupAndX),
            body: Body::SessionSetupRequestExtended(SessionSetupRequestExtended::new(
                vec![0xAB; 40],
                Default::default(),
                65535,
                1,
                true,
            )),
        };
        let parsed = Message::decode(&extended.encode().unwrap()).unwrap();
        assert!(matches!(parsed.body, Body::SessionSetupRequestExtended(_)));

        let classic = Message {
            header: request_header(Command::SessionSetupAndX),
            body: Body::SessionSetupRequest(SessionSetupRequest::new(
                vec![0xAA; 24],
                vec![0xBB; 16],
                "user",
                "DOM",
                Default::default(),
                65535,
                1,
                true,
            )),
        };
        let parsed = Message::decode(&classic.encode().unwrap()).unwrap();
        assert!(matches!(parsed.body, Body::SessionSetupRequest(_)));
    }

    #[test]
    fn test_transaction2_round_trip() {
        let msg = Message {
            header: request_header(Command::Transaction2),
            body: Body::Transaction2Request(Transaction2Request::new(
                crate::packets::smb1::transaction::trans2::FIND_FIRST2,
                vec![1, 2, 3, 4],
                vec![],
                16644,
            )),
        };
        let parsed = Message::decode(&msg.encode().unwrap()).unwrap();
        match parsed.body {
            Body::Transaction2Request(req) => {
                assert_eq!(req.parameters, vec![1, 2, 3, 4]);
                assert!(req.data.is_empty());
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }
}
