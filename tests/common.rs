//! Shared test infrastructure: an in-process mock server that frames
//! NetBIOS session packets over a real TCP socket and answers with
//! scripted responses, plus header builders for both dialects.
#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread::JoinHandle;

use smbclient::packets::binrw_util::encode_le;
use smbclient::packets::smb1;
use smbclient::packets::smb2;
use smbclient::ClientConfig;

/// What the mock sends back for one received SMB message.
pub enum MockReply {
    /// Framed as a Session Message.
    Message(Vec<u8>),
    /// Written to the socket verbatim (malformed frames, negative
    /// session responses).
    Raw(Vec<u8>),
    /// Closes the connection.
    Close,
}

/// A scripted server on an ephemeral port. The handler receives each SMB
/// message payload and returns the replies to send.
pub struct MockServer {
    pub addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn spawn<F>(mut handler: F) -> MockServer
    where
        F: FnMut(&[u8]) -> Vec<MockReply> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            loop {
                let mut header = [0u8; 4];
                if stream.read_exact(&mut header).is_err() {
                    return;
                }
                let length = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
                let mut payload = vec![0u8; length];
                if stream.read_exact(&mut payload).is_err() {
                    return;
                }

                match header[0] {
                    // Session request: always accept.
                    0x81 => {
                        if stream.write_all(&[0x82, 0, 0, 0]).is_err() {
                            return;
                        }
                    }
                    0x00 => {
                        for reply in handler(&payload) {
                            match reply {
                                MockReply::Message(bytes) => {
                                    let mut frame = vec![0u8; 4];
                                    frame[1..4].copy_from_slice(&(bytes.len() as u32).to_be_bytes()[1..]);
                                    frame.extend_from_slice(&bytes);
                                    if stream.write_all(&frame).is_err() {
                                        return;
                                    }
                                }
                                MockReply::Raw(bytes) => {
                                    if stream.write_all(&bytes).is_err() {
                                        return;
                                    }
                                }
                                MockReply::Close => {
                                    stream.shutdown(Shutdown::Both).ok();
                                    return;
                                }
                            }
                        }
                    }
                    _ => return,
                }
            }
        });
        MockServer {
            addr,
            handle: Some(handle),
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl MockServer {
    /// A server that refuses the NetBIOS session request and closes.
    pub fn spawn_refusing_netbios() -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut header = [0u8; 4];
            if stream.read_exact(&mut header).is_err() {
                return;
            }
            let length = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
            let mut payload = vec![0u8; length];
            stream.read_exact(&mut payload).ok();
            // Negative session response: called name not present.
            stream.write_all(&[0x83, 0, 0, 1, 0x82]).ok();
            stream.shutdown(Shutdown::Both).ok();
        });
        MockServer {
            addr,
            handle: Some(handle),
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        // Poke the listener loop awake if it never accepted.
        TcpStream::connect(self.addr).ok();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

/// Client config pointing at a mock server, with a short timeout so
/// negative tests stay fast.
pub fn test_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        port: Some(server.port()),
        timeout: std::time::Duration::from_secs(2),
        machine_name: "TESTBOX".to_string(),
        ..Default::default()
    }
}

/// Builds an SMB2 response header answering `request`, granting
/// `credits`.
pub fn smb2_response_header(request: &smb2::Header, status: u32, credits: u16) -> smb2::Header {
    smb2::Header {
        credit_charge: request.credit_charge,
        status,
        command: request.command,
        credit_request: credits,
        flags: smb2::HeaderFlags::new().with_server_to_redir(true),
        next_command: 0,
        message_id: request.message_id,
        tree_id: request.tree_id.or(Some(0)),
        async_id: None,
        session_id: request.session_id,
        signature: 0,
    }
}

pub fn smb2_reply(message: smb2::Message) -> MockReply {
    MockReply::Message(message.encode().expect("encode smb2 reply"))
}

/// Builds an SMB1 response header answering `request`.
pub fn smb1_response_header(request: &smb1::Header, status: u32) -> smb1::Header {
    smb1::Header {
        command: request.command,
        status,
        flags: smb1::HeaderFlags::new().with_reply(true),
        flags2: request.flags2,
        pid_high: request.pid_high,
        security_features: 0,
        tid: request.tid,
        pid_low: request.pid_low,
        uid: request.uid,
        mid: request.mid,
    }
}

pub fn smb1_reply(message: smb1::Message) -> MockReply {
    MockReply::Message(message.encode().expect("encode smb1 reply"))
}

/// A standard mock negotiate response: dialect 2.1, 1 MiB transfer
/// limits (the client clamps to 64 KiB), one credit granted.
pub fn smb2_negotiate_response(request: &smb2::Message) -> MockReply {
    use smbclient::packets::binrw_util::FileTime;
    use smbclient::packets::guid::Guid;

    let body = smb2::NegotiateResponse {
        security_mode: smb2::NegotiateSecurityMode::new().with_signing_enabled(true),
        dialect_revision: smb2::Dialect::Smb021,
        server_guid: Guid::from([3u8; 16]),
        capabilities: smb2::GlobalCapabilities::new(),
        max_transact_size: 1 << 20,
        max_read_size: 1 << 20,
        max_write_size: 1 << 20,
        system_time: FileTime::now(),
        server_start_time: FileTime::default(),
        buffer: Vec::new(),
    };
    smb2_reply(smb2::Message {
        header: smb2_response_header(&request.header, 0, 1),
        content: smb2::Content::NegotiateResponse(body),
    })
}

/// Answers the two session setup rounds: a challenge under
/// `STATUS_MORE_PROCESSING_REQUIRED`, then `final_status`.
pub fn smb2_session_setup_reply(
    request: &smb2::Message,
    round: u32,
    session_id: u64,
    final_status: u32,
) -> MockReply {
    use smbclient::Status;

    if round == 0 {
        let mut header = smb2_response_header(
            &request.header,
            Status::MoreProcessingRequired as u32,
            1,
        );
        header.session_id = session_id;
        smb2_reply(smb2::Message {
            header,
            content: smb2::Content::SessionSetupResponse(smb2::SessionSetupResponse::new(
                ntlm_challenge_token(),
            )),
        })
    } else if final_status == 0 {
        smb2_reply(smb2::Message {
            header: smb2_response_header(&request.header, 0, 1),
            content: smb2::Content::SessionSetupResponse(smb2::SessionSetupResponse::new(
                Vec::new(),
            )),
        })
    } else {
        smb2_reply(smb2::Message {
            header: smb2_response_header(&request.header, final_status, 1),
            content: smb2::Content::ErrorResponse(smb2::ErrorResponse::default()),
        })
    }
}

/// A plausible NTLM CHALLENGE message: the fields sspi's NTLM
/// implementation needs to produce an AUTHENTICATE token.
pub fn ntlm_challenge_token() -> Vec<u8> {
    use smbclient::auth::ntlm::AvPair;

    const FLAGS: u32 = 0x0000_0001 // unicode
        | 0x0000_0200 // NTLM
        | 0x0000_8000 // always sign
        | 0x0001_0000 // target type domain
        | 0x0008_0000 // extended session security
        | 0x0080_0000 // target info
        | 0x2000_0000 // 128-bit
        | 0x8000_0000; // 56-bit

    let target_name: Vec<u8> = "DOM".encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
    let mut target_info = Vec::new();
    for pair in [
        AvPair::new(AvPair::NB_DOMAIN_NAME, utf16(b"DOM")),
        AvPair::new(AvPair::NB_COMPUTER_NAME, utf16(b"SRV")),
        AvPair::new(AvPair::EOL, Vec::new()),
    ] {
        target_info.extend_from_slice(&encode_le(&pair).expect("encode av pair"));
    }

    let mut token = Vec::new();
    token.extend_from_slice(b"NTLMSSP\0");
    token.extend_from_slice(&2u32.to_le_bytes());
    // Target name fields: after the 48-byte fixed part.
    let target_name_offset = 48u32;
    token.extend_from_slice(&(target_name.len() as u16).to_le_bytes());
    token.extend_from_slice(&(target_name.len() as u16).to_le_bytes());
    token.extend_from_slice(&target_name_offset.to_le_bytes());
    token.extend_from_slice(&FLAGS.to_le_bytes());
    token.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    token.extend_from_slice(&[0u8; 8]); // reserved
    let target_info_offset = target_name_offset + target_name.len() as u32;
    token.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
    token.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
    token.extend_from_slice(&target_info_offset.to_le_bytes());
    assert_eq!(token.len(), 48);
    token.extend_from_slice(&target_name);
    token.extend_from_slice(&target_info);
    token
}

fn utf16(ascii: &[u8]) -> Vec<u8> {
    ascii.iter().flat_map(|&b| [b, 0]).collect()
}
