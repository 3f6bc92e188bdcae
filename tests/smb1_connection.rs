//! SMB1 connection lifecycle: the negotiate capability contract, both
//! session setup flavors, and the NetBIOS transport handshake.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use common::*;
use smbclient::auth::ntlm::{ntlm_v2_proof, ntowf_v2};
use smbclient::packets::binrw_util::FileTime;
use smbclient::packets::smb1::{self, Body};
use smbclient::{AuthMethod, ClientConfig, Error, Smb1Client, Status, TransportKind};

const CHALLENGE: [u8; 8] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
const PASSWORD: &str = "Password";
const USER: &str = "User";
const DOMAIN: &str = "DOM";

fn base_capabilities() -> smb1::Capabilities {
    smb1::Capabilities::new()
        .with_nt_smbs(true)
        .with_rpc_remote_apis(true)
        .with_nt_status(true)
        .with_nt_find(true)
        .with_unicode(true)
        .with_large_files(true)
}

fn classic_negotiate_response(request: &smb1::Message, caps: smb1::Capabilities) -> MockReply {
    smb1_reply(smb1::Message {
        header: smb1_response_header(&request.header, 0),
        body: Body::NegotiateResponse(smb1::NegotiateResponse {
            dialect_index: 0,
            security_mode: 0x03,
            max_mpx_count: 16,
            max_number_vcs: 1,
            max_buffer_size: 16644,
            max_raw_size: 65536,
            session_key: 0,
            capabilities: caps,
            system_time: FileTime::now(),
            server_time_zone: 0,
            challenge: CHALLENGE.to_vec(),
            domain_raw: Vec::new(),
            server_guid: None,
            security_blob: Vec::new(),
        }),
    })
}

fn extended_negotiate_response(request: &smb1::Message) -> MockReply {
    smb1_reply(smb1::Message {
        header: smb1_response_header(&request.header, 0),
        body: Body::NegotiateResponse(smb1::NegotiateResponse {
            dialect_index: 0,
            security_mode: 0x03,
            max_mpx_count: 16,
            max_number_vcs: 1,
            max_buffer_size: 16644,
            max_raw_size: 65536,
            session_key: 0,
            capabilities: base_capabilities().with_extended_security(true),
            system_time: FileTime::now(),
            server_time_zone: 0,
            challenge: Vec::new(),
            domain_raw: Vec::new(),
            server_guid: Some(smbclient::packets::guid::Guid::from([5u8; 16])),
            security_blob: Vec::new(),
        }),
    })
}

/// A server that verifies the NTLMv2 proof computed against its own
/// challenge, exactly as a real domain member would.
fn pre_extended_server() -> MockServer {
    MockServer::spawn(move |payload| {
        let request = smb1::Message::decode(payload).expect("decode request");
        match &request.body {
            Body::NegotiateRequest(req) => {
                assert_eq!(req.dialects.len(), 1);
                vec![classic_negotiate_response(&request, base_capabilities())]
            }
            Body::SessionSetupRequest(req) => {
                assert_eq!(req.oem_password.len(), 24, "LMv2 response length");
                assert!(req.unicode_password.len() > 16, "NTLMv2 blob present");
                let proof = &req.unicode_password[..16];
                let blob = &req.unicode_password[16..];
                let key = ntowf_v2(PASSWORD, USER, DOMAIN).unwrap();
                let expected = ntlm_v2_proof(&key, &CHALLENGE, blob).unwrap();
                let status = if proof == expected {
                    Status::Success as u32
                } else {
                    Status::LogonFailure as u32
                };
                let mut header = smb1_response_header(&request.header, status);
                header.uid = 0x0801;
                let body = if status == 0 {
                    Body::SessionSetupResponse(smb1::SessionSetupResponse {
                        andx: Default::default(),
                        action: 0,
                        trailing: Vec::new(),
                    })
                } else {
                    Body::Raw(smb1::RawBody::default())
                };
                vec![smb1_reply(smb1::Message { header, body })]
            }
            Body::LogoffRequest(_) => vec![smb1_reply(smb1::Message {
                header: smb1_response_header(&request.header, 0),
                body: Body::LogoffResponse(smb1::LogoffResponse::default()),
            })],
            Body::EchoRequest(req) => vec![smb1_reply(smb1::Message {
                header: smb1_response_header(&request.header, 0),
                body: Body::EchoResponse(smb1::EchoResponse {
                    sequence_number: 1,
                    data: req.data.clone(),
                }),
            })],
            other => panic!("unexpected request: {other:?}"),
        }
    })
}

#[test_log::test]
fn test_pre_extended_ntlm_v2_login() {
    let server = pre_extended_server();
    let mut client = Smb1Client::new(test_config(&server));
    client.connect(&server.host()).expect("connect");

    let info = client.negotiate_info().expect("negotiated").clone();
    assert!(info.unicode);
    assert!(matches!(
        info.security,
        smbclient::smb1::Smb1Security::ServerChallenge(CHALLENGE)
    ));
    assert_eq!(info.server_max_buffer_size, 16644);

    let status = client
        .login(DOMAIN, USER, PASSWORD, AuthMethod::NtlmV2)
        .expect("login");
    assert_eq!(status, Status::Success);
    assert!(client.is_logged_in());

    assert_eq!(client.echo().expect("echo"), Status::Success);
    assert_eq!(client.logoff().expect("logoff"), Status::Success);
    assert!(!client.is_logged_in());
}

#[test_log::test]
fn test_pre_extended_wrong_password_fails_verification() {
    let server = pre_extended_server();
    let mut client = Smb1Client::new(test_config(&server));
    client.connect(&server.host()).expect("connect");
    let status = client
        .login(DOMAIN, USER, "not-the-password", AuthMethod::NtlmV2)
        .expect("login exchange");
    assert_eq!(status, Status::LogonFailure);
    assert!(!client.is_logged_in());
}

#[test_log::test]
fn test_v1_extended_session_security_is_rejected_locally() {
    let server = pre_extended_server();
    let mut client = Smb1Client::new(test_config(&server));
    client.connect(&server.host()).expect("connect");
    let result = client.login(
        DOMAIN,
        USER,
        PASSWORD,
        AuthMethod::NtlmV1ExtendedSessionSecurity,
    );
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test_log::test]
fn test_negotiate_rejects_missing_capabilities() {
    let server = MockServer::spawn(move |payload| {
        let request = smb1::Message::decode(payload).expect("decode request");
        // No RPC remote APIs: the capability contract fails.
        let caps = smb1::Capabilities::new()
            .with_nt_smbs(true)
            .with_nt_status(true);
        vec![classic_negotiate_response(&request, caps)]
    });
    let mut client = Smb1Client::new(test_config(&server));
    let result = client.connect(&server.host());
    assert!(matches!(result, Err(Error::NegotiationError(_))), "{result:?}");
    assert!(!client.is_connected());
}

#[test_log::test]
fn test_forced_extended_security_rejects_classic_response() {
    let server = MockServer::spawn(move |payload| {
        let request = smb1::Message::decode(payload).expect("decode request");
        vec![classic_negotiate_response(&request, base_capabilities())]
    });
    let config = ClientConfig {
        force_extended_security: true,
        ..test_config(&server)
    };
    let mut client = Smb1Client::new(config);
    let result = client.connect(&server.host());
    assert!(matches!(result, Err(Error::NegotiationError(_))), "{result:?}");
}

/// Scenario: NetBIOS transport, forced extended security, and a server
/// that fails the second setup round. The failure status is surfaced
/// verbatim and the session stays logged out.
#[test_log::test]
fn test_extended_security_login_failure_over_netbios() {
    let setup_round = Arc::new(AtomicU32::new(0));
    let server = MockServer::spawn(move |payload| {
        let request = smb1::Message::decode(payload).expect("decode request");
        match &request.body {
            Body::NegotiateRequest(_) => {
                assert!(request.header.flags2.extended_security());
                vec![extended_negotiate_response(&request)]
            }
            Body::SessionSetupRequestExtended(_) => {
                let round = setup_round.fetch_add(1, Ordering::SeqCst);
                if round == 0 {
                    let mut header = smb1_response_header(
                        &request.header,
                        Status::MoreProcessingRequired as u32,
                    );
                    header.uid = 0x0801;
                    vec![smb1_reply(smb1::Message {
                        header,
                        body: Body::SessionSetupResponseExtended(
                            smb1::SessionSetupResponseExtended::new(ntlm_challenge_token()),
                        ),
                    })]
                } else {
                    let mut header = smb1_response_header(
                        &request.header,
                        Status::LogonFailure as u32,
                    );
                    header.uid = 0x0801;
                    vec![smb1_reply(smb1::Message {
                        header,
                        body: Body::Raw(smb1::RawBody::default()),
                    })]
                }
            }
            other => panic!("unexpected request: {other:?}"),
        }
    });

    let config = ClientConfig {
        transport: TransportKind::NetBios,
        force_extended_security: true,
        ..test_config(&server)
    };
    let mut client = Smb1Client::new(config);
    client.connect(&server.host()).expect("connect");
    let status = client
        .login(DOMAIN, USER, PASSWORD, AuthMethod::NtlmV2)
        .expect("login exchange");
    assert_eq!(status, Status::LogonFailure);
    assert!(!client.is_logged_in());
}

#[test_log::test]
fn test_netbios_session_refusal_fails_connect() {
    let server = MockServer::spawn_refusing_netbios();
    let config = ClientConfig {
        transport: TransportKind::NetBios,
        ..test_config(&server)
    };
    let mut client = Smb1Client::new(config);
    let result = client.connect(&server.host());
    assert!(matches!(result, Err(Error::NegotiationError(_))), "{result:?}");
    assert!(!client.is_connected());
}

#[test_log::test]
fn test_lifecycle_misuse_is_invalid_state() {
    let server = pre_extended_server();
    let mut client = Smb1Client::new(test_config(&server));
    assert!(matches!(
        client.login(DOMAIN, USER, PASSWORD, AuthMethod::NtlmV2),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        client.tree_connect(r"\\127.0.0.1\Public"),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(client.list_shares(), Err(Error::InvalidState(_))));

    client.connect(&server.host()).expect("connect");
    assert!(matches!(
        client.tree_connect(r"\\127.0.0.1\Public"),
        Err(Error::InvalidState(_))
    ));
}
