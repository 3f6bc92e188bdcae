//! SMB1 file store behavior over the legacy AndX and transaction
//! commands: create/read/write/close, FindFirst2/FindNext2 paging,
//! info-level passthrough, NT Transact IOCTL, and the transfer size
//! formulas.

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use smbclient::packets::binrw_util::{decode_le, encode_le, FileTime};
use smbclient::packets::fscc::{
    CreateDisposition, FileDirectoryInformation, FileInformation, FileStandardInformation,
    QueryFileInfoClass,
};
use smbclient::packets::smb1::{self, trans2, Body};
use smbclient::{AuthMethod, CreateFileArgs, Error, FileStatus, FileStore, Smb1Client, Status};

const CHALLENGE: [u8; 8] = [9, 8, 7, 6, 5, 4, 3, 2];
const FID: u16 = 0x4007;

#[derive(Default)]
struct ServerState {
    file_data: Mutex<Vec<u8>>,
}

fn caps() -> smb1::Capabilities {
    smb1::Capabilities::new()
        .with_nt_smbs(true)
        .with_rpc_remote_apis(true)
        .with_nt_status(true)
        .with_nt_find(true)
        .with_unicode(true)
        .with_large_files(true)
        .with_info_level_passthrough(true)
}

fn file_server(state: Arc<ServerState>) -> MockServer {
    MockServer::spawn(move |payload| {
        let request = smb1::Message::decode(payload).expect("decode request");
        let header = request.header.clone();
        let ok = |body| smb1_reply(smb1::Message {
            header: smb1_response_header(&header, 0),
            body,
        });
        match &request.body {
            Body::NegotiateRequest(_) => vec![smb1_reply(smb1::Message {
                header: smb1_response_header(&header, 0),
                body: Body::NegotiateResponse(smb1::NegotiateResponse {
                    dialect_index: 0,
                    security_mode: 0x03,
                    max_mpx_count: 16,
                    max_number_vcs: 1,
                    max_buffer_size: 16644,
                    max_raw_size: 65536,
                    session_key: 0,
                    capabilities: caps(),
                    system_time: FileTime::now(),
                    server_time_zone: 0,
                    challenge: CHALLENGE.to_vec(),
                    domain_raw: Vec::new(),
                    server_guid: None,
                    security_blob: Vec::new(),
                }),
            })],
            Body::SessionSetupRequest(_) => {
                let mut response_header = smb1_response_header(&header, 0);
                response_header.uid = 0x0801;
                vec![smb1_reply(smb1::Message {
                    header: response_header,
                    body: Body::SessionSetupResponse(smb1::SessionSetupResponse {
                        andx: Default::default(),
                        action: 0,
                        trailing: Vec::new(),
                    }),
                })]
            }
            Body::TreeConnectRequest(_) => {
                let mut response_header = smb1_response_header(&header, 0);
                response_header.tid = 5;
                vec![smb1_reply(smb1::Message {
                    header: response_header,
                    body: Body::TreeConnectResponse(smb1::TreeConnectResponse::new("A:")),
                })]
            }
            Body::NtCreateRequest(req) => {
                let action = match req.create_disposition {
                    CreateDisposition::Create => 2,
                    _ => 1,
                };
                vec![ok(Body::NtCreateResponse(smb1::NtCreateResponse::opened(
                    FID, action, false,
                )))]
            }
            Body::WriteRequest(req) => {
                let mut data = state.file_data.lock().unwrap();
                let end = req.offset as usize + req.data.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[req.offset as usize..end].copy_from_slice(&req.data);
                vec![ok(Body::WriteResponse(smb1::WriteResponse {
                    andx: Default::default(),
                    count: req.data.len() as u16,
                    available: 0,
                }))]
            }
            Body::ReadRequest(req) => {
                let data = state.file_data.lock().unwrap();
                let start = (req.offset as usize).min(data.len());
                let end = (start + req.max_count as usize).min(data.len());
                vec![ok(Body::ReadResponse(smb1::ReadResponse::new(
                    data[start..end].to_vec(),
                )))]
            }
            Body::CloseRequest(req) => {
                assert_eq!(req.fid, FID);
                vec![ok(Body::CloseResponse(smb1::CloseResponse::default()))]
            }
            Body::Transaction2Request(req) => vec![ok(trans2_response(req))],
            Body::NtTransactRequest(req) => {
                // Echo the IOCTL input back, reversed.
                let setup: smb1::IoctlSetup = decode_le(&req.setup).expect("ioctl setup");
                assert_eq!(setup.fid, FID);
                assert_eq!(setup.is_fsctl, 1);
                let mut output = req.data.clone();
                output.reverse();
                vec![ok(Body::NtTransactResponse(smb1::NtTransactResponse::new(
                    Vec::new(),
                    output,
                )))]
            }
            Body::TreeDisconnectRequest(_) => {
                vec![ok(Body::TreeDisconnectResponse(
                    smb1::TreeDisconnectResponse::default(),
                ))]
            }
            Body::LogoffRequest(_) => {
                vec![ok(Body::LogoffResponse(smb1::LogoffResponse::default()))]
            }
            other => panic!("unexpected request: {other:?}"),
        }
    })
}

fn trans2_response(req: &smb1::Transaction2Request) -> Body {
    match req.subcommand {
        trans2::FIND_FIRST2 => {
            let entries = vec![
                FileDirectoryInformation::named("."),
                FileDirectoryInformation::named(".."),
                FileDirectoryInformation::named("alpha.txt"),
            ];
            let params = encode_le(&smb1::FindFirst2ReturnParams {
                sid: 0x0001,
                search_count: entries.len() as u16,
                end_of_search: 0,
                ea_error_offset: 0,
                last_name_offset: 0,
            })
            .unwrap();
            let data = FileDirectoryInformation::encode_chain(&entries).unwrap();
            Body::Transaction2Response(smb1::Transaction2Response::new(params, data))
        }
        trans2::FIND_NEXT2 => {
            let entries = vec![FileDirectoryInformation::named("beta.txt")];
            let params = encode_le(&smb1::FindNext2ReturnParams {
                search_count: entries.len() as u16,
                end_of_search: 1,
                ea_error_offset: 0,
                last_name_offset: 0,
            })
            .unwrap();
            let data = FileDirectoryInformation::encode_chain(&entries).unwrap();
            Body::Transaction2Response(smb1::Transaction2Response::new(params, data))
        }
        trans2::QUERY_FILE_INFORMATION => {
            let params: smb1::QueryFileInfoParams = decode_le(&req.parameters).unwrap();
            // FileStandardInformation through the passthrough base.
            assert_eq!(params.information_level, 1005);
            assert_eq!(params.fid, FID);
            let info = FileStandardInformation {
                allocation_size: 4096,
                end_of_file: 11,
                number_of_links: 1,
                delete_pending: false,
                directory: false,
            };
            Body::Transaction2Response(smb1::Transaction2Response::new(
                Vec::new(),
                encode_le(&info).unwrap(),
            ))
        }
        other => panic!("unexpected trans2 subcommand {other:#06x}"),
    }
}

fn connected_store(client: &mut Smb1Client, server: &MockServer) -> smbclient::smb1::Smb1FileStore {
    client.connect(&server.host()).expect("connect");
    let status = client
        .login("DOM", "User", "Password", AuthMethod::NtlmV2)
        .expect("login");
    assert_eq!(status, Status::Success);
    client
        .tree_connect(&format!(r"\\{}\Public", server.host()))
        .expect("tree connect")
}

#[test_log::test]
fn test_create_write_read_close() {
    let state = Arc::new(ServerState::default());
    let server = file_server(state.clone());
    let mut client = Smb1Client::new(test_config(&server));
    let tree = connected_store(&mut client, &server);
    assert_eq!(tree.tree_id(), 5);

    let (handle, file_status) = tree
        .create_file(
            "hello.txt",
            &CreateFileArgs::read_write(CreateDisposition::Create),
        )
        .expect("create");
    assert_eq!(file_status, FileStatus::Created);

    let written = tree.write_file(&handle, 0, b"hello world").expect("write");
    assert_eq!(written, 11);
    let read_back = tree.read_file(&handle, 0, 64).expect("read");
    assert_eq!(read_back, b"hello world");

    // Info-level passthrough query.
    let info = tree
        .get_file_information(&handle, QueryFileInfoClass::Standard)
        .expect("query info");
    match info {
        FileInformation::Standard(standard) => assert_eq!(standard.end_of_file, 11),
        other => panic!("unexpected info: {other:?}"),
    }

    tree.close_file(&handle).expect("close");
    tree.disconnect().expect("tree disconnect");
}

#[test_log::test]
fn test_find_first_and_next_paging() {
    let state = Arc::new(ServerState::default());
    let server = file_server(state);
    let mut client = Smb1Client::new(test_config(&server));
    let tree = connected_store(&mut client, &server);

    let (entries, status) = tree.query_directory(None, r"dir\*").expect("enumerate");
    assert_eq!(status, Status::NoMoreFiles);
    assert_eq!(
        entries.iter().map(|e| e.file_name.as_str()).collect::<Vec<_>>(),
        vec![".", "..", "alpha.txt", "beta.txt"]
    );
}

#[test_log::test]
fn test_device_io_control_round_trip() {
    let state = Arc::new(ServerState::default());
    let server = file_server(state);
    let mut client = Smb1Client::new(test_config(&server));
    let tree = connected_store(&mut client, &server);

    let (handle, _) = tree
        .create_file("pipe", &CreateFileArgs::pipe())
        .expect("create");
    let output = tree
        .device_io_control(&handle, 0x0011C017, &[1, 2, 3, 4], 1024)
        .expect("ioctl");
    assert_eq!(output, vec![4, 3, 2, 1]);
}

#[test_log::test]
fn test_transfer_size_formulas() {
    let state = Arc::new(ServerState::default());
    let server = file_server(state);
    let mut client = Smb1Client::new(test_config(&server));
    let tree = connected_store(&mut client, &server);

    // Client buffer 65535 minus header, counts and the ReadAndX
    // response parameter block.
    assert_eq!(tree.max_read_size(), 65535 - (32 + 3 + 24));
    // Server buffer 16644 minus the WriteAndX request accounting, and
    // one more for the negotiated unicode pad.
    assert_eq!(tree.max_write_size(), 16644 - (32 + 3 + 28 + 4) - 1);

    let mismatched = smbclient::FileHandle::Smb2 {
        file_id: Default::default(),
        tree_id: 1,
    };
    assert!(matches!(
        tree.read_file(&mismatched, 0, 16),
        Err(Error::InvalidHandle)
    ));

    assert!(matches!(
        tree.flush_file_buffers(&mismatched),
        Err(Error::NotImplemented(_))
    ));
    assert!(matches!(tree.cancel(), Err(Error::NotImplemented(_))));
}
