//! NTLM one-way functions and challenge responses (MS-NLMP §3.3), used by
//! the SMB1 pre-extended-security session setup where the raw responses
//! travel directly in the password fields.

use binrw::prelude::*;
use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockEncrypt, KeyInit};
use digest::Digest;
use hmac::{Hmac, Mac};
use md4::Md4;
use md5::Md5;
use rand::{rngs::OsRng, RngCore};

use crate::packets::binrw_util::{to_utf16_le, FileTime};
use crate::Error;

type HmacMd5 = Hmac<Md5>;

fn hmac_md5(key: &[u8], data: &[u8]) -> crate::Result<[u8; 16]> {
    let mut mac = <HmacMd5 as Mac>::new_from_slice(key)
        .map_err(|_| Error::InvalidArgument("invalid HMAC key length".to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// NTOWFv1: MD4 over the UTF-16LE password.
pub fn ntowf_v1(password: &str) -> [u8; 16] {
    Md4::digest(to_utf16_le(password)).into()
}

/// LMOWFv1: DES of `KGS!@#$%` under the two halves of the upper-cased,
/// 14-byte-padded OEM password.
pub fn lmowf_v1(password: &str) -> crate::Result<[u8; 16]> {
    const LM_MAGIC: &[u8; 8] = b"KGS!@#$%";
    let mut padded = password.to_uppercase().into_bytes();
    padded.resize(14, 0);

    let mut result = [0u8; 16];
    result[..8].copy_from_slice(&des_encrypt(&extend_des_key(&padded[0..7]), LM_MAGIC)?);
    result[8..].copy_from_slice(&des_encrypt(&extend_des_key(&padded[7..14]), LM_MAGIC)?);
    Ok(result)
}

/// NTOWFv2: HMAC-MD5 of the upper-cased user concatenated with the
/// domain, keyed by the MD4 password hash.
pub fn ntowf_v2(password: &str, user: &str, domain: &str) -> crate::Result<[u8; 16]> {
    let key = ntowf_v1(password);
    let text = user.to_uppercase() + domain;
    hmac_md5(&key, &to_utf16_le(&text))
}

/// DESL: the 16-byte key is zero-padded to 21 bytes and split into three
/// DES keys, each encrypting the 8-byte challenge.
pub fn desl(key: &[u8; 16], data: &[u8; 8]) -> crate::Result<[u8; 24]> {
    let mut padded = [0u8; 21];
    padded[..16].copy_from_slice(key);

    let mut result = [0u8; 24];
    result[..8].copy_from_slice(&des_encrypt(&extend_des_key(&padded[0..7]), data)?);
    result[8..16].copy_from_slice(&des_encrypt(&extend_des_key(&padded[7..14]), data)?);
    result[16..].copy_from_slice(&des_encrypt(&extend_des_key(&padded[14..21]), data)?);
    Ok(result)
}

/// Expands a 7-byte key to the 8-byte form DES expects, one parity bit
/// per byte.
fn extend_des_key(key: &[u8]) -> [u8; 8] {
    let mut result = [0u8; 8];
    result[0] = key[0] >> 1;
    result[1] = ((key[0] & 0x01) << 6) | (key[1] >> 2);
    result[2] = ((key[1] & 0x03) << 5) | (key[2] >> 3);
    result[3] = ((key[2] & 0x07) << 4) | (key[3] >> 4);
    result[4] = ((key[3] & 0x0F) << 3) | (key[4] >> 5);
    result[5] = ((key[4] & 0x1F) << 2) | (key[5] >> 6);
    result[6] = ((key[5] & 0x3F) << 1) | (key[6] >> 7);
    result[7] = key[6] & 0x7F;
    for byte in result.iter_mut() {
        *byte <<= 1;
    }
    result
}

fn des_encrypt(key: &[u8; 8], plaintext: &[u8; 8]) -> crate::Result<[u8; 8]> {
    let des = des::Des::new_from_slice(key)
        .map_err(|_| Error::InvalidArgument("invalid DES key length".to_string()))?;
    let mut block = GenericArray::clone_from_slice(plaintext);
    des.encrypt_block(&mut block);
    Ok(block.into())
}

/// The 24-byte NTLMv1 challenge response.
pub fn ntlm_v1_response(password: &str, server_challenge: &[u8; 8]) -> crate::Result<[u8; 24]> {
    desl(&ntowf_v1(password), server_challenge)
}

/// The 24-byte LMv1 challenge response.
pub fn lm_v1_response(password: &str, server_challenge: &[u8; 8]) -> crate::Result<[u8; 24]> {
    desl(&lmowf_v1(password)?, server_challenge)
}

/// The 24-byte LMv2 response: HMAC over both challenges, followed by the
/// client challenge.
pub fn lm_v2_response(
    password: &str,
    user: &str,
    domain: &str,
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
) -> crate::Result<[u8; 24]> {
    let key = ntowf_v2(password, user, domain)?;
    let mut data = [0u8; 16];
    data[..8].copy_from_slice(server_challenge);
    data[8..].copy_from_slice(client_challenge);
    let mac = hmac_md5(&key, &data)?;

    let mut result = [0u8; 24];
    result[..16].copy_from_slice(&mac);
    result[16..].copy_from_slice(client_challenge);
    Ok(result)
}

/// The NTLMv2 proof: HMAC over the server challenge and the client
/// challenge blob.
pub fn ntlm_v2_proof(
    response_key: &[u8; 16],
    server_challenge: &[u8; 8],
    blob: &[u8],
) -> crate::Result<[u8; 16]> {
    let mut data = Vec::with_capacity(8 + blob.len());
    data.extend_from_slice(server_challenge);
    data.extend_from_slice(blob);
    hmac_md5(response_key, &data)
}

pub fn generate_client_challenge() -> [u8; 8] {
    let mut challenge = [0u8; 8];
    OsRng.fill_bytes(&mut challenge);
    challenge
}

/// An NTLM AV pair (MS-NLMP §2.2.2.1).
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
#[brw(little)]
pub struct AvPair {
    pub id: u16,
    #[bw(try_calc(u16::try_from(value.len())))]
    length: u16,
    #[br(count = length)]
    pub value: Vec<u8>,
}

impl AvPair {
    pub const EOL: u16 = 0x0000;
    pub const NB_COMPUTER_NAME: u16 = 0x0001;
    pub const NB_DOMAIN_NAME: u16 = 0x0002;

    pub fn new(id: u16, value: Vec<u8>) -> Self {
        AvPair { id, value }
    }
}

/// The NTLMv2 client challenge blob (MS-NLMP §2.2.2.7), hashed together
/// with the server challenge to form the NTLMv2 proof and sent after it.
#[binrw::binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
#[brw(little)]
pub struct NtlmV2ClientChallenge {
    #[bw(calc = 1)]
    #[br(temp)]
    _resp_type: u8,
    #[bw(calc = 1)]
    #[br(temp)]
    _hi_resp_type: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved1: u16,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved2: u32,
    pub timestamp: FileTime,
    pub challenge_from_client: [u8; 8],
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved3: u32,
    #[br(parse_with = read_av_pairs)]
    pub av_pairs: Vec<AvPair>,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved4: u32,
}

#[binrw::parser(reader, endian)]
fn read_av_pairs() -> BinResult<Vec<AvPair>> {
    let mut pairs = Vec::new();
    loop {
        let pair = AvPair::read_options(reader, endian, ())?;
        let done = pair.id == AvPair::EOL;
        pairs.push(pair);
        if done {
            break;
        }
    }
    Ok(pairs)
}

impl NtlmV2ClientChallenge {
    /// Builds the blob with the AV pairs this client targets: the domain
    /// and the local machine name.
    pub fn new(
        timestamp: FileTime,
        challenge_from_client: [u8; 8],
        domain: &str,
        machine_name: &str,
    ) -> Self {
        NtlmV2ClientChallenge {
            timestamp,
            challenge_from_client,
            av_pairs: vec![
                AvPair::new(AvPair::NB_DOMAIN_NAME, to_utf16_le(domain)),
                AvPair::new(AvPair::NB_COMPUTER_NAME, to_utf16_le(machine_name)),
                AvPair::new(AvPair::EOL, Vec::new()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::binrw_util::encode_le;

    // MS-NLMP §4.2 test vectors.
    const USER: &str = "User";
    const DOMAIN: &str = "Domain";
    const PASSWORD: &str = "Password";
    const SERVER_CHALLENGE: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
    const CLIENT_CHALLENGE: [u8; 8] = [0xaa; 8];

    #[test]
    fn test_ntowf_v1() {
        assert_eq!(
            ntowf_v1(PASSWORD),
            [
                0xa4, 0xf4, 0x9c, 0x40, 0x65, 0x10, 0xbd, 0xca, 0xb6, 0x82, 0x4e, 0xe7, 0xc3,
                0x0f, 0xd8, 0x52,
            ]
        );
    }

    #[test]
    fn test_lmowf_v1() {
        assert_eq!(
            lmowf_v1(PASSWORD).unwrap(),
            [
                0xe5, 0x2c, 0xac, 0x67, 0x41, 0x9a, 0x9a, 0x22, 0x4a, 0x3b, 0x10, 0x8f, 0x3f,
                0xa6, 0xcb, 0x6d,
            ]
        );
    }

    #[test]
    fn test_ntlm_v1_response() {
        assert_eq!(
            ntlm_v1_response(PASSWORD, &SERVER_CHALLENGE).unwrap(),
            [
                0x67, 0xc4, 0x30, 0x11, 0xf3, 0x02, 0x98, 0xa2, 0xad, 0x35, 0xec, 0xe6, 0x4f,
                0x16, 0x33, 0x1c, 0x44, 0xbd, 0xbe, 0xd9, 0x27, 0x84, 0x1f, 0x94,
            ]
        );
    }

    #[test]
    fn test_lm_v1_response() {
        assert_eq!(
            lm_v1_response(PASSWORD, &SERVER_CHALLENGE).unwrap(),
            [
                0x98, 0xde, 0xf7, 0xb8, 0x7f, 0x88, 0xaa, 0x5d, 0xaf, 0xe2, 0xdf, 0x77, 0x96,
                0x88, 0xa1, 0x72, 0xde, 0xf1, 0x1c, 0x7d, 0x5c, 0xcd, 0xef, 0x13,
            ]
        );
    }

    #[test]
    fn test_ntowf_v2() {
        assert_eq!(
            ntowf_v2(PASSWORD, USER, DOMAIN).unwrap(),
            [
                0x0c, 0x86, 0x8a, 0x40, 0x3b, 0xfd, 0x7a, 0x93, 0xa3, 0x00, 0x1e, 0xf2, 0x2e,
                0xf0, 0x2e, 0x3f,
            ]
        );
    }

    #[test]
    fn test_lm_v2_response() {
        assert_eq!(
            lm_v2_response(PASSWORD, USER, DOMAIN, &SERVER_CHALLENGE, &CLIENT_CHALLENGE).unwrap(),
            [
                0x86, 0xc3, 0x50, 0x97, 0xac, 0x9c, 0xec, 0x10, 0x25, 0x54, 0x76, 0x4a, 0x57,
                0xcc, 0xcc, 0x19, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa,
            ]
        );
    }

    #[test]
    fn test_ntlm_v2_proof() {
        // The §4.2.4 temp: zero time, 0xaa client challenge, AV pairs
        // naming domain "Domain" and computer "Server".
        let blob = NtlmV2ClientChallenge {
            timestamp: FileTime::default(),
            challenge_from_client: CLIENT_CHALLENGE,
            av_pairs: vec![
                AvPair::new(AvPair::NB_DOMAIN_NAME, to_utf16_le("Domain")),
                AvPair::new(AvPair::NB_COMPUTER_NAME, to_utf16_le("Server")),
                AvPair::new(AvPair::EOL, Vec::new()),
            ],
        };
        let blob_bytes = encode_le(&blob).unwrap();
        let key = ntowf_v2(PASSWORD, USER, DOMAIN).unwrap();
        assert_eq!(
            ntlm_v2_proof(&key, &SERVER_CHALLENGE, &blob_bytes).unwrap(),
            [
                0x68, 0xcd, 0x0a, 0xb8, 0x51, 0xe5, 0x1c, 0x96, 0xaa, 0xbc, 0x92, 0x7b, 0xeb,
                0xef, 0x6a, 0x1c,
            ]
        );
    }

    #[test]
    fn test_client_challenge_blob_round_trip() {
        let blob = NtlmV2ClientChallenge::new(
            FileTime { value: 0x1234 },
            CLIENT_CHALLENGE,
            "DOM",
            "WORKSTATION",
        );
        let bytes = encode_le(&blob).unwrap();
        let parsed: NtlmV2ClientChallenge =
            crate::packets::binrw_util::decode_le(&bytes).unwrap();
        assert_eq!(parsed, blob);
        assert_eq!(parsed.av_pairs.len(), 3);
        assert_eq!(parsed.av_pairs[2].id, AvPair::EOL);
    }
}
