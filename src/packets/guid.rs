use std::{fmt::Display, io::Cursor, str::FromStr};

use binrw::prelude::*;
use rand::{rngs::OsRng, Rng};

/// A standard, 16-byte GUID, stored in its on-wire (mixed-endian) layout.
#[derive(BinRead, BinWrite, Clone, Copy, PartialEq, Eq, Default)]
#[brw(little)]
pub struct Guid(u32, u16, u16, [u8; 8]);

impl Guid {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill(&mut bytes);
        Self::from(bytes)
    }
}

impl From<[u8; 16]> for Guid {
    fn from(value: [u8; 16]) -> Self {
        // Reading 16 bytes into the field layout cannot fail.
        Guid::read(&mut Cursor::new(&value)).unwrap()
    }
}

impl FromStr for Guid {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components = s.split('-').collect::<Vec<&str>>();
        if components.len() != 5 || components[4].len() != 12 {
            return Err(crate::Error::InvalidArgument(format!(
                "malformed GUID string: {s}"
            )));
        }
        let bad = |_| crate::Error::InvalidArgument(format!("malformed GUID string: {s}"));

        let mut result = Self::default();
        result.0 = u32::from_str_radix(components[0], 16).map_err(bad)?;
        result.1 = u16::from_str_radix(components[1], 16).map_err(bad)?;
        result.2 = u16::from_str_radix(components[2], 16).map_err(bad)?;
        result.3[..2].copy_from_slice(
            &u16::from_str_radix(components[3], 16)
                .map_err(bad)?
                .to_be_bytes(),
        );
        for i in 0..6 {
            result.3[i + 2] =
                u8::from_str_radix(&components[4][i * 2..i * 2 + 2], 16).map_err(bad)?;
        }
        Ok(result)
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:012x}",
            self.0,
            self.1,
            self.2,
            self.3[0],
            self.3[1],
            self.3[2..]
                .iter()
                .fold(0u64, |acc, &x| (acc << 8) + x as u64)
        )
    }
}

impl std::fmt::Debug for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_GUID_STR: &str = "4b324fc8-1670-01d3-1278-5a47bf6ee188";
    const TEST_GUID_BYTES: [u8; 16] = [
        0xc8, 0x4f, 0x32, 0x4b, 0x70, 0x16, 0xd3, 0x01, 0x12, 0x78, 0x5a, 0x47, 0xbf, 0x6e, 0xe1,
        0x88,
    ];

    #[test]
    fn test_guid_parse_and_display() {
        let guid = TEST_GUID_STR.parse::<Guid>().unwrap();
        assert_eq!(guid, Guid::from(TEST_GUID_BYTES));
        assert_eq!(guid.to_string(), TEST_GUID_STR);
    }

    #[test]
    fn test_guid_write_bytes() {
        let mut cursor = Cursor::new(Vec::new());
        TEST_GUID_STR
            .parse::<Guid>()
            .unwrap()
            .write(&mut cursor)
            .unwrap();
        assert_eq!(cursor.into_inner(), TEST_GUID_BYTES);
    }
}
