// Copyright (c) 2022-2023 The MobileCoin Foundation

use crate::{
    os::{ins, OS_CLA},
    parser::encode_to_hex_string,
    Apdu, ApduHeader, ApduParser, ApduResponse, BuilderError, Command, CommandError,
    DeviceModelId,
};

/// Fetch a page of installed applications
///
/// The first page is requested with `is_continue: false`, following pages
/// with `is_continue: true`. An empty page signals the end of the list.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct ListApps {
    pub is_continue: bool,
}

impl ListApps {
    pub fn new(is_continue: bool) -> Self {
        Self { is_continue }
    }
}

/// Installed application entry
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   ENTRY_LEN   |        SIZE_IN_BLOCKS         |     FLAGS     /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /     FLAGS     |          CODE_HASH (32 bytes)                 /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                       FULL_HASH (32 bytes)                    /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   NAME_LEN    |                    NAME...                    /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// A page is a format byte (`0x01`) followed by zero or more entries.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AppEntry {
    pub size_in_blocks: u16,
    pub flags: u16,
    pub code_hash: [u8; 32],
    pub full_hash: [u8; 32],
    pub name: String,
}

impl AppEntry {
    /// Full application hash as a hex string
    pub fn hash_hex(&self) -> String {
        encode_to_hex_string(&self.full_hash, false)
    }

    /// Code hash as a hex string
    pub fn code_hash_hex(&self) -> String {
        encode_to_hex_string(&self.code_hash, false)
    }

    fn decode(buff: &[u8]) -> Result<Self, CommandError> {
        let mut p = ApduParser::new(buff);

        let size_in_blocks = p.extract_u16()?;
        let flags = p.extract_u16()?;

        let mut code_hash = [0u8; 32];
        code_hash.copy_from_slice(p.extract_field_by_length(32)?);

        let mut full_hash = [0u8; 32];
        full_hash.copy_from_slice(p.extract_field_by_length(32)?);

        let name = p.extract_string_lv()?.to_string();

        Ok(Self {
            size_in_blocks,
            flags,
            code_hash,
            full_hash,
            name,
        })
    }
}

impl Command for ListApps {
    type Response = Vec<AppEntry>;

    fn name(&self) -> &'static str {
        "ListApps"
    }

    fn apdu(&self) -> Result<Apdu, BuilderError> {
        let i = match self.is_continue {
            true => ins::LIST_APPS_CONTINUE,
            false => ins::LIST_APPS,
        };

        Ok(Apdu::new(ApduHeader::new(OS_CLA, i, 0x00, 0x00)))
    }

    fn parse_response(
        &self,
        response: &ApduResponse,
        _model: DeviceModelId,
    ) -> Result<Self::Response, CommandError> {
        if !response.is_success() {
            return Err(self.status_error(response.status));
        }

        let mut apps = vec![];

        let mut p = response.parser();
        if p.remaining_length() == 0 {
            return Ok(apps);
        }

        let format = p.extract_u8()?;
        if format != 1 {
            return Err(CommandError::InvalidResponse(format!(
                "unsupported format: {format}"
            )));
        }

        while p.remaining_length() > 0 {
            let n = p.extract_u8()?;
            let entry = p.extract_field_by_length(n as usize)?;

            apps.push(AppEntry::decode(entry)?);
        }

        Ok(apps)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::test::ok_response;

    /// Encode an entry the way the dashboard does
    pub fn encode_entry(name: &str, size_in_blocks: u16, hash: u8) -> Vec<u8> {
        let mut e = vec![];
        e.extend_from_slice(&size_in_blocks.to_be_bytes());
        e.extend_from_slice(&0x0800u16.to_be_bytes());
        e.extend_from_slice(&[hash; 32]);
        e.extend_from_slice(&[hash.wrapping_add(1); 32]);
        e.push(name.len() as u8);
        e.extend_from_slice(name.as_bytes());

        let mut b = vec![e.len() as u8];
        b.extend_from_slice(&e);
        b
    }

    #[test]
    fn encode() {
        assert_eq!(
            ListApps::new(false).apdu().unwrap().to_bytes(),
            vec![0xe0, 0xde, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            ListApps::new(true).apdu().unwrap().to_bytes(),
            vec![0xe0, 0xdf, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn parse_page() {
        let mut d = vec![0x01];
        d.extend(encode_entry("Bitcoin", 12, 0x10));
        d.extend(encode_entry("Ethereum", 40, 0x20));

        let apps = ListApps::new(false)
            .parse_response(&ok_response(&d), DeviceModelId::NanoX)
            .unwrap();

        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].name, "Bitcoin");
        assert_eq!(apps[0].size_in_blocks, 12);
        assert_eq!(apps[0].flags, 0x0800);
        assert_eq!(apps[0].code_hash, [0x10; 32]);
        assert_eq!(apps[1].name, "Ethereum");
        assert_eq!(apps[1].hash_hex(), "21".repeat(32));
    }

    #[test]
    fn parse_empty_page() {
        let apps = ListApps::new(true)
            .parse_response(&ok_response(&[]), DeviceModelId::NanoX)
            .unwrap();
        assert!(apps.is_empty());

        let apps = ListApps::new(true)
            .parse_response(&ok_response(&[0x01]), DeviceModelId::NanoX)
            .unwrap();
        assert!(apps.is_empty());
    }

    #[test]
    fn parse_truncated_entry() {
        let mut d = vec![0x01];
        let e = encode_entry("Bitcoin", 12, 0x10);
        d.extend_from_slice(&e[..e.len() - 3]);

        assert!(matches!(
            ListApps::new(false).parse_response(&ok_response(&d), DeviceModelId::NanoX),
            Err(CommandError::Decoding(_))
        ));
    }
}
