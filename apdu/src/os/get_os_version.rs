// Copyright (c) 2022-2023 The MobileCoin Foundation

use crate::{
    os::{ins, OS_CLA},
    parser::encode_to_hex_string,
    Apdu, ApduHeader, ApduResponse, BuilderError, Command, CommandError, DeviceModelId,
    FirmwareVersion,
};

/// Fetch firmware information, served by the dashboard only
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct GetOsVersion;

bitflags::bitflags! {
    /// Secure element state flags (first byte of the SE flags field)
    pub struct SecureElementFlags: u8 {
        const PIN_VALIDATED = 1 << 7;
        const HAS_MCU_SERIAL_NUMBER = 1 << 6;
        const HAS_VALID_CERTIFICATE = 1 << 5;
        const CUSTOM_AUTHORITY_CONNECTION_ALLOWED = 1 << 4;
        const SECURE_CONNECTION_ALLOWED = 1 << 3;
        const ONBOARDED = 1 << 2;
        const MCU_CODE_SIGNED = 1 << 1;
        const IN_RECOVERY_MODE = 1 << 0;
    }
}

impl Default for SecureElementFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Firmware information
///
/// Field presence depends on whether the device is running the bootloader
/// as well as on the model and firmware version.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct OsVersion {
    /// Device is running the bootloader (firmware update in progress)
    pub is_bootloader: bool,
    /// Device is running an OS updater
    pub is_osu: bool,
    pub target_id: u32,
    pub se_target_id: Option<u32>,
    /// Only reported in bootloader mode
    pub mcu_target_id: Option<u32>,
    pub se_version: String,
    pub se_flags: Vec<u8>,
    pub mcu_seph_version: String,
    pub mcu_bootloader_version: String,
    /// Hardware revision, only reported by Nano X
    pub hw_version: String,
    pub lang_id: Option<u32>,
    pub recover_state: Option<u32>,
    pub secure_element_flags: SecureElementFlags,
}

impl OsVersion {
    /// Parsed secure element version
    pub fn version(&self) -> FirmwareVersion {
        FirmwareVersion::coerce(&self.se_version).unwrap_or_default()
    }

    pub fn is_onboarded(&self) -> bool {
        self.secure_element_flags
            .contains(SecureElementFlags::ONBOARDED)
    }
}

/// Interpret bytes as a big-endian integer
fn be_u32(d: &[u8]) -> Option<u32> {
    if d.is_empty() || d.len() > 4 {
        return None;
    }
    Some(d.iter().fold(0u32, |a, b| (a << 8) | *b as u32))
}

fn lossy(d: &[u8]) -> String {
    String::from_utf8_lossy(d).to_string()
}

fn at_least(v: FirmwareVersion, major: u32, minor: u32, patch: u32) -> bool {
    v >= FirmwareVersion::new(major, minor, patch)
}

fn bootloader_version_supported(v: FirmwareVersion, model: DeviceModelId) -> bool {
    match model {
        DeviceModelId::NanoS | DeviceModelId::NanoX => at_least(v, 2, 0, 0),
        _ => true,
    }
}

fn hardware_version_supported(v: FirmwareVersion, model: DeviceModelId) -> bool {
    match model {
        DeviceModelId::NanoX => at_least(v, 2, 0, 0),
        _ => false,
    }
}

fn localization_supported(v: FirmwareVersion, model: DeviceModelId) -> bool {
    match model {
        DeviceModelId::NanoS => false,
        DeviceModelId::NanoSP => at_least(v, 1, 1, 0),
        DeviceModelId::NanoX => at_least(v, 2, 1, 0),
        _ => true,
    }
}

fn recover_supported(v: FirmwareVersion, model: DeviceModelId) -> bool {
    match model {
        DeviceModelId::NanoS => false,
        DeviceModelId::NanoSP => at_least(v, 1, 1, 2),
        DeviceModelId::NanoX => at_least(v, 2, 2, 3),
        DeviceModelId::Stax => at_least(v, 1, 4, 0),
        DeviceModelId::Flex => at_least(v, 1, 0, 1),
    }
}

impl Command for GetOsVersion {
    type Response = OsVersion;

    fn name(&self) -> &'static str {
        "GetOsVersion"
    }

    fn apdu(&self) -> Result<Apdu, BuilderError> {
        Ok(Apdu::new(ApduHeader::new(
            OS_CLA,
            ins::GET_OS_VERSION,
            0x00,
            0x00,
        )))
    }

    fn parse_response(
        &self,
        response: &ApduResponse,
        model: DeviceModelId,
    ) -> Result<Self::Response, CommandError> {
        if !response.is_success() {
            return Err(self.status_error(response.status));
        }

        let mut p = response.parser();

        let target_id = p
            .extract_u32()
            .map_err(|_| CommandError::InvalidResponse("missing target id".to_string()))?;

        let mut version = p.extract_field_lv().map(lossy).unwrap_or_default();
        let mut se_flags = p.extract_field_lv().map(|f| f.to_vec()).unwrap_or_default();

        // Flags are decoded prior to the legacy reset below
        let secure_element_flags = se_flags
            .first()
            .map(|b| SecureElementFlags::from_bits_truncate(*b))
            .unwrap_or_default();

        // Old firmwares do not report a version
        if version.is_empty() {
            version = "0.0.0".to_string();
            se_flags = vec![];
        }

        let mut v = OsVersion {
            is_bootloader: (target_id & 0xf000_0000) != 0x3000_0000,
            is_osu: version.contains("-osu"),
            target_id,
            se_flags,
            secure_element_flags,
            ..Default::default()
        };

        if v.is_bootloader {
            v.mcu_bootloader_version = version;
            v.mcu_target_id = Some(target_id);

            if let Ok(se_data) = p.extract_field_lv() {
                if se_data.len() >= 5 {
                    // SE version followed by the SE target id
                    v.se_version = lossy(se_data);
                    v.se_target_id = p.extract_field_lv().ok().and_then(be_u32);
                } else {
                    v.se_target_id = be_u32(se_data);
                }
            }

            return Ok(v);
        }

        v.se_version = version;
        v.se_target_id = Some(target_id);

        let fw = v.version();

        v.mcu_seph_version = p.extract_field_lv().map(lossy).unwrap_or_default();

        if bootloader_version_supported(fw, model) {
            v.mcu_bootloader_version = p.extract_field_lv().map(lossy).unwrap_or_default();
        }

        v.hw_version = match hardware_version_supported(fw, model) {
            true => p
                .extract_field_lv()
                .map(|d| encode_to_hex_string(d, false))
                .unwrap_or_default(),
            false => "00".to_string(),
        };

        if localization_supported(fw, model) {
            v.lang_id = p.extract_field_lv().ok().and_then(be_u32);
        }

        if recover_supported(fw, model) {
            v.recover_state = p.extract_field_lv().ok().and_then(be_u32);
        }

        Ok(v)
    }
}
