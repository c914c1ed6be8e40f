//! Parsing of the identity string bootloaders report as their USB serial number.
//!
//! iBoot, DFU and WTF stages describe themselves with space-separated `KEY:VALUE` pairs, e.g.
//! `CPID:8930 CPRV:20 CPFM:03 SCEP:02 BDID:00 ECID:000001234A5B6C7D IBFL:00 SRTG:[iBoot-574.4]`.
//! Numeric values are hexadecimal; bracketed values are strings.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    /// Chip id.
    pub cpid: Option<u32>,
    /// Chip revision.
    pub cprv: Option<u32>,
    /// Chip fuse mode.
    pub cpfm: Option<u32>,
    /// Security epoch.
    pub scep: Option<u32>,
    /// Board id.
    pub bdid: Option<u32>,
    /// Exclusive chip id.
    pub ecid: Option<u64>,
    /// iBoot flags.
    pub ibfl: Option<u32>,
    /// Serial number (`SRNM`).
    pub serial_number: Option<String>,
    /// Bootloader build tag (`SRTG`).
    pub iboot_tag: Option<String>,
    /// Every pair in the order reported, brackets stripped.
    pub fields: Vec<(String, String)>,
}

impl DeviceIdentity {
    /// Parses an identity string. Tokens that are not `KEY:VALUE` pairs are skipped, and a
    /// malformed number leaves the typed field empty while keeping the raw pair in `fields`.
    pub fn parse(serial: &str) -> Self {
        let mut identity = DeviceIdentity::default();

        for (key, value) in pairs(serial) {
            let hex32 = || u32::from_str_radix(&value, 16).ok();
            match key.as_str() {
                "CPID" => identity.cpid = hex32(),
                "CPRV" => identity.cprv = hex32(),
                "CPFM" => identity.cpfm = hex32(),
                "SCEP" => identity.scep = hex32(),
                "BDID" => identity.bdid = hex32(),
                "IBFL" => identity.ibfl = hex32(),
                "ECID" => identity.ecid = u64::from_str_radix(&value, 16).ok(),
                "SRNM" => identity.serial_number = Some(value.clone()),
                "SRTG" => identity.iboot_tag = Some(value.clone()),
                _ => {}
            }
            identity.fields.push((key, value));
        }

        identity
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Splits on whitespace, keeping bracketed values that contain spaces together.
fn pairs(serial: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut tokens = serial.split_whitespace();

    while let Some(token) = tokens.next() {
        let Some((key, value)) = token.split_once(':') else {
            continue;
        };
        let mut value = value.to_owned();
        if value.starts_with('[') {
            while !value.ends_with(']') {
                match tokens.next() {
                    Some(more) => {
                        value.push(' ');
                        value.push_str(more);
                    }
                    None => break,
                }
            }
            value = value.trim_start_matches('[').trim_end_matches(']').to_owned();
        }
        out.push((key.to_owned(), value));
    }

    out
}
