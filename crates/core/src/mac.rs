// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MAC address generation and validation.
//!
//! Generated addresses are locally-administered unicast: bit 1 of the first
//! octet set, bit 0 clear, so they can never collide with a manufacturer
//! OUI. Uniqueness against the persisted fleet is the store's job.

use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacError {
    #[error("invalid MAC address: {0}")]
    Invalid(String),
}

/// Generate a locally-administered unicast MAC address.
///
/// The first octet is `0x02 | (r << 2)` with `r` in `0..64`, producing
/// 0x02, 0x06, 0x0a, 0x0e, and so on: always even with bit 1 set. The remaining
/// five octets are uniformly random.
pub fn generate_mac<R: Rng>(rng: &mut R) -> String {
    let first: u8 = 0x02 | (rng.gen_range(0u8..64) << 2);
    let rest: [u8; 5] = rng.gen();
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        first, rest[0], rest[1], rest[2], rest[3], rest[4]
    )
}

/// Parse a colon-separated MAC into its six octets.
fn parse_octets(mac: &str) -> Result<[u8; 6], MacError> {
    let mut octets = [0u8; 6];
    let mut count = 0;
    for part in mac.split(':') {
        if count == 6 || part.len() != 2 {
            return Err(MacError::Invalid(mac.to_string()));
        }
        octets[count] =
            u8::from_str_radix(part, 16).map_err(|_| MacError::Invalid(mac.to_string()))?;
        count += 1;
    }
    if count != 6 {
        return Err(MacError::Invalid(mac.to_string()));
    }
    Ok(octets)
}

/// True when the first octet has bit 1 set and bit 0 clear.
pub fn is_locally_administered_unicast(mac: &str) -> bool {
    match parse_octets(mac) {
        Ok(octets) => octets[0] & 0x02 != 0 && octets[0] & 0x01 == 0,
        Err(_) => false,
    }
}

/// Canonical lowercase form used for fleet-wide uniqueness checks.
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().to_ascii_lowercase()
}

#[cfg(test)]
#[path = "mac_tests.rs"]
mod tests;
