// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn generated_macs_are_locally_administered_unicast() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let mac = generate_mac(&mut rng);
        assert!(is_locally_administered_unicast(&mac), "bad MAC: {mac}");
    }
}

#[test]
fn generated_first_octet_shape() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..500 {
        let mac = generate_mac(&mut rng);
        let first = u8::from_str_radix(&mac[0..2], 16).unwrap();
        // 0x02 | (r << 2): low two bits are exactly 0b10
        assert_eq!(first & 0x03, 0x02, "bad first octet in {mac}");
    }
}

#[test]
fn validation_rejects_globally_assigned() {
    // bit 1 clear in the first octet
    assert!(!is_locally_administered_unicast("00:11:22:33:44:55"));
    // multicast (bit 0 set)
    assert!(!is_locally_administered_unicast("03:11:22:33:44:55"));
    assert!(is_locally_administered_unicast("02:aa:bb:cc:dd:01"));
    assert!(is_locally_administered_unicast("0A:00:00:00:00:00"));
}

#[test]
fn validation_rejects_malformed() {
    assert!(!is_locally_administered_unicast(""));
    assert!(!is_locally_administered_unicast("02:aa:bb:cc:dd"));
    assert!(!is_locally_administered_unicast("02:aa:bb:cc:dd:ee:ff"));
    assert!(!is_locally_administered_unicast("02:aa:bb:cc:dd:zz"));
    assert!(!is_locally_administered_unicast("02-aa-bb-cc-dd-01"));
}

#[test]
fn normalize_lowercases_and_trims() {
    assert_eq!(normalize_mac(" 02:AA:BB:CC:DD:01 "), "02:aa:bb:cc:dd:01");
}
