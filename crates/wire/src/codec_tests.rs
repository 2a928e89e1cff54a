// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::NetmonCommand;
use tokio::io::BufReader;

#[tokio::test]
async fn write_then_read_round_trip() {
    let (client, server) = tokio::io::duplex(1024);
    let (server_read, _keep) = tokio::io::split(server);
    let (_, mut client_write) = tokio::io::split(client);

    let cmd = NetmonCommand::StopDhcp {
        container_name: "plc-a".into(),
        vnic_name: "eth0".into(),
    };
    write_json_line(&mut client_write, &cmd).await.unwrap();

    let mut reader = BufReader::new(server_read);
    let line = read_json_line(&mut reader).await.unwrap().unwrap();
    let parsed: NetmonCommand = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed, cmd);
}

#[tokio::test]
async fn blank_lines_are_skipped() {
    let input: &[u8] = b"\n\n{\"command\":\"get_dhcp_status\"}\n";
    let mut reader = BufReader::new(input);
    let line = read_json_line(&mut reader).await.unwrap().unwrap();
    assert_eq!(line, r#"{"command":"get_dhcp_status"}"#);
}

#[tokio::test]
async fn eof_yields_none() {
    let input: &[u8] = b"";
    let mut reader = BufReader::new(input);
    assert!(read_json_line(&mut reader).await.unwrap().is_none());

    // Trailing blanks before EOF also end cleanly
    let input: &[u8] = b"\n  \n";
    let mut reader = BufReader::new(input);
    assert!(read_json_line(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn multiple_lines_in_sequence() {
    let input: &[u8] = b"{\"success\":true}\n{\"success\":false}\n";
    let mut reader = BufReader::new(input);
    assert_eq!(read_json_line(&mut reader).await.unwrap().unwrap(), r#"{"success":true}"#);
    assert_eq!(read_json_line(&mut reader).await.unwrap().unwrap(), r#"{"success":false}"#);
    assert!(read_json_line(&mut reader).await.unwrap().is_none());
}
