//! Unit tests for frame codec and packet marshalling.

use chrono::NaiveDate;

use super::codec::{checksum, decode_time, encode_time, payload_valid};
use super::consts::{CMD_CONNECT, CMD_ACK_OK, START_TAG};
use super::packet::{HEADER_LEN, Packet};
use crate::error::Error;

#[test]
fn checksum_known_vectors() {
    let cases = [
        ("0b00f38d03005a4b4661636556657273696f6e00", "5a17"),
        ("d007296af38d0a0009", "0000"),
    ];

    for (input, expected) in cases {
        let payload = hex::decode(input).unwrap();
        let sum = checksum(&payload);
        assert_eq!(hex::encode(sum.to_le_bytes()), expected, "input {input}");
    }
}

#[test]
fn checksum_of_stored_frame_is_zero() {
    let frame = Packet::command(CMD_CONNECT, b"test-payload".to_vec(), 0x1234, 7).encode();
    assert!(payload_valid(&frame[8..]));
}

#[test]
fn connect_frame_golden_bytes() {
    let frame = Packet::command(CMD_CONNECT, Vec::new(), 0, 0).encode();
    assert_eq!(hex::encode(&frame), "5050827d08000000e80317fc00000000");

    // checksum over bytes 8..end recomputes to zero
    assert_eq!(checksum(&frame[8..]), 0);
}

#[test]
fn encode_decode_round_trip() {
    let original = Packet::command(0x05DF, vec![0x01, 0x09, 0x00, 0x05], 0xBEEF, 0x0102);
    let decoded = Packet::decode(&original.encode()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn decode_rejects_short_frame() {
    let err = Packet::decode(&[0u8; 15]).unwrap_err();
    assert!(matches!(err, Error::InvalidLength));
}

#[test]
fn decode_rejects_bad_start_tag() {
    let mut frame = Packet::command(CMD_CONNECT, Vec::new(), 0, 0).encode();
    frame[0] = 0x51;
    let err = Packet::decode(&frame).unwrap_err();
    assert!(matches!(err, Error::BadStartTag));
}

#[test]
fn decode_rejects_corrupt_checksum() {
    let mut frame = Packet::command(CMD_CONNECT, b"abc".to_vec(), 1, 2).encode();
    frame[HEADER_LEN] ^= 0xFF;
    let err = Packet::decode(&frame).unwrap_err();
    assert!(matches!(err, Error::InvalidChecksum));
}

#[test]
fn ack_ok_detection() {
    let reply = Packet::command(CMD_ACK_OK, Vec::new(), 0, 0);
    assert!(reply.is_ok());
    assert!(!Packet::command(CMD_CONNECT, Vec::new(), 0, 0).is_ok());
}

#[test]
fn frame_layout_fields() {
    let frame = Packet::command(CMD_CONNECT, vec![0xAA, 0xBB], 0x1234, 0x5678).encode();

    assert_eq!(&frame[..4], &START_TAG);
    assert_eq!(u16::from_le_bytes([frame[4], frame[5]]) as usize, frame.len() - 8);
    assert_eq!(&frame[6..8], &[0, 0]);
    assert_eq!(u16::from_le_bytes([frame[8], frame[9]]), CMD_CONNECT);
    assert_eq!(u16::from_le_bytes([frame[12], frame[13]]), 0x1234);
    assert_eq!(u16::from_le_bytes([frame[14], frame[15]]), 0x5678);
    assert_eq!(&frame[16..], &[0xAA, 0xBB]);
}

#[test]
fn time_round_trips() {
    let cases = [
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        NaiveDate::from_ymd_opt(2019, 12, 31).unwrap().and_hms_opt(12, 5, 0).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(23, 59, 59).unwrap(),
        NaiveDate::from_ymd_opt(2099, 12, 31).unwrap().and_hms_opt(11, 30, 15).unwrap(),
    ];

    for t in cases {
        let decoded = decode_time(&encode_time(t)).unwrap();
        assert_eq!(decoded, t, "round trip for {t}");
    }
}

#[test]
fn decode_time_rejects_short_input() {
    assert!(decode_time(&[0u8; 4]).is_err());
}

#[test]
fn decode_time_rejects_impossible_date() {
    // encodes day 31 of a 30-day month
    let t = ((18u64 * 12 * 31) + 31 + 30) * 86_400;
    let err = decode_time(&t.to_le_bytes()).unwrap_err();
    assert!(matches!(err, Error::InvalidTime(_)));
}
