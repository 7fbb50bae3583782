//! Unit tests for the push payload codec and server semantics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::payload::{extract_int, extract_str, extract_value, extract_value_sep};
use super::{Command, CommandResponse, Device, ExchangeCommand, Server, ServerHook, ServerOptions};

const SAMPLE_QUERY: &[u8] = b"SN=123456789&pushver=1.2.3&language=72&pushcommkey=987654321";

#[test]
fn extract_value_vectors() {
    let cases = [
        ("SN", "123456789"),
        ("pushver", "1.2.3"),
        ("language", "72"),
        ("pushcommkey", "987654321"),
    ];

    for (key, expected) in cases {
        let value = extract_value(SAMPLE_QUERY, key).expect("value present");
        assert_eq!(value, expected.as_bytes(), "key {key}");
    }
}

#[test]
fn extract_value_missing_key() {
    assert!(extract_value(SAMPLE_QUERY, "missing").is_none());
}

#[test]
fn extract_with_custom_separator() {
    let body = b"ATTLOGStamp=None\nOPERLOGStamp=9999\n";
    let value = extract_value_sep(body, "OPERLOGStamp", b"\n").expect("value present");
    assert_eq!(value, b"9999");
}

#[test]
fn extract_int_defaults() {
    assert_eq!(extract_int(SAMPLE_QUERY, "language", -1), 72);
    assert_eq!(extract_int(SAMPLE_QUERY, "missing", -1), -1);
    assert_eq!(extract_int(b"n=abc", "n", 9), 9);
}

#[test]
fn extract_str_defaults() {
    assert_eq!(extract_str(SAMPLE_QUERY, "pushver", "0"), "1.2.3");
    assert_eq!(extract_str(SAMPLE_QUERY, "missing", "fallback"), "fallback");
}

#[test]
fn device_decode_from_query() {
    let device = Device::decode(SAMPLE_QUERY).expect("decode");

    assert_eq!(device.serial, "123456789");
    assert_eq!(device.push_version, "1.2.3");
    assert_eq!(device.language, super::consts::lang::HE);
    assert_eq!(device.push_comm_key, "987654321");
}

#[test]
fn device_decode_rejects_empty() {
    assert!(Device::decode(b"").is_err());
}

#[test]
fn device_encode_round_trip() {
    let device = Device {
        serial: "5531".to_string(),
        options: "all".to_string(),
        push_version: "2.4.1".to_string(),
        language: super::consts::lang::EN,
        push_comm_key: "abc123".to_string(),
    };

    let decoded = Device::decode(&device.encode()).expect("decode");
    assert_eq!(decoded, device);
}

#[test]
fn exchange_body_golden() {
    let command = ExchangeCommand {
        serial: "123456789".to_string(),
        att_log_stamp: 0,
        oper_log_stamp: 9999,
        att_photo_stamp: 0,
        error_delay: 30,
        delay: 10,
        trans_times: "00:00;14:05".to_string(),
        trans_interval: 1,
        trans_flag: "TransData AttLog OpLog".to_string(),
        time_zone: 7,
        realtime: 1,
        encrypt: 0,
        server_version: "2.4.1".to_string(),
    };

    let body = String::from_utf8(command.encode()).expect("utf8 body");
    let expected = "GET OPTION FROM: 123456789\n\
                    ATTLOGStamp=None\n\
                    OPERLOGStamp=9999\n\
                    ATTPHOTOStamp=None\n\
                    ErrorDelay=30\n\
                    Delay=10\n\
                    TransTimes=00:00;14:05\n\
                    TransInterval=1\n\
                    TransFlag=TransData AttLog OpLog\n\
                    TimeZone=7\n\
                    Realtime=1\n\
                    ServerVer=2.4.1\n\
                    Encrypt=None";

    assert_eq!(body, expected);
}

#[test]
fn exchange_decode_reads_back_fields() {
    let command = ExchangeCommand {
        serial: "42".to_string(),
        oper_log_stamp: 77,
        delay: 5,
        trans_times: "00:00".to_string(),
        realtime: 1,
        server_version: "1.0".to_string(),
        ..ExchangeCommand::default()
    };

    let decoded = ExchangeCommand::decode(&command.encode()).expect("decode");

    assert_eq!(decoded.serial, "42");
    assert_eq!(decoded.att_log_stamp, 0);
    assert_eq!(decoded.oper_log_stamp, 77);
    assert_eq!(decoded.delay, 5);
    assert_eq!(decoded.trans_times, "00:00");
    assert_eq!(decoded.realtime, 1);
    assert_eq!(decoded.server_version, "1.0");
}

#[test]
fn command_wire_form() {
    let mut command = Command::new("REBOOT");
    command.id = "3f1b".to_string();
    assert_eq!(command.encode(), b"C:3f1b:REBOOT");

    let mut command = Command::new("DATA").with_payload(b"UPDATE USERINFO PIN=1".to_vec());
    command.id = "9c".to_string();
    assert_eq!(command.encode(), b"C:9c:DATA UPDATE USERINFO PIN=1");
}

#[test]
fn command_response_decode() {
    let response = CommandResponse::decode(b"ID=118&Return=0&CMD=DATA").expect("decode");

    assert_eq!(response.id, "118");
    assert_eq!(response.return_code, 0);
    assert_eq!(response.verb, "DATA");
    assert!(response.is_ok());

    let failed = CommandResponse::decode(b"ID=119&Return=-1003&CMD=DATA").expect("decode");
    assert_eq!(failed.return_code, -1003);
    assert!(!failed.is_ok());
}

#[test]
fn command_response_decode_rejects_empty() {
    assert!(CommandResponse::decode(b"").is_err());
}

/// Hook accepting every device with a canned exchange command.
struct AcceptAll;

impl ServerHook for AcceptAll {
    fn on_initial_exchange(&self, device: &Device) -> Option<ExchangeCommand> {
        Some(ExchangeCommand {
            serial: device.serial.clone(),
            delay: 10,
            realtime: 1,
            server_version: "test".to_string(),
            ..ExchangeCommand::default()
        })
    }
}

fn test_server() -> Server {
    Server::with_hook(ServerOptions::default(), AcceptAll)
}

async fn register_device(server: &Server, serial: &str) {
    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri(format!("/iclock/cdata?SN={serial}&options=all&pushver=1.2.3"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[tokio::test]
async fn initial_exchange_registers_and_replies() {
    let server = test_server();

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/iclock/cdata?SN=5531&options=all")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.starts_with("GET OPTION FROM: 5531"));
    assert!(body.contains("ServerVer=test"));

    let device = server.device("5531").expect("registered");
    assert_eq!(device.push_version, "");
    assert_eq!(device.options, "all");
}

#[tokio::test]
async fn initial_exchange_without_hook_is_forbidden() {
    let server = Server::new(ServerOptions::default());

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/iclock/cdata?SN=5531")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(server.device("5531").is_none());
}

#[tokio::test]
async fn poll_returns_queued_commands_in_order_then_ok() {
    let server = test_server();
    register_device(&server, "5531").await;

    let ids = server
        .do_background(
            "5531",
            vec![Command::new("CHECK"), Command::new("LOG")],
        )
        .expect("enqueue");
    assert_eq!(ids.len(), 2);

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/iclock/getrequest?SN=5531")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    let body = body_text(response).await;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], format!("C:{}:CHECK", ids[0]));
    assert_eq!(lines[1], format!("C:{}:LOG", ids[1]));

    // queue was flushed atomically; the next poll is empty
    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/iclock/getrequest?SN=5531")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn enqueue_rejects_unregistered_device() {
    let server = test_server();
    let err = server
        .do_background("nope", vec![Command::new("CHECK")])
        .unwrap_err();
    assert!(matches!(err, crate::Error::DeviceNotRegistered(_)));
}

#[tokio::test]
async fn command_response_invokes_callback_exactly_once() {
    let server = test_server();
    register_device(&server, "5531").await;

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let ids = server
        .do_background(
            "5531",
            vec![Command::new("CHECK").with_callback(move |response| {
                assert!(response.is_ok());
                seen.fetch_add(1, Ordering::SeqCst);
            })],
        )
        .expect("enqueue");

    let post = |id: String| {
        server.router().oneshot(
            Request::builder()
                .method("POST")
                .uri("/iclock/devicecmd")
                .body(Body::from(format!("ID={id}&Return=0&CMD=CHECK")))
                .expect("request"),
        )
    };

    let response = post(ids[0].clone()).await.expect("response");
    assert_eq!(body_text(response).await, "OK");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // duplicate responses find no callback and change nothing
    let response = post(ids[0].clone()).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn do_sync_awaits_correlated_response() {
    let server = test_server();
    register_device(&server, "5531").await;

    let worker = {
        let server = server.clone();
        tokio::spawn(async move { server.do_sync("5531", Command::new("CHECK")).await })
    };

    // wait until the command shows up on a poll
    let mut delivered = String::new();
    for _ in 0..50 {
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/iclock/getrequest?SN=5531")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        let body = body_text(response).await;
        if body != "OK" {
            delivered = body;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let id = delivered
        .strip_prefix("C:")
        .and_then(|rest| rest.split(':').next())
        .expect("delivered command id")
        .to_string();

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/iclock/devicecmd")
                .body(Body::from(format!("ID={id}&Return=0&CMD=CHECK")))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let result = worker.await.expect("worker").expect("response");
    assert_eq!(result.id, id);
    assert!(result.is_ok());
}

#[tokio::test]
async fn info_poll_updates_registry() {
    let server = test_server();
    register_device(&server, "5531").await;

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/iclock/getrequest?SN=5531&INFO=Ver7.0.1,10,20,30")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(body_text(response).await, "OK");
    assert_eq!(server.device("5531").expect("device").options, "Ver7.0.1,10,20,30");
}

#[tokio::test]
async fn catch_all_is_lenient_under_iclock_only() {
    let server = test_server();

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/iclock/fdata")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/somewhere/else")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
