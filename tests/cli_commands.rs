//! Integration tests for the binlog binary
//!
//! Captures are written to a temporary directory and the built binary is run
//! against them, with that directory as its working directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use binlog_codec::{
    decode_stream, encode_event, CallEvent, ClientHeader, EventType, Message, Metadata, Payload,
    Trailer,
};
use chrono::{TimeZone, Utc};
use prost::Message as _;
use tempfile::TempDir;

const ECHO: &str = r#"
syntax = "proto3";
package echo;

message SayRequest { string text = 1; }
message SayResponse { string text = 1; }

service Echo {
  rpc Say(SayRequest) returns (SayResponse);
}
"#;

fn at(ms: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
}

fn call(id: u64, method: &str, finished: bool) -> Vec<CallEvent> {
    let mut events = vec![
        CallEvent::new(id, EventType::ClientHeader)
            .with_timestamp(at(0))
            .with_payload(Payload::ClientHeader(ClientHeader {
                method_name: method.to_string(),
                metadata: Some(Metadata::from_pairs([("x-user", "ada")])),
                ..Default::default()
            })),
        CallEvent::new(id, EventType::ClientMessage)
            .with_payload(Payload::Message(Message::new(b"\x0a\x02hi".to_vec()))),
    ];
    if finished {
        events.push(
            CallEvent::new(id, EventType::ServerMessage)
                .with_payload(Payload::Message(Message::new(b"\x0a\x03bye".to_vec()))),
        );
        events.push(
            CallEvent::new(id, EventType::ServerTrailer)
                .with_timestamp(at(120))
                .with_payload(Payload::Trailer(Trailer {
                    status_code: 5,
                    status_message: "no such greeting".into(),
                    ..Default::default()
                })),
        );
    }
    events
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn capture(&self, name: &str, events: &[CallEvent]) -> PathBuf {
        let bytes: Vec<u8> = events
            .iter()
            .flat_map(|e| encode_event(e).unwrap().to_vec())
            .collect();
        let path = self.path(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn descriptor_set(&self) -> PathBuf {
        std::fs::write(self.path("echo.proto"), ECHO).unwrap();
        let set = protox::compile(["echo.proto"], [self.dir.path()]).unwrap();
        let path = self.path("echo.pb");
        std::fs::write(&path, set.encode_to_vec()).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_binlog"))
            .args(args)
            .current_dir(self.dir.path())
            .env_remove("RUST_LOG")
            .env_remove("BINLOG_CONFIG")
            .output()
            .unwrap()
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

async fn frames(bytes: Vec<u8>) -> Vec<CallEvent> {
    decode_stream(std::io::Cursor::new(bytes), 8)
        .collect()
        .await
        .unwrap()
}

#[test]
fn test_view_summary() {
    let ws = Workspace::new();
    let mut events = call(1, "/echo.Echo/Say", true);
    events.extend(call(2, "/echo.Echo/Say", false));
    events.push(CallEvent::new(0, EventType::Cancel));
    let capture = ws.capture("calls.bin", &events);

    let out = stdout(&ws.run(&["view", arg(&capture), "--headers", "--status-message"]));
    let lines: Vec<&str> = out.lines().collect();

    assert!(lines[0].contains("ID") && lines[0].contains("Elapsed"));
    assert!(out.contains("2023/11/14 22:13:20.000000"));
    assert!(out.contains("120ms"));
    assert!(out.contains("NOT_FOUND"));
    assert!(out.contains("(never)"));
    assert!(out.contains("->{h}"));
    assert!(out.contains(r#""x-user":"ada""#));
    assert!(out.contains("<-{s}"));
    assert!(out.contains("no such greeting"));
}

#[test]
fn test_view_expand_with_descriptor_set() {
    let ws = Workspace::new();
    let set = ws.descriptor_set();
    let mut events = call(1, "/echo.Echo/Say", true);
    events.extend(call(2, "/echo.Echo/Shout", false));
    let capture = ws.capture("calls.bin", &events);

    let out = stdout(&ws.run(&["view", arg(&capture), "--expand", "--descriptor_set", arg(&set)]));
    assert!(out.contains(r#""text": "hi""#));
    assert!(out.contains(r#""text": "bye""#));
    // An unknown method is reported inline, the run still succeeds.
    assert!(out.contains("/echo.Echo/Shout"));
}

#[test]
fn test_stats() {
    let ws = Workspace::new();
    let capture = ws.capture("calls.bin", &call(1, "/echo.Echo/Say", true));

    let out = stdout(&ws.run(&["stats", arg(&capture)]));
    assert!(out.contains("[≥0.1s]"));
    let row = out.lines().find(|l| l.contains("/echo.Echo/Say")).unwrap();
    let counts: Vec<&str> = row.split_whitespace().skip(1).collect();
    assert_eq!(counts, vec!["1", "1", "1", "0", "0", "0", "0", "0", "1", "0"]);
}

#[test]
fn test_debug_lists_every_event() {
    let ws = Workspace::new();
    let mut events = call(4, "/echo.Echo/Say", false);
    events.push(CallEvent::new(0, EventType::Cancel));
    let capture = ws.capture("calls.bin", &events);

    let out = stdout(&ws.run(&["debug", arg(&capture)]));
    assert_eq!(
        out.lines().collect::<Vec<_>>(),
        vec![
            "4\tEVENT_TYPE_CLIENT_HEADER\t/echo.Echo/Say",
            "4\tEVENT_TYPE_CLIENT_MESSAGE\t",
            "0\tEVENT_TYPE_CANCEL\t",
        ]
    );
}

#[tokio::test]
async fn test_filter_reframes_one_call() {
    let ws = Workspace::new();
    let mut events = call(1, "/echo.Echo/Say", true);
    events.extend(call(2, "/echo.Echo/Say", true));
    let capture = ws.capture("calls.bin", &events);

    let out = ws.run(&["filter", arg(&capture), "--call-id", "2"]);
    assert!(out.status.success());
    let kept = frames(out.stdout).await;
    assert_eq!(kept.len(), 4);
    assert!(kept.iter().all(|e| e.call_id == 2));
    assert_eq!(kept, events[4..].to_vec());
}

#[tokio::test]
async fn test_decode_edit_encode() {
    let ws = Workspace::new();
    let set = ws.descriptor_set();
    let events = call(7, "/echo.Echo/Say", true);
    let capture = ws.capture("calls.bin", &events);

    let decoded = stdout(&ws.run(&["decode", arg(&capture), "--expand", "--descriptor_set", arg(&set)]));
    assert!(decoded.contains(r#""decoded""#));
    let edited = decoded.replacen(r#""text": "hi""#, r#""text": "hello""#, 1);
    std::fs::write(ws.path("calls.json"), edited).unwrap();

    let out = ws.run(&["encode", "calls.json", "--descriptor_set", arg(&set)]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let rebuilt = frames(out.stdout).await;

    assert_eq!(rebuilt.len(), events.len());
    assert_eq!(rebuilt[0], events[0]);
    assert_eq!(rebuilt[1].body(), b"\x0a\x05hello");
    assert_eq!(rebuilt[2].body(), events[2].body());
    assert_eq!(rebuilt[3], events[3]);
}

#[test]
fn test_encode_without_schema_fails() {
    let ws = Workspace::new();
    let set = ws.descriptor_set();
    let capture = ws.capture("calls.bin", &call(7, "/echo.Echo/Say", false));
    let decoded = stdout(&ws.run(&["decode", arg(&capture), "--expand", "--descriptor_set", arg(&set)]));
    std::fs::write(ws.path("calls.json"), decoded).unwrap();

    let out = ws.run(&["encode", "calls.json"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("/echo.Echo/Say"));
}

#[test]
fn test_descriptor_sets_missing_and_corrupt() {
    let ws = Workspace::new();
    let capture = ws.capture("calls.bin", &call(1, "/echo.Echo/Say", true));

    let out = ws.run(&["stats", arg(&capture), "--descriptor_set", "absent.pb"]);
    assert!(out.status.success());

    std::fs::write(ws.path("corrupt.pb"), [0xff, 0xff, 0xff]).unwrap();
    let out = ws.run(&["stats", arg(&capture), "--descriptor_set", "corrupt.pb"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("corrupt.pb"));
}

#[test]
fn test_configuration_file_supplies_schema() {
    let ws = Workspace::new();
    let set = ws.descriptor_set();
    std::fs::write(
        ws.path("binlog.toml"),
        format!("[schema]\ndescriptor_sets = [{:?}]\n", arg(&set)),
    )
    .unwrap();
    let capture = ws.capture("calls.bin", &call(1, "/echo.Echo/Say", true));

    let out = stdout(&ws.run(&["view", arg(&capture), "--expand"]));
    assert!(out.contains(r#""text": "bye""#));
}

#[test]
fn test_replay_unreachable_target_fails() {
    let ws = Workspace::new();
    let capture = ws.capture("calls.bin", &call(1, "/echo.Echo/Say", true));

    let out = ws.run(&["replay", arg(&capture), "--target", "127.0.0.1:1"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("127.0.0.1:1"));
}
