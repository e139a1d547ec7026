//! Unit tests for child session management

use super::*;
use tokio::io::{duplex, AsyncBufReadExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

/// Scripted stand-in for an agent: answers `Update` with the queued counts
/// and returns every line it received once `Stop` arrives or the channel closes.
fn fake_agent(counts: Vec<u64>) -> (ChildSession<DuplexStream, DuplexStream>, JoinHandle<Vec<String>>) {
    let (parent_in, mut child_out) = duplex(256);
    let (parent_out, child_in) = duplex(256);

    let task = tokio::spawn(async move {
        let mut counts = counts.into_iter();
        let mut lines = BufReader::new(child_in).lines();
        let mut seen = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            seen.push(line.clone());
            match line.as_str() {
                "Update" => {
                    let count = counts.next().unwrap_or(0);
                    child_out.write_all(format!("{}\n", count).as_bytes()).await.unwrap();
                }
                "Stop" => break,
                _ => {}
            }
        }
        seen
    });

    (ChildSession::with_io(parent_in, parent_out), task)
}

#[test]
fn test_session_builder_defaults() {
    let builder = SessionBuilder::new("/usr/bin/agent");

    assert_eq!(builder.program, PathBuf::from("/usr/bin/agent"));
    assert_eq!(builder.identity, "child");
    assert!(!builder.debug);
    assert_eq!(builder.stop_timeout, Duration::from_secs(10));
}

#[test]
fn test_session_builder_args() {
    let builder = SessionBuilder::new("agent")
        .with_identity("3")
        .with_debug(true)
        .with_arg("--sleep-ms")
        .with_arg("5");

    let args = builder.build_args();
    let expected: Vec<OsString> = ["-", "-", "3", "true", "--sleep-ms", "5"]
        .iter()
        .map(OsString::from)
        .collect();
    assert_eq!(args, expected);
}

#[test]
fn test_session_builder_debug_off() {
    let args = SessionBuilder::new("agent").with_identity("a").build_args();
    assert_eq!(args[3], OsString::from("false"));
    assert_eq!(args.len(), 4);
}

#[tokio::test]
async fn test_update_parses_count() {
    let (mut session, agent) = fake_agent(vec![3, 0]);

    assert_eq!(session.update().await.unwrap(), 3);
    assert_eq!(session.update().await.unwrap(), 0);
    assert!(session.stop().await.unwrap().is_none());

    assert_eq!(agent.await.unwrap(), vec!["Update", "Update", "Stop"]);
}

#[tokio::test]
async fn test_send_line_passes_text_through() {
    let (mut session, agent) = fake_agent(vec![]);

    session.send_line("").await.unwrap();
    session.send_line("Ping").await.unwrap();
    session.stop().await.unwrap();

    assert_eq!(agent.await.unwrap(), vec!["", "Ping", "Stop"]);
}

#[tokio::test]
async fn test_update_on_closed_channel() {
    let (parent_in, child_out) = duplex(64);
    let (parent_out, _child_in) = duplex(64);
    drop(child_out);

    let mut session = ChildSession::with_io(parent_in, parent_out);
    let result = session.update().await;

    assert!(matches!(result, Err(ChildPipeError::ChannelClosed)));
}

#[tokio::test]
async fn test_update_rejects_garbage_reply() {
    let (parent_in, mut child_out) = duplex(64);
    let (parent_out, _child_in) = duplex(64);
    child_out.write_all(b"lots\n").await.unwrap();

    let mut session = ChildSession::with_io(parent_in, parent_out);
    let result = session.update().await;

    assert!(matches!(
        result,
        Err(ChildPipeError::Protocol(childpipe_proto::ProtocolError::InvalidCount(_)))
    ));
}

#[tokio::test]
async fn test_spawn_missing_program() {
    let result = SessionBuilder::new("/nonexistent/childpipe-agent").spawn();
    assert!(matches!(result, Err(ChildPipeError::Spawn(_))));
}
