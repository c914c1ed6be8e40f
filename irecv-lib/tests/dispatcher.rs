//! Tests for routing operator input to a session

mod common;

use common::*;
use irecv_lib::transport::Pipe;
use irecv_lib::{ControlSetup, Directive, Dispatcher, Flow, IrecvError};
use std::path::PathBuf;
use std::time::Duration;

fn dispatcher(state: &Shared) -> Dispatcher<MockTransport> {
    let dispatcher = Dispatcher::new(open_recovery(state));
    clear_events(state);
    dispatcher
}

fn run(dispatcher: &mut Dispatcher<MockTransport>, line: &str) -> Result<Flow, IrecvError> {
    let directive = Directive::parse(line).expect("parse").expect("non-blank line");
    dispatcher.execute(directive)
}

/// A file under the system temp dir, removed on drop
struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str, contents: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!("irecv-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).expect("Failed to write temp file");
        Self(path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn test_raw_line_becomes_a_command() {
    let state = shared(MockState::default());
    let mut dispatcher = dispatcher(&state);

    assert_eq!(run(&mut dispatcher, "setenv auto-boot true").expect("execute"), Flow::Continue);
    let sent = control_outs(&state);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ControlSetup::COMMAND);
    assert_eq!(sent[0].1, b"setenv auto-boot true\0".to_vec());
}

#[test]
fn test_drain_uses_configured_timeout() {
    let state = shared(MockState::default());
    let mut dispatcher = dispatcher(&state);
    assert_eq!(dispatcher.timeout(), Duration::from_millis(500));

    assert_eq!(run(&mut dispatcher, "/timeout 1500").expect("execute"), Flow::Continue);
    assert_eq!(dispatcher.timeout(), Duration::from_millis(1500));
    assert!(events(&state).is_empty(), "timeout is host-side only");

    let response = dispatcher.drain().expect("drain");
    assert!(response.is_empty(), "silent device yields an empty response");
    assert_eq!(
        events(&state),
        vec![Event::BulkRead {
            pipe: Pipe {
                interface: 1,
                endpoint: 0x81
            },
            len: 2048,
            timeout: Duration::from_millis(1500),
        }]
    );
}

#[test]
fn test_drain_returns_console_text() {
    let state = shared(MockState::default());
    state
        .borrow_mut()
        .bulk
        .push_back(Some(b"] \0".to_vec()));
    let mut dispatcher = dispatcher(&state);

    let response = dispatcher.drain().expect("drain");
    assert_eq!(response.bytes().len(), 3);
    assert_eq!(response.text(), "] ");
}

#[test]
fn test_drain_propagates_disconnect() {
    let state = shared(MockState {
        bulk_disconnected: true,
        ..MockState::default()
    });
    let mut dispatcher = dispatcher(&state);

    assert!(matches!(dispatcher.drain(), Err(IrecvError::Transport(_))));
}

#[test]
fn test_send_stages_and_transfers_file() {
    let file = TempFile::new("ibss.img3", &[0xA5; 3000]);
    let state = shared(MockState {
        status_flags: vec![5, 5, 6, 7].into(),
        ..MockState::default()
    });
    let mut dispatcher = dispatcher(&state);

    let line = format!("/send {}", file.0.display());
    assert_eq!(run(&mut dispatcher, &line).expect("execute"), Flow::Continue);

    let sent = control_outs(&state);
    let values: Vec<u16> = sent.iter().map(|(setup, _)| setup.value).collect();
    let lens: Vec<usize> = sent.iter().map(|(_, data)| data.len()).collect();
    assert_eq!(values, [0, 1, 2]);
    assert_eq!(lens, [2048, 952, 0]);
}

#[test]
fn test_send_missing_file_touches_nothing() {
    let state = shared(MockState::default());
    let mut dispatcher = dispatcher(&state);

    let result = run(&mut dispatcher, "/send /nonexistent/irecv/payload.bin");
    assert!(matches!(result, Err(IrecvError::Io(_))));
    assert!(events(&state).is_empty());
    assert!(dispatcher.session().is_some_and(|s| s.is_open()));
}

#[test]
fn test_exit_closes_session() {
    let state = shared(MockState::default());
    let mut dispatcher = dispatcher(&state);

    assert_eq!(run(&mut dispatcher, "/exit").expect("execute"), Flow::Finished);
    assert!(dispatcher.session().is_none());
    assert_eq!(
        events(&state),
        vec![Event::Release(1), Event::Release(0), Event::Close]
    );
}

#[test]
fn test_reset_resets_then_closes() {
    let state = shared(MockState::default());
    let mut dispatcher = dispatcher(&state);

    assert_eq!(run(&mut dispatcher, "/reset").expect("execute"), Flow::Finished);
    assert_eq!(events(&state).first(), Some(&Event::Reset));
    assert_eq!(count(&state, &Event::Close), 1);
}

#[test]
fn test_reboot_finishes_dispatch() {
    let state = shared(MockState::default());
    let mut dispatcher = dispatcher(&state);

    assert_eq!(run(&mut dispatcher, "reboot").expect("execute"), Flow::Finished);
    assert!(dispatcher.session().is_none());

    assert!(matches!(
        run(&mut dispatcher, "getenv build-version"),
        Err(IrecvError::SessionClosed)
    ));
    assert!(matches!(dispatcher.drain(), Err(IrecvError::SessionClosed)));
    assert_eq!(count(&state, &Event::Close), 1);
}

#[test]
fn test_failed_command_keeps_dispatching() {
    let state = shared(MockState {
        control_out_budget: Some(0),
        ..MockState::default()
    });
    let mut dispatcher = dispatcher(&state);

    assert!(run(&mut dispatcher, "bgcolor 0 0 0").is_err());
    assert!(dispatcher.session().is_some());

    // Host-side directives still work
    assert_eq!(run(&mut dispatcher, "/timeout 10").expect("execute"), Flow::Continue);
}
