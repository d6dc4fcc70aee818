use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::io::ByteStream;
use super::{Command, Opt, TelnetSession, IAC};

const WILL: u8 = 251;
const WONT: u8 = 252;
const DO: u8 = 253;
const DONT: u8 = 254;
const SGA: u8 = 3;
const ECHO: u8 = 1;

/// A stream with scripted input that records writes.
struct Script {
    input: Mutex<VecDeque<u8>>,
    written: Mutex<Vec<u8>>,
}

impl Script {
    fn new(input: &[u8]) -> Self {
        Script {
            input: Mutex::new(input.iter().copied().collect()),
            written: Mutex::new(Vec::new()),
        }
    }

    fn remaining(&self) -> Vec<u8> {
        self.input.lock().iter().copied().collect()
    }

    fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }
}

impl ByteStream for Script {
    fn read_byte(&self) -> Option<u8> {
        self.input.lock().pop_front()
    }

    fn write(&self, data: &[u8]) {
        self.written.lock().extend_from_slice(data);
    }
}

#[test]
fn command_values() {
    assert_eq!(u8::from(Command::Iac), IAC);
    assert_eq!(Command::from(WILL), Command::Will);
    assert_eq!(Command::from(WONT), Command::Wont);
    assert_eq!(Command::from(DO), Command::Do);
    assert_eq!(Command::from(DONT), Command::Dont);
    assert_eq!(Opt::from(SGA), Opt::SuppressGoAhead);
    assert_eq!(Opt::from(200), Opt::Unknown(200));
}

#[test]
fn escaped_iac() {
    let session = TelnetSession::new(Script::new(&[IAC, IAC, 0x41]), true);
    assert_eq!(session.read_bytes_until(&[]), vec![0xFF, 0x41]);
    assert!(session.stream().written().is_empty());
}

#[test]
fn will_is_accepted() {
    let session = TelnetSession::new(Script::new(&[IAC, WILL, SGA]), true);
    assert!(session.read_bytes_until(&[]).is_empty());
    assert_eq!(session.stream().written(), vec![IAC, DO, SGA]);
}

#[test]
fn do_is_refused() {
    let session = TelnetSession::new(Script::new(&[IAC, DO, ECHO, b'x']), true);
    assert_eq!(session.read_bytes_until(&[]), b"x");
    assert_eq!(session.stream().written(), vec![IAC, WONT, ECHO]);
}

#[test]
fn dont_and_wont_are_silent() {
    let session = TelnetSession::new(Script::new(&[IAC, DONT, ECHO, IAC, WONT, SGA, b'y']), true);
    assert_eq!(session.read_bytes_until(&[]), b"y");
    assert!(session.stream().written().is_empty());
}

#[test]
fn no_responses_when_disabled() {
    let session = TelnetSession::new(Script::new(&[IAC, WILL, SGA, IAC, DO, ECHO]), false);
    assert!(!session.responds());
    assert!(session.read_bytes_until(&[]).is_empty());
    assert!(session.stream().written().is_empty());
}

#[test]
fn nul_is_discarded() {
    let session = TelnetSession::new(Script::new(b"a\0b\0"), true);
    assert_eq!(session.read_bytes_until(&[]), b"ab");
}

#[test]
fn stops_at_marker() {
    let session = TelnetSession::new(Script::new(b"hello\r\nmore"), true);
    assert_eq!(session.read_until("\r\n"), "hello\r\n");
    assert_eq!(session.stream().remaining(), b"more");
}

#[test]
fn marker_spanning_commands() {
    let session = TelnetSession::new(Script::new(&[b'>', IAC, WILL, SGA, b' ', b'x']), true);
    assert_eq!(session.read_until("> "), "> ");
    assert_eq!(session.stream().remaining(), b"x");
}

#[test]
fn unrepresentable_marker_reads_everything() {
    let session = TelnetSession::new(Script::new(b"abc"), true);
    assert_eq!(session.read_until("\u{20ac}"), "abc");
}

#[test]
fn latin1_output() {
    let session = TelnetSession::new(Script::new(&[0xE9, IAC, IAC]), true);
    assert_eq!(session.read_until(""), "\u{e9}\u{ff}");
}

#[test]
fn transcript_collects_reads() {
    let session = TelnetSession::new(Script::new(b"one\ntwo\n"), true);
    session.transcript().record_fragment();
    assert_eq!(session.read_until("\n"), "one\n");
    assert_eq!(session.transcript().take_fragment(), b"one\n");
    assert_eq!(session.read_until("\n"), "two\n");
    // Empty reads leave no trace.
    assert_eq!(session.read_until("\n"), "");
    assert_eq!(session.transcript().global(), b"one\ntwo\n");
}

#[test]
fn dry_stream_after_iac() {
    let session = TelnetSession::new(Script::new(&[b'a', IAC]), true);
    assert_eq!(session.read_bytes_until(&[]), b"a");
    assert!(session.stream().written().is_empty());
    assert!(session.stream().remaining().is_empty());
}

#[test]
fn dry_stream_after_negotiation() {
    let session = TelnetSession::new(Script::new(&[IAC, DO]), true);
    assert!(session.read_bytes_until(&[]).is_empty());
    assert!(session.stream().written().is_empty());

    // A later read starts outside of any command.
    session.stream().input.lock().extend([IAC, IAC, b'b']);
    assert_eq!(session.read_bytes_until(&[]), vec![0xFF, b'b']);
}
