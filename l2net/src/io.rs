//! Byte streams and session transcripts.
//!
//! [`ByteStream`] is the narrow interface the Telnet decoder reads through: a non-blocking read
//! of one byte and a write that takes care of delivery itself. A [`Connection`] is one, and so
//! is anything wrapping one in an `Arc`.
//!
//! [`Transcript`] accumulates everything a session read with `read_until`.
//!
//! [`ByteStream`]: trait.ByteStream.html
//! [`Connection`]: ../layer/tcp/struct.Connection.html
//! [`Transcript`]: struct.Transcript.html
use std::sync::Arc;

use parking_lot::Mutex;

use crate::layer::tcp::Connection;

/// A stream of bytes in both directions.
pub trait ByteStream {
    /// Take the next received byte, `None` when nothing is available right now.
    fn read_byte(&self) -> Option<u8>;

    /// Send bytes to the peer.
    fn write(&self, data: &[u8]);
}

impl ByteStream for Connection {
    fn read_byte(&self) -> Option<u8> {
        Connection::read_byte(self)
    }

    fn write(&self, data: &[u8]) {
        Connection::write(self, data)
    }
}

impl<T: ByteStream + ?Sized> ByteStream for Arc<T> {
    fn read_byte(&self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write(&self, data: &[u8]) {
        (**self).write(data)
    }
}

type Listener = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Everything a session has read, plus an optionally recorded fragment of it.
///
/// Listeners are called with each non-empty chunk appended.
pub struct Transcript {
    buffers: Mutex<Buffers>,
    listeners: Mutex<Vec<Listener>>,
}

struct Buffers {
    global: Vec<u8>,
    fragment: Vec<u8>,
    recording: bool,
}

impl Transcript {
    /// An empty transcript, not recording a fragment.
    pub fn new() -> Self {
        Transcript {
            buffers: Mutex::new(Buffers {
                global: Vec::new(),
                fragment: Vec::new(),
                recording: false,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Append a chunk that was read.
    pub fn append(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }

        {
            let mut buffers = self.buffers.lock();
            buffers.global.extend_from_slice(chunk);
            if buffers.recording {
                buffers.fragment.extend_from_slice(chunk);
            }
        }

        let listeners = self.listeners.lock().clone();
        for listener in listeners.iter() {
            listener(chunk);
        }
    }

    /// A copy of everything read so far.
    pub fn global(&self) -> Vec<u8> {
        self.buffers.lock().global.clone()
    }

    /// Start recording a new fragment, discarding the previous one.
    pub fn record_fragment(&self) {
        let mut buffers = self.buffers.lock();
        buffers.fragment.clear();
        buffers.recording = true;
    }

    /// Stop recording and take the fragment.
    pub fn take_fragment(&self) -> Vec<u8> {
        let mut buffers = self.buffers.lock();
        buffers.recording = false;
        core::mem::take(&mut buffers.fragment)
    }

    /// Whether a fragment is being recorded.
    pub fn is_recording(&self) -> bool {
        self.buffers.lock().recording
    }

    /// Forget everything read so far.
    pub fn clear(&self) {
        let mut buffers = self.buffers.lock();
        buffers.global.clear();
        buffers.fragment.clear();
    }

    /// Register a callback for appended chunks.
    pub fn on_update<F>(&self, listener: F)
        where F: Fn(&[u8]) + Send + Sync + 'static
    {
        self.listeners.lock().push(Arc::new(listener));
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Transcript::new()
    }
}

/// Collect output until `step` reports the end of the stream or the output ends with `marker`.
///
/// `step` appends any number of bytes to the output and returns `false` once the stream has no
/// more bytes. An empty marker never matches.
pub(crate) fn read_until<F>(marker: &[u8], mut step: F) -> Vec<u8>
    where F: FnMut(&mut Vec<u8>) -> bool
{
    let mut output = Vec::new();
    while step(&mut output) {
        if !marker.is_empty() && output.ends_with(marker) {
            break;
        }
    }
    output
}

/// Interpret bytes as ISO 8859-1, every byte is one character.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| char::from(byte)).collect()
}

/// Encode text as ISO 8859-1, `None` if it contains characters outside of it.
pub fn string_to_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_recording() {
        let transcript = Transcript::new();
        transcript.append(b"before ");
        transcript.record_fragment();
        assert!(transcript.is_recording());
        transcript.append(b"during");
        assert_eq!(transcript.take_fragment(), b"during");
        assert!(!transcript.is_recording());
        transcript.append(b" after");

        assert_eq!(transcript.global(), b"before during after");
        assert!(transcript.take_fragment().is_empty());
    }

    #[test]
    fn listeners_see_non_empty_chunks() {
        let transcript = Transcript::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            transcript.on_update(move |chunk| seen.lock().push(chunk.to_vec()));
        }

        transcript.append(b"");
        transcript.append(b"one");
        transcript.append(b"two");
        assert_eq!(*seen.lock(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn stops_at_marker() {
        let mut input = b"hello\r\nworld".iter();
        let output = read_until(b"\r\n", |out| match input.next() {
            Some(&byte) => { out.push(byte); true },
            None => false,
        });
        assert_eq!(output, b"hello\r\n");
        assert_eq!(input.as_slice(), b"world");
    }

    #[test]
    fn empty_marker_reads_everything() {
        let mut input = b"abc".iter();
        let output = read_until(b"", |out| match input.next() {
            Some(&byte) => { out.push(byte); true },
            None => false,
        });
        assert_eq!(output, b"abc");
    }

    #[test]
    fn latin1() {
        assert_eq!(latin1_to_string(&[b'a', 0xFF, 0xE9]), "a\u{ff}\u{e9}");
        assert_eq!(string_to_latin1("a\u{ff}"), Some(vec![b'a', 0xFF]));
        assert_eq!(string_to_latin1("\u{20ac}"), None);
    }
}
