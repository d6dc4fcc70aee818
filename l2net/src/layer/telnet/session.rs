use crate::io::{self, ByteStream, Transcript};
use super::{Action, Decoder};

/// A Telnet session over a byte stream.
///
/// Reads decode the command sequences of the peer and answer its negotiations, if configured to
/// do so, through the same stream. Everything read with [`read_bytes_until`] is appended to the
/// transcript of the session.
///
/// [`read_bytes_until`]: #method.read_bytes_until
pub struct TelnetSession<S> {
    stream: S,
    respond: bool,
    transcript: Transcript,
}

impl<S: ByteStream> TelnetSession<S> {
    /// Wrap a stream, `respond` selects whether negotiations are answered.
    pub fn new(stream: S, respond: bool) -> Self {
        TelnetSession {
            stream,
            respond,
            transcript: Transcript::new(),
        }
    }

    /// The underlying stream.
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Whether negotiations of the peer are answered.
    pub fn responds(&self) -> bool {
        self.respond
    }

    /// The transcript of everything read.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Read decoded data until the stream runs dry or the data ends with `marker`.
    ///
    /// Does not block for data, a stream without data ends the read. An empty marker reads
    /// everything currently available. The decoded data is appended to the transcript and
    /// returned.
    pub fn read_bytes_until(&self, marker: &[u8]) -> Vec<u8> {
        let mut decoder = Decoder::new(self.respond);

        let data = io::read_until(marker, |output| {
            let byte = match self.stream.read_byte() {
                Some(byte) => byte,
                None => return false,
            };

            match decoder.feed(byte) {
                Action::Data(byte) => output.push(byte),
                Action::Reply(reply) => self.stream.write(&reply),
                Action::Consumed => (),
            }
            true
        });

        if decoder.is_pending() {
            net_debug!("telnet: stream ended within a command sequence");
        }

        self.transcript.append(&data);
        data
    }

    /// Like [`read_bytes_until`], with text in ISO 8859-1.
    ///
    /// A marker that is not representable in it can never match.
    ///
    /// [`read_bytes_until`]: #method.read_bytes_until
    pub fn read_until(&self, marker: &str) -> String {
        let data = match io::string_to_latin1(marker) {
            Some(marker) => self.read_bytes_until(&marker),
            None => self.read_bytes_until(&[]),
        };
        io::latin1_to_string(&data)
    }
}
