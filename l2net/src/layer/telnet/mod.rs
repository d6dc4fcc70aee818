//! Telnet command decoding on top of a byte stream.
//!
//! The decoder separates the data of a Telnet connection from the interpret-as-command
//! sequences embedded in it. It does not track the negotiated options, each request of the peer
//! is answered on its own:
//!
//! * `IAC IAC` is a literal `0xFF` data byte.
//! * `IAC DO opt` is refused with `IAC WONT opt`.
//! * `IAC WILL opt` is accepted with `IAC DO opt`.
//! * `IAC DONT opt` and `IAC WONT opt` are consumed without an answer.
//! * `IAC` with any other command consumes just the two bytes.
//! * `NUL` bytes are dropped.
//!
//! Answers are only sent when the session is configured to respond.
//!
//! [`TelnetSession`] reads through any [`ByteStream`] with this decoder.
//!
//! [`TelnetSession`]: struct.TelnetSession.html
//! [`ByteStream`]: ../../io/trait.ByteStream.html
mod decoder;
mod session;
#[cfg(test)]
mod tests;

pub use decoder::{Action, Decoder};
pub use session::TelnetSession;

/// The interpret-as-command byte.
pub const IAC: u8 = 255;

enum_with_unknown! {
    /// A Telnet command, the byte following `IAC`.
    pub enum Command(u8) {
        EndOfRecord = 239,
        SubnegotiationEnd = 240,
        Nop = 241,
        DataMark = 242,
        Break = 243,
        InterruptProcess = 244,
        AbortOutput = 245,
        AreYouThere = 246,
        EraseCharacter = 247,
        EraseLine = 248,
        GoAhead = 249,
        Subnegotiation = 250,
        Will = 251,
        Wont = 252,
        Do = 253,
        Dont = 254,
        Iac = 255
    }
}

enum_with_unknown! {
    /// A Telnet option, the subject of a negotiation.
    pub enum Opt(u8) {
        Binary = 0,
        Echo = 1,
        SuppressGoAhead = 3,
        Status = 5,
        TimingMark = 6,
        TerminalType = 24,
        WindowSize = 31,
        TerminalSpeed = 32,
        LineMode = 34
    }
}

impl Command {
    /// Whether the command is followed by an option byte.
    pub fn is_negotiation(self) -> bool {
        match self {
            Command::Will | Command::Wont | Command::Do | Command::Dont => true,
            _ => false,
        }
    }
}
