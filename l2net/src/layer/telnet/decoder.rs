use super::{Command, Opt, IAC};

/// What the caller has to do with one decoded byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Deliver a data byte to the application.
    Data(u8),
    /// Send these bytes back to the peer.
    Reply([u8; 3]),
    /// The byte was consumed by the decoder.
    Consumed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Data,
    /// Just read `IAC`.
    Escape,
    /// Waiting for the option of a negotiation command.
    Negotiation(Command),
}

/// A byte at a time Telnet decoder.
///
/// Feed every received byte through [`feed`] and act on the returned [`Action`]. A decoder only
/// remembers a partially read command sequence, create a new one for every read.
///
/// [`feed`]: #method.feed
/// [`Action`]: enum.Action.html
#[derive(Clone, Debug)]
pub struct Decoder {
    state: State,
    respond: bool,
}

impl Decoder {
    /// Create a decoder, `respond` selects whether negotiations are answered.
    pub fn new(respond: bool) -> Self {
        Decoder {
            state: State::Data,
            respond,
        }
    }

    /// Whether the decoder is in the middle of a command sequence.
    pub fn is_pending(&self) -> bool {
        self.state != State::Data
    }

    /// Decode the next byte of the stream.
    pub fn feed(&mut self, byte: u8) -> Action {
        match self.state {
            State::Data => match byte {
                IAC => {
                    self.state = State::Escape;
                    Action::Consumed
                },
                0 => Action::Consumed,
                byte => Action::Data(byte),
            },
            State::Escape => match Command::from(byte) {
                Command::Iac => {
                    self.state = State::Data;
                    Action::Data(IAC)
                },
                command if command.is_negotiation() => {
                    self.state = State::Negotiation(command);
                    Action::Consumed
                },
                command => {
                    net_trace!("telnet: ignoring command {:?}", command);
                    self.state = State::Data;
                    Action::Consumed
                },
            },
            State::Negotiation(command) => {
                self.state = State::Data;
                self.negotiate(command, byte)
            },
        }
    }

    fn negotiate(&self, command: Command, option: u8) -> Action {
        net_trace!("telnet: peer sent {:?} {:?}", command, Opt::from(option));

        if !self.respond {
            return Action::Consumed;
        }

        let answer = match command {
            Command::Do => Command::Wont,
            Command::Will => Command::Do,
            _ => return Action::Consumed,
        };

        Action::Reply([IAC, answer.into(), option])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(decoder: &mut Decoder, bytes: &[u8]) -> Vec<Action> {
        bytes.iter().map(|&byte| decoder.feed(byte)).collect()
    }

    #[test]
    fn pending_sequence() {
        let mut decoder = Decoder::new(true);
        assert!(!decoder.is_pending());
        decoder.feed(IAC);
        assert!(decoder.is_pending());
        decoder.feed(Command::Do.into());
        assert!(decoder.is_pending());
        decoder.feed(Opt::Echo.into());
        assert!(!decoder.is_pending());
    }

    #[test]
    fn other_commands_consume_two_bytes() {
        let mut decoder = Decoder::new(true);
        let actions = decode(&mut decoder, &[IAC, Command::GoAhead.into(), b'a']);
        assert_eq!(actions, vec![Action::Consumed, Action::Consumed, Action::Data(b'a')]);
    }

    #[test]
    fn nul_only_dropped_as_data() {
        let mut decoder = Decoder::new(true);
        // As an option byte NUL is the binary option.
        let actions = decode(&mut decoder, &[0, IAC, Command::Will.into(), 0]);
        assert_eq!(actions, vec![
            Action::Consumed,
            Action::Consumed,
            Action::Consumed,
            Action::Reply([IAC, Command::Do.into(), Opt::Binary.into()]),
        ]);
    }
}
