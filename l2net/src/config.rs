//! Session configuration.
//!
//! Sessions are described by a flat map of string keys to string values, parsed by whoever
//! builds sessions from connection strings. [`Settings::from_config`] extracts the typed values
//! the sessions of this crate understand:
//!
//! | Key                    | Value                       | Required                  |
//! |------------------------|-----------------------------|---------------------------|
//! | `Adapter`              | name of a network adapter   | yes                       |
//! | `IP`                   | IPv4 address of the peer    | yes                       |
//! | `Port`                 | TCP port of the peer        | yes                       |
//! | `MAC`                  | hardware address of the peer| no, resolved if absent    |
//! | `SEND_GRATUITUS`       | `true` or `false`           | no, defaults to `true`    |
//! | `RESPONSE_TELNET_CTRL` | `true` or `false`           | no, defaults to `true`    |
//!
//! Keys are case sensitive, boolean values are not. An empty value counts as absent.
//!
//! [`Settings::from_config`]: struct.Settings.html#method.from_config
use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::layer::{Error, Result};
use crate::wire::EthernetAddress;

/// A parsed key/value configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    /// An empty configuration.
    pub fn new() -> Self {
        Config::default()
    }

    /// Set a key, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// The value of a key, `None` if it is absent or empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Iterate over all keys.
    pub fn keys(&self) -> impl Iterator<Item=&str> + '_ {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Config {
    fn from_iter<I: IntoIterator<Item=(K, V)>>(iter: I) -> Self {
        Config {
            values: iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// The typed settings of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// The name of the adapter to connect through.
    pub adapter: String,
    /// The address of the peer.
    pub ip: Ipv4Addr,
    /// The port of the peer.
    pub port: u16,
    /// A static hardware address of the peer, skips resolution.
    pub mac: Option<EthernetAddress>,
    /// Send gratuitous ARP when reads find no data for a while.
    pub send_gratuitous: bool,
    /// Answer Telnet negotiations of the peer.
    pub respond_telnet: bool,
}

impl Settings {
    /// Key of the adapter name.
    pub const ADAPTER: &'static str = "Adapter";
    /// Key of the peer address.
    pub const IP: &'static str = "IP";
    /// Key of the peer port.
    pub const PORT: &'static str = "Port";
    /// Key of the static peer hardware address.
    pub const MAC: &'static str = "MAC";
    /// Key of the idle probe flag, spelled the way existing configurations spell it.
    pub const SEND_GRATUITOUS: &'static str = "SEND_GRATUITUS";
    /// Key of the Telnet response flag.
    pub const RESPONSE_TELNET_CTRL: &'static str = "RESPONSE_TELNET_CTRL";

    const KEYS: [&'static str; 6] = [
        Self::ADAPTER,
        Self::IP,
        Self::PORT,
        Self::MAC,
        Self::SEND_GRATUITOUS,
        Self::RESPONSE_TELNET_CTRL,
    ];

    /// Extract the settings from a configuration.
    ///
    /// Fails on the first required key that is missing or any value that does not parse.
    /// Unknown keys are ignored.
    pub fn from_config(config: &Config) -> Result<Self> {
        for key in config.keys().filter(|key| !Self::KEYS.iter().any(|known| known == key)) {
            net_debug!("ignoring unknown configuration key `{}`", key);
        }

        let adapter = required(config, Self::ADAPTER)?.to_string();
        let ip = required(config, Self::IP)?
            .trim()
            .parse()
            .map_err(|_| Error::InvalidValue(Self::IP))?;
        let port = required(config, Self::PORT)?
            .trim()
            .parse()
            .map_err(|_| Error::InvalidValue(Self::PORT))?;
        let mac = config.get(Self::MAC)
            .map(|value| value.trim().parse().map_err(|_| Error::InvalidValue(Self::MAC)))
            .transpose()?;

        Ok(Settings {
            adapter,
            ip,
            port,
            mac,
            send_gratuitous: flag(config, Self::SEND_GRATUITOUS, true)?,
            respond_telnet: flag(config, Self::RESPONSE_TELNET_CTRL, true)?,
        })
    }
}

fn required<'a>(config: &'a Config, key: &'static str) -> Result<&'a str> {
    config.get(key).ok_or(Error::MissingKey(key))
}

fn flag(config: &Config, key: &'static str, default: bool) -> Result<bool> {
    match config.get(key).map(str::trim) {
        None => Ok(default),
        Some(value) if value.eq_ignore_ascii_case("true") => Ok(true),
        Some(value) if value.eq_ignore_ascii_case("false") => Ok(false),
        Some(_) => Err(Error::InvalidValue(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        [("Adapter", "SOCKET_1"), ("IP", "192.168.1.1"), ("Port", "23")]
            .iter()
            .copied()
            .collect()
    }

    #[test]
    fn defaults() {
        let settings = Settings::from_config(&base()).unwrap();
        assert_eq!(settings, Settings {
            adapter: "SOCKET_1".to_string(),
            ip: Ipv4Addr::new(192, 168, 1, 1),
            port: 23,
            mac: None,
            send_gratuitous: true,
            respond_telnet: true,
        });
    }

    #[test]
    fn optional_keys() {
        let mut config = base();
        config
            .set("MAC", "00-11-22-33-44-55")
            .set("SEND_GRATUITUS", "False")
            .set("RESPONSE_TELNET_CTRL", "TRUE")
            .set("ConfigFile", "ignored");

        let settings = Settings::from_config(&config).unwrap();
        assert_eq!(settings.mac, Some(EthernetAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])));
        assert!(!settings.send_gratuitous);
        assert!(settings.respond_telnet);
    }

    #[test]
    fn empty_is_absent() {
        let mut config = base();
        config.set("MAC", "").set("SEND_GRATUITUS", "");
        let settings = Settings::from_config(&config).unwrap();
        assert_eq!(settings.mac, None);
        assert!(settings.send_gratuitous);

        config.set("Port", "");
        assert_eq!(Settings::from_config(&config), Err(Error::MissingKey("Port")));
    }

    #[test]
    fn missing_keys() {
        for &key in &["Adapter", "IP", "Port"] {
            let config: Config = base().values
                .into_iter()
                .filter(|(name, _)| name.as_str() != key)
                .collect();
            assert_eq!(Settings::from_config(&config), Err(Error::MissingKey(key)));
        }
    }

    #[test]
    fn invalid_values() {
        let cases = [
            ("IP", "192.168.1"),
            ("Port", "65536"),
            ("Port", "-1"),
            ("MAC", "00:11:22:33:44"),
            ("SEND_GRATUITUS", "yes"),
            ("RESPONSE_TELNET_CTRL", "1"),
        ];

        for &(key, value) in cases.iter() {
            let mut config = base();
            config.set(key, value);
            match Settings::from_config(&config) {
                Err(Error::InvalidValue(name)) => assert_eq!(name, key),
                other => panic!("{}={} gave {:?}", key, value, other),
            }
        }
    }
}
