//! EIP-1328 pairing URI, version 1 form:
//! `wc:{topic}@{version}?bridge={url}&key={hex}`

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("Expecting protocol \"wc\" but \"{protocol}\" is found.")]
    UnexpectedProtocol { protocol: String },
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("Failed to parse topic and version")]
    InvalidTopicAndVersion,
    #[error("Bridge url not found")]
    BridgeNotFound,
    #[error("Key not found")]
    KeyNotFound,
    #[error("Key is not hexadecimal: {0:?}")]
    InvalidKey(String),
    #[error("Unexpected parameter, key: {0:?}, value: {1:?}")]
    UnexpectedParameter(String, String),
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingUri {
    pub topic: String,
    pub version: String,
    pub bridge: Url,
    pub key: String,
}

impl PairingUri {
    pub fn new(topic: impl Into<String>, bridge: Url, key: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            version: String::from("1"),
            bridge,
            key: key.into(),
        }
    }

    fn parse_topic_and_version(path: &str) -> Result<(String, String), ParseError> {
        let caps = Regex::new(r"^(?P<topic>[[:word:]-]+)@(?P<version>\d+)$")
            .expect("invalid regex")
            .captures(path)
            .ok_or(ParseError::InvalidTopicAndVersion)?;
        let topic = caps
            .name("topic")
            .ok_or(ParseError::InvalidTopicAndVersion)?
            .as_str()
            .to_owned();
        let version = caps
            .name("version")
            .ok_or(ParseError::InvalidTopicAndVersion)?
            .as_str()
            .to_owned();
        Ok((topic, version))
    }

    fn parse_params(url: &Url) -> Result<(Url, String), ParseError> {
        let mut bridge: Option<String> = None;
        let mut key: Option<String> = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "bridge" => bridge = Some((*v).to_owned()),
                "key" => key = Some((*v).to_owned()),
                _ => {
                    return Err(ParseError::UnexpectedParameter(
                        (*k).to_owned(),
                        (*v).to_owned(),
                    ))
                }
            }
        }
        let bridge = Url::parse(&bridge.ok_or(ParseError::BridgeNotFound)?)?;
        let key = key.ok_or(ParseError::KeyNotFound)?;
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidKey(key));
        }
        Ok((bridge, key))
    }
}

impl Debug for PairingUri {
    /// Debug with key masked.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingUri")
            .field("topic", &self.topic)
            .field("version", &self.version)
            .field("bridge", &self.bridge.as_str())
            .field("key", &"***")
            .finish()
    }
}

impl Display for PairingUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "wc:{}@{}?bridge={}&key={}",
            self.topic, self.version, self.bridge, self.key
        )
    }
}

impl FromStr for PairingUri {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::from_str(s)?;
        if url.scheme() != "wc" {
            return Err(ParseError::UnexpectedProtocol {
                protocol: url.scheme().to_owned(),
            });
        }
        let (topic, version) = Self::parse_topic_and_version(url.path())?;
        let (bridge, key) = Self::parse_params(&url)?;
        Ok(Self {
            topic,
            version,
            bridge,
            key,
        })
    }
}
