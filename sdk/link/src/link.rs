use hongbao_threshold::Identity;
use url::form_urlencoded;

use crate::amount::Amount;
use crate::error::LinkError;
use crate::payload::KeyPayload;

pub const REDEEM_ROUTE: &str = "redeem";

/// Decoded contents of a shareable link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketLink {
    /// Ciphertext, envelope JSON or plain key, as carried in the link
    pub key: String,
    /// Unix seconds after which the registry releases the key
    pub timestamp: u64,
    pub amount: Amount,
    pub protected: bool,
    /// Absent on first-generation links (server-side time-lock)
    pub identity: Option<Identity>,
}

impl PacketLink {
    pub fn new(payload: &KeyPayload, timestamp: u64, amount: Amount, identity: Option<Identity>) -> Self {
        Self {
            key: payload.encode(),
            timestamp,
            amount,
            protected: matches!(payload, KeyPayload::Password(_)),
            identity,
        }
    }

    /// `#redeem?key=..&timestamp=..&amount=..&protected=..[&identity=..]`
    pub fn encode(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("key", &self.key);
        query.append_pair("timestamp", &self.timestamp.to_string());
        query.append_pair("amount", &self.amount.to_string());
        query.append_pair("protected", if self.protected { "true" } else { "false" });
        if let Some(identity) = &self.identity {
            query.append_pair("identity", &identity.to_hex());
        }
        format!("#{REDEEM_ROUTE}?{}", query.finish())
    }

    /// Full URL: `base` with any existing fragment replaced.
    pub fn to_url(&self, base: &str) -> String {
        let base = base.split_once('#').map(|(b, _)| b).unwrap_or(base);
        format!("{base}{}", self.encode())
    }

    /// Parse a bare fragment (`#redeem?...` or `redeem?...`) or a full URL.
    ///
    /// Returns `None` if the route is not `redeem` or if `key`, `timestamp`
    /// or `amount` is missing or unparsable. A present but invalid
    /// `identity` also rejects the link.
    pub fn decode(input: &str) -> Option<Self> {
        let input = input.trim();
        let fragment = input.split_once('#').map(|(_, f)| f).unwrap_or(input);
        let query = fragment.strip_prefix(REDEEM_ROUTE)?.strip_prefix('?')?;

        let mut key = None;
        let mut timestamp = None;
        let mut amount = None;
        let mut protected = None;
        let mut identity = None;

        // first occurrence wins
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                "key" if key.is_none() => key = Some(value.into_owned()),
                "timestamp" if timestamp.is_none() => timestamp = Some(value.into_owned()),
                "amount" if amount.is_none() => amount = Some(value.into_owned()),
                "protected" if protected.is_none() => protected = Some(value.into_owned()),
                "identity" if identity.is_none() => identity = Some(value.into_owned()),
                _ => {}
            }
        }

        let key = key.filter(|k| !k.is_empty())?;
        let timestamp = timestamp?.parse().ok()?;
        let amount = amount?.parse().ok()?;
        let protected = protected.is_some_and(|p| p == "true" || p == "1");
        let identity = match identity.filter(|i| !i.is_empty()) {
            Some(hex) => Some(hex.parse().ok()?),
            None => None,
        };

        Some(Self {
            key,
            timestamp,
            amount,
            protected,
            identity,
        })
    }

    /// Classify the `key` value.
    pub fn payload(&self) -> Result<KeyPayload, LinkError> {
        KeyPayload::parse(&self.key)
    }
}
