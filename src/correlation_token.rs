use rand::Rng;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

// 48 bit millisecond timestamp followed by 80 random bits, 5 bits per character.
pub(crate) const TOKEN_LEN: usize = 26;
const TIMESTAMP_BITS: u32 = 48;
const RANDOM_BITS: u32 = 80;

// Minimum datagram size every IPv4 host must accept (RFC 791), minus the largest IPv4 header
// and the ICMP echo header.
pub(crate) const MAX_TOKEN_PAYLOAD: usize = 576 - 60 - 8;

const _: () = assert!(TOKEN_LEN <= MAX_TOKEN_PAYLOAD);

/// Identifier carried in the payload of an echo request.
///
/// Tokens sort by creation time (millisecond resolution). Within the same millisecond they
/// differ in 80 random bits drawn from the calling thread's generator, so concurrent senders
/// never coordinate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    #[must_use]
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let random: u128 = rand::thread_rng().gen();
        Self::from_parts(millis, random)
    }

    fn from_parts(millis: u128, random: u128) -> Self {
        let timestamp = millis & ((1u128 << TIMESTAMP_BITS) - 1);
        let random = random & ((1u128 << RANDOM_BITS) - 1);
        Self(encode((timestamp << RANDOM_BITS) | random))
    }

    /// Reads a token from the start of an echo payload. Trailing bytes are ignored.
    pub(crate) fn from_payload(payload: &[u8]) -> Option<Self> {
        let candidate = payload.get(..TOKEN_LEN)?;
        // 130 encoded bits hold a 128 bit value, so the leading character is at most '7'.
        if candidate[0] > b'7' || !candidate.iter().all(|b| CROCKFORD_ALPHABET.contains(b)) {
            return None;
        }
        std::str::from_utf8(candidate)
            .ok()
            .map(|s| CorrelationToken(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn encode(mut value: u128) -> String {
    let mut encoded = [0u8; TOKEN_LEN];
    for slot in encoded.iter_mut().rev() {
        #[allow(clippy::cast_possible_truncation)]
        let index = (value & 0x1F) as usize;
        *slot = CROCKFORD_ALPHABET[index];
        value >>= 5;
    }
    encoded.iter().map(|&b| char::from(b)).collect()
}
