//! Plugin-message frames understood by the chat bridge.
//!
//! A frame is a sequence of strings, each a big-endian `u16` byte length followed by
//! modified UTF-8: UTF-16 code units encoded one by one, with NUL written as `C0 80`.

use crate::error::{BridgeError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Plugin channel the proxy forwards bridge frames on.
pub const BRIDGE_CHANNEL: &str = "mcme:connect";

/// First string of every chat-bridge frame.
pub const DISCORD_SUBCHANNEL: &str = "Discord";

const MAX_STRING_BYTES: usize = u16::MAX as usize;

fn encoded_len(text: &str) -> usize {
    text.encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}

/// Appends `text` as a length-prefixed modified UTF-8 string.
pub fn put_string(buf: &mut BytesMut, text: &str) -> Result<()> {
    let len = encoded_len(text);
    if len > MAX_STRING_BYTES {
        return Err(BridgeError::StringTooLong { len });
    }
    buf.reserve(2 + len);
    buf.put_u16(len as u16);
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => buf.put_u8(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                buf.put_u8(0xC0 | (unit >> 6) as u8);
                buf.put_u8(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                buf.put_u8(0xE0 | (unit >> 12) as u8);
                buf.put_u8(0x80 | ((unit >> 6) & 0x3F) as u8);
                buf.put_u8(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    Ok(())
}

fn ensure(buf: &impl Buf, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(BridgeError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn continuation(byte: u8) -> Result<u16> {
    if byte & 0xC0 != 0x80 {
        return Err(BridgeError::Malformed(format!(
            "expected continuation byte, found {byte:#04x}"
        )));
    }
    Ok(u16::from(byte & 0x3F))
}

/// Reads one length-prefixed modified UTF-8 string.
pub fn get_string(buf: &mut impl Buf) -> Result<String> {
    ensure(buf, 2)?;
    let len = usize::from(buf.get_u16());
    ensure(buf, len)?;
    let raw = buf.copy_to_bytes(len);

    let mut units = Vec::with_capacity(len);
    let mut bytes = raw.iter().copied();
    while let Some(lead) = bytes.next() {
        let mut next = || {
            bytes
                .next()
                .ok_or_else(|| BridgeError::Malformed("sequence cut short".into()))
        };
        let unit = match lead {
            0x00..=0x7F => u16::from(lead),
            0xC0..=0xDF => (u16::from(lead & 0x1F) << 6) | continuation(next()?)?,
            0xE0..=0xEF => {
                let high = continuation(next()?)?;
                let low = continuation(next()?)?;
                (u16::from(lead & 0x0F) << 12) | (high << 6) | low
            }
            _ => {
                return Err(BridgeError::Malformed(format!(
                    "invalid lead byte {lead:#04x}"
                )))
            }
        };
        units.push(unit);
    }
    String::from_utf16(&units).map_err(|err| BridgeError::Malformed(err.to_string()))
}

/// One message for a chat-bridge channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordMessage {
    pub channel: String,
    pub text: String,
}

impl DiscordMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
        }
    }

    /// Prefixes the text with a mention of `role`.
    #[must_use]
    pub fn ping(mut self, role: &str) -> Self {
        self.text = format!("@{role} {}", self.text);
        self
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        put_string(&mut buf, DISCORD_SUBCHANNEL)?;
        put_string(&mut buf, &self.channel)?;
        put_string(&mut buf, &self.text)?;
        Ok(buf.freeze())
    }

    pub fn decode(mut payload: impl Buf) -> Result<Self> {
        let subchannel = get_string(&mut payload)?;
        if subchannel != DISCORD_SUBCHANNEL {
            return Err(BridgeError::UnexpectedSubchannel(subchannel));
        }
        let channel = get_string(&mut payload)?;
        let text = get_string(&mut payload)?;
        if payload.has_remaining() {
            return Err(BridgeError::Malformed(format!(
                "{} trailing bytes",
                payload.remaining()
            )));
        }
        Ok(Self { channel, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode_one(text: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        put_string(&mut buf, text).unwrap();
        buf.to_vec()
    }

    #[test]
    fn ascii_is_length_prefixed() {
        assert_eq!(
            encode_one("Discord"),
            vec![0, 7, b'D', b'i', b's', b'c', b'o', b'r', b'd']
        );
    }

    #[test]
    fn nul_and_supplementary_use_java_forms() {
        assert_eq!(encode_one("\0"), vec![0, 2, 0xC0, 0x80]);
        // U+1F600 is the surrogate pair D83D DE00, three bytes each
        assert_eq!(
            encode_one("\u{1F600}"),
            vec![0, 6, 0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]
        );
        assert_eq!(encode_one("é"), vec![0, 2, 0xC3, 0xA9]);
    }

    #[test]
    fn message_decodes_to_what_was_encoded() {
        let message = DiscordMessage::new("reports", "a\0b \u{1F600} ünïcødé\nline");
        let payload = message.encode().unwrap();
        assert_eq!(DiscordMessage::decode(payload).unwrap(), message);
    }

    #[test]
    fn ping_prefixes_role() {
        let message = DiscordMessage::new("watchlist", "hello").ping("Moderator");
        assert_eq!(message.text, "@Moderator hello");
    }

    #[test]
    fn oversize_string_is_rejected() {
        let text = "x".repeat(MAX_STRING_BYTES);
        assert!(DiscordMessage::new("c", text).encode().is_ok());

        // 21846 * 3 bytes > 65535
        let text = "\u{20AC}".repeat(21_846);
        let err = DiscordMessage::new("c", text).encode().unwrap_err();
        assert!(matches!(err, BridgeError::StringTooLong { len: 65_538 }));
    }

    #[test]
    fn truncated_and_foreign_frames_fail() {
        let payload = DiscordMessage::new("reports", "text").encode().unwrap();
        let cut = payload.slice(..payload.len() - 1);
        assert!(matches!(
            DiscordMessage::decode(cut),
            Err(BridgeError::Truncated { needed: 4, remaining: 3 })
        ));

        let mut buf = BytesMut::new();
        put_string(&mut buf, "Connect").unwrap();
        assert!(matches!(
            DiscordMessage::decode(buf.freeze()),
            Err(BridgeError::UnexpectedSubchannel(name)) if name == "Connect"
        ));
    }

    #[test]
    fn invalid_sequences_are_malformed() {
        let lone_continuation: &[u8] = &[0, 1, 0x80];
        assert!(matches!(
            get_string(&mut &lone_continuation[..]),
            Err(BridgeError::Malformed(_))
        ));
        // unpaired high surrogate D800
        let lone_surrogate: &[u8] = &[0, 3, 0xED, 0xA0, 0x80];
        assert!(matches!(
            get_string(&mut &lone_surrogate[..]),
            Err(BridgeError::Malformed(_))
        ));
    }
}
