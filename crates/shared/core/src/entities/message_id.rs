use std::fmt;

use crate::error::FormatError;

/// Length of the hex encoding of a [`MessageId`]
pub const MESSAGE_ID_HEX_LEN: usize = 32;

/// Composite message identifier: `(session, object)`
///
/// `object` is the per-session message counter. On the wire the id is the
/// 16 hex digit session followed by the 16 hex digit object, both big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MessageId {
    pub session: u64,
    pub object: u64,
}

impl MessageId {
    /// The id every handshake starts from
    pub const HANDSHAKE: MessageId = MessageId {
        session: 0,
        object: 0,
    };

    pub fn new(session: u64, object: u64) -> Self {
        Self { session, object }
    }

    /// Same session, next object id
    pub fn next(&self) -> Self {
        Self {
            session: self.session,
            object: self.object.wrapping_add(1),
        }
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}{:016x}", self.session, self.object)
    }

    /// Parse the 32 character hex form. Either letter case is accepted.
    pub fn from_hex(data: &str) -> Result<Self, FormatError> {
        if data.len() != MESSAGE_ID_HEX_LEN {
            return Err(FormatError::IdLength(data.len()));
        }
        // from_str_radix tolerates a leading '+', the wire format does not
        if !data.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FormatError::IdDigits(data.to_string()));
        }

        let (session, object) = data.split_at(MESSAGE_ID_HEX_LEN / 2);
        let parse = |half: &str| {
            u64::from_str_radix(half, 16).map_err(|_| FormatError::IdDigits(data.to_string()))
        };

        Ok(Self {
            session: parse(session)?,
            object: parse(object)?,
        })
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
