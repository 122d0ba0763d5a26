//! Status codes of the Flume `ThriftSourceProtocol`

use std::fmt;

/// Result of an `append` / `appendBatch` call as seen by the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Event(s) delivered to the channel
    Ok = 0,
    /// Channel refused the event(s); the sender may retry
    Failed = 1,
    /// Unexpected error on the receiving side
    Error = 2,
    /// Unrecognised status value
    Unknown = 3,
}

impl Status {
    /// Wire value
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Decode a wire value; anything out of range is `Unknown`
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Status::Ok,
            1 => Status::Failed,
            2 => Status::Error,
            _ => Status::Unknown,
        }
    }

    /// Whether the call succeeded
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "OK",
            Status::Failed => "FAILED",
            Status::Error => "ERROR",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}
