//! Local web API: JSON state record over HTTP plus WebSocket push.
//!
//! | Route        | Method  | Behaviour                                 |
//! |--------------|---------|-------------------------------------------|
//! | `/api`       | GET     | current state record                      |
//! | `/api`       | POST    | desired settings, queued as one command   |
//! | `/api`       | OPTIONS | CORS preflight                            |
//! | `/ws`        | WS      | state record pushed on every change       |

pub mod bridge;
pub mod dto;
pub mod handlers;

pub use bridge::ApiBridge;
pub use dto::AcStateDto;
pub use handlers::ApiResponse;

use core::fmt;

use crate::protocol::types::InvalidValue;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    /// Body is not a state record.
    Malformed,
    /// A field holds a value the unit does not know.
    InvalidValue(InvalidValue),
    BodyTooLarge,
    RateLimited,
    /// Command queue is full; the control loop is behind.
    Busy,
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::Malformed | Self::InvalidValue(_) => 400,
            Self::BodyTooLarge => 413,
            Self::RateLimited => 429,
            Self::Busy => 503,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed state record"),
            Self::InvalidValue(v) => write!(f, "{v}"),
            Self::BodyTooLarge => write!(f, "body too large"),
            Self::RateLimited => write!(f, "too many requests"),
            Self::Busy => write!(f, "command queue full"),
        }
    }
}
