/// Default upper bound on a single frame (16 MiB).
///
/// PostgreSQL itself accepts up to 1 GiB, which is far more than a frontend
/// reader should buffer for password or simple-query messages.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// What to do when a registered decoder fails on a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Any decode failure yields the message's default value.
    #[default]
    Permissive,
    /// Only truncated bodies degrade; framing and text errors are returned.
    TruncationOnly,
}

impl DecodePolicy {
    /// Whether `err` should be absorbed into a default-valued message.
    pub fn degrades(self, err: &crate::error::FrontendError) -> bool {
        match self {
            DecodePolicy::Permissive => true,
            DecodePolicy::TruncationOnly => err.is_truncation(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Frames declaring more than this many bytes are rejected before buffering.
    pub max_message_size: usize,

    /// Failure handling for message bodies.
    pub policy: DecodePolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            policy: DecodePolicy::Permissive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrontendError;

    #[test]
    fn permissive_degrades_everything() {
        let p = DecodePolicy::default();
        assert!(p.degrades(&FrontendError::InvalidFrameLength(0)));
        assert!(p.degrades(&FrontendError::InvalidUtf8("bad".into())));
    }

    #[test]
    fn truncation_only_narrows_the_catch() {
        let p = DecodePolicy::TruncationOnly;
        assert!(p.degrades(&FrontendError::TruncatedStream {
            needed: 4,
            remaining: 0
        }));
        assert!(!p.degrades(&FrontendError::InvalidFrameLength(1)));
        assert!(!p.degrades(&FrontendError::InvalidUtf8("bad".into())));
    }
}
