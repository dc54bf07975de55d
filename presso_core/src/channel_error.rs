//! Maps `Box<dyn Error>` from the channel boundary to typed `DispatchError`.

use crate::error::DispatchError;

/// Map a channel failure during `op` to `DispatchError::Transport`, keeping
/// the source chain in the message.
pub fn map_channel_error(op: &str, e: &(dyn std::error::Error + 'static)) -> DispatchError {
    let mut msg = format!("{op}: {e}");
    let mut source = e.source();
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    DispatchError::Transport(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("tls handshake failed")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn keeps_source_chain() {
        let e = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(
            map_channel_error("connect", &e),
            DispatchError::Transport("connect: tls handshake failed: refused".into())
        );
    }
}
