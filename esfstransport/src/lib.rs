#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(warnings)]
#![deny(clippy::all)]
#![deny(unsafe_code)]

//! Factory message transport — framing contract only.
//!
//! A factory tool talks to the device over a token / length / blob /
//! SHA-256 envelope, framed over serial or sockets. This
//! crate describes that framing as a trait, [`FactoryTransport`]; it
//! binds to no concrete socket or serial implementation. A caller wires
//! the trait to mbed TLS over BSD sockets, a UART bridge, or an
//! in-memory pipe for tests, then hands framed, CBOR-encoded request
//! bundles to whatever bundle handler runs on top.
//!
//! The shape mirrors a polymorphic communication base class with
//! `init`/`finish`/`send`/`read_message_size`/`read_message`/
//! `read_signature`/`is_token_detected` methods: here that becomes one
//! trait, no dynamic dispatch, since the concrete transport is chosen
//! once at startup and never swapped at runtime.

use std::time::Duration;

/// A single framed request as the transport hands it up: the detected
/// start-of-frame token, the announced body length, and the body
/// itself. The SHA-256 digest over the body is verified by
/// [`FactoryTransport::read_signature`], not carried redundantly here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMessage {
    /// Start-of-frame token the transport recognized before this body.
    pub token: u32,
    /// Body bytes, already stripped of framing and signature trailer.
    pub body: Vec<u8>,
}

/// Errors a framing implementation can report. Transport-specific
/// failures (a closed socket, a UART parity error) are carried in
/// [`TransportError::Io`] rather than given their own variant, since
/// this crate has no concrete transport to enumerate them for.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The stream closed or a concrete transport reported I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),
    /// No start-of-frame token arrived within the timeout.
    #[error("no frame token detected before timeout")]
    NoTokenDetected,
    /// A length field announced a body larger than the caller's bound.
    #[error("framed message length {0} exceeds the maximum accepted size")]
    MessageTooLarge(usize),
    /// The trailing SHA-256 digest did not match the received body.
    #[error("frame signature mismatch")]
    SignatureMismatch,
    /// The transport was used before `init` or after `finish`.
    #[error("transport not in a usable state")]
    NotReady,
}

/// Result type for every [`FactoryTransport`] operation.
pub type TransportResult<T> = Result<T, TransportError>;

/// The framing contract a concrete transport must satisfy.
///
/// Every method is `&mut self`: a transport owns exclusive access to
/// one underlying stream and is never shared across threads. Callers
/// drive it in the fixed order `init`, then any number of
/// `is_token_detected`/`read_message_size`/`read_message`/
/// `read_signature`/`send` calls, then `finish`.
pub trait FactoryTransport {
    /// Bring the underlying stream up (open the socket, raise the
    /// UART, negotiate TLS). Idempotent: calling it again on an
    /// already-initialized transport is a no-op, not an error.
    fn init(&mut self) -> TransportResult<()>;

    /// Tear the underlying stream down. After `finish`, every other
    /// method must return [`TransportError::NotReady`] until `init` is
    /// called again.
    fn finish(&mut self) -> TransportResult<()>;

    /// Block up to `timeout` for a recognizable start-of-frame token
    /// and return it, or [`TransportError::NoTokenDetected`] if none
    /// arrives in time.
    fn is_token_detected(&mut self, timeout: Duration) -> TransportResult<u32>;

    /// Read the length field that follows a detected token.
    fn read_message_size(&mut self) -> TransportResult<usize>;

    /// Read exactly `size` bytes of message body. Returns
    /// [`TransportError::MessageTooLarge`] without reading if `size`
    /// exceeds `max_size`, so a caller can bound allocation before any
    /// bytes are pulled off the wire.
    fn read_message(&mut self, size: usize, max_size: usize) -> TransportResult<Vec<u8>>;

    /// Read and verify the trailing SHA-256 signature over `body`,
    /// returning [`TransportError::SignatureMismatch`] on failure.
    fn read_signature(&mut self, body: &[u8]) -> TransportResult<()>;

    /// Frame and send a response body back to the peer: token, length,
    /// body, then the body's SHA-256 signature, in that order.
    fn send(&mut self, token: u32, body: &[u8]) -> TransportResult<()>;

    /// Convenience wrapper driving `is_token_detected`,
    /// `read_message_size`, `read_message`, and `read_signature` in
    /// sequence, bounding the body to `max_size`.
    fn recv(&mut self, timeout: Duration, max_size: usize) -> TransportResult<FramedMessage> {
        let token = self.is_token_detected(timeout)?;
        let size = self.read_message_size()?;
        if size > max_size {
            return Err(TransportError::MessageTooLarge(size));
        }
        let body = self.read_message(size, max_size)?;
        self.read_signature(&body)?;
        Ok(FramedMessage { token, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// An in-memory loopback transport: `send` appends to an outbox,
    /// the constructor is pre-loaded with frames `recv` reads back in
    /// order. Exercises the trait's default `recv` wiring without
    /// needing any real socket or serial code.
    struct LoopbackTransport {
        ready: bool,
        inbox: VecDeque<FramedMessage>,
        outbox: Vec<(u32, Vec<u8>)>,
    }

    impl LoopbackTransport {
        fn new(inbox: Vec<FramedMessage>) -> Self {
            Self {
                ready: false,
                inbox: inbox.into(),
                outbox: Vec::new(),
            }
        }
    }

    impl FactoryTransport for LoopbackTransport {
        fn init(&mut self) -> TransportResult<()> {
            self.ready = true;
            Ok(())
        }

        fn finish(&mut self) -> TransportResult<()> {
            self.ready = false;
            Ok(())
        }

        fn is_token_detected(&mut self, _timeout: Duration) -> TransportResult<u32> {
            if !self.ready {
                return Err(TransportError::NotReady);
            }
            self.inbox.front().map(|m| m.token).ok_or(TransportError::NoTokenDetected)
        }

        fn read_message_size(&mut self) -> TransportResult<usize> {
            if !self.ready {
                return Err(TransportError::NotReady);
            }
            Ok(self.inbox.front().map(|m| m.body.len()).unwrap_or(0))
        }

        fn read_message(&mut self, size: usize, max_size: usize) -> TransportResult<Vec<u8>> {
            if !self.ready {
                return Err(TransportError::NotReady);
            }
            if size > max_size {
                return Err(TransportError::MessageTooLarge(size));
            }
            let message = self.inbox.pop_front().ok_or(TransportError::NoTokenDetected)?;
            Ok(message.body)
        }

        fn read_signature(&mut self, _body: &[u8]) -> TransportResult<()> {
            if !self.ready {
                return Err(TransportError::NotReady);
            }
            Ok(())
        }

        fn send(&mut self, token: u32, body: &[u8]) -> TransportResult<()> {
            if !self.ready {
                return Err(TransportError::NotReady);
            }
            self.outbox.push((token, body.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn recv_drives_the_default_sequence() {
        let mut transport = LoopbackTransport::new(vec![FramedMessage {
            token: 0xA5,
            body: b"bundle".to_vec(),
        }]);
        transport.init().unwrap();

        let framed = transport.recv(Duration::from_millis(10), 4096).unwrap();
        assert_eq!(framed.token, 0xA5);
        assert_eq!(framed.body, b"bundle");
    }

    #[test]
    fn recv_rejects_a_body_larger_than_the_bound() {
        let mut transport = LoopbackTransport::new(vec![FramedMessage {
            token: 1,
            body: vec![0u8; 16],
        }]);
        transport.init().unwrap();

        let err = transport.recv(Duration::from_millis(10), 8).unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge(16)));
    }

    #[test]
    fn methods_fail_before_init_and_after_finish() {
        let mut transport = LoopbackTransport::new(vec![]);
        assert!(matches!(
            transport.is_token_detected(Duration::from_millis(1)),
            Err(TransportError::NotReady)
        ));

        transport.init().unwrap();
        transport.finish().unwrap();
        assert!(matches!(transport.send(1, b"x"), Err(TransportError::NotReady)));
    }
}
