//! Per-connection opcode dispatch.
//!
//! Handlers run inline on the connection's read loop, so they must only
//! decode, record and forward. Anything slow is handed to another task.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    error::ProtocolError,
    wire::{Frame, Message, Opcode},
};

/// Reacts to one message payload.
pub trait Handler: Send + Sync {
    /// Handles a raw payload whose opcode selected this handler.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] when the payload is unusable. The read
    /// loop logs it and drops the message.
    fn handle(&self, payload: &[u8]) -> Result<(), ProtocolError>;
}

impl<F> Handler for F
where
    F: Fn(&[u8]) -> Result<(), ProtocolError> + Send + Sync,
{
    fn handle(&self, payload: &[u8]) -> Result<(), ProtocolError> {
        self(payload)
    }
}

/// Maps opcodes to handlers for one connection.
///
/// # Examples
/// ```
/// use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
///
/// use kromo_net::{DispatchTable, wire::{Frame, Message, Opcode}};
///
/// let latest = Arc::new(AtomicU32::new(0));
/// let sink = Arc::clone(&latest);
/// let table = DispatchTable::new().on_message(Opcode::RoundStart, move |message| {
///     if let Message::RoundStart { round } = message {
///         sink.store(round, Ordering::SeqCst);
///     }
///     Ok(())
/// });
/// let frame = Frame { opcode: 7, payload: vec![0, 0, 0, 5].into() };
/// table.dispatch(&frame).expect("handler accepts the frame");
/// assert_eq!(latest.load(Ordering::SeqCst), 5);
/// ```
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<Opcode, Arc<dyn Handler>>,
}

impl DispatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a raw payload handler, replacing any previous one.
    #[must_use]
    pub fn with_handler(mut self, opcode: Opcode, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(opcode, Arc::new(handler));
        self
    }

    /// Registers a handler that receives the decoded [`Message`].
    #[must_use]
    pub fn on_message<F>(self, opcode: Opcode, handler: F) -> Self
    where
        F: Fn(Message) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.with_handler(opcode, move |payload: &[u8]| {
            handler(Message::decode(opcode, payload)?)
        })
    }

    /// Returns whether `opcode` has a handler.
    #[must_use]
    pub fn handles(&self, opcode: Opcode) -> bool {
        self.handlers.contains_key(&opcode)
    }

    /// Routes `frame` to its handler.
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownOpcode`] for bytes outside the opcode
    /// set, [`ProtocolError::Unhandled`] when no handler is registered and
    /// any error the handler reports.
    pub fn dispatch(&self, frame: &Frame) -> Result<(), ProtocolError> {
        let opcode = Opcode::try_from(frame.opcode)?;
        let handler = self
            .handlers
            .get(&opcode)
            .ok_or(ProtocolError::Unhandled { opcode })?;
        handler.handle(&frame.payload)
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut opcodes: Vec<Opcode> = self.handlers.keys().copied().collect();
        opcodes.sort_unstable();
        f.debug_struct("DispatchTable")
            .field("opcodes", &opcodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    use rstest::{fixture, rstest};

    #[derive(Clone, Default)]
    struct Seen(Arc<Mutex<Vec<Message>>>);

    impl Seen {
        fn table(&self) -> DispatchTable {
            let finished = self.clone();
            let hello = self.clone();
            DispatchTable::new()
                .on_message(Opcode::NodeFinished, move |message| {
                    finished.0.lock().expect("lock").push(message);
                    Ok(())
                })
                .on_message(Opcode::PeerHello, move |message| {
                    hello.0.lock().expect("lock").push(message);
                    Ok(())
                })
        }

        fn messages(&self) -> Vec<Message> {
            self.0.lock().expect("lock").clone()
        }
    }

    #[fixture]
    fn seen() -> Seen {
        Seen::default()
    }

    fn frame(opcode: u8, payload: &[u8]) -> Frame {
        Frame {
            opcode,
            payload: payload.to_vec().into(),
        }
    }

    #[rstest]
    fn routes_each_opcode_to_its_handler(seen: Seen) {
        let table = seen.table();
        table.dispatch(&frame(9, &[4])).expect("hello is handled");
        table.dispatch(&frame(2, &[1])).expect("finished is handled");
        assert_eq!(
            seen.messages(),
            vec![Message::PeerHello { node: 4 }, Message::NodeFinished { node: 1 }]
        );
    }

    #[rstest]
    #[case::unknown(frame(0x40, &[]), ProtocolError::UnknownOpcode { opcode: 0x40 })]
    #[case::unhandled(frame(7, &[0, 0, 0, 1]), ProtocolError::Unhandled { opcode: Opcode::RoundStart })]
    #[case::malformed(
        frame(2, &[]),
        ProtocolError::MalformedPayload { opcode: Opcode::NodeFinished, reason: "payload is truncated" }
    )]
    fn bad_frames_are_reported_without_side_effects(
        seen: Seen,
        #[case] bad: Frame,
        #[case] expected: ProtocolError,
    ) {
        let table = seen.table();
        assert_eq!(table.dispatch(&bad), Err(expected));
        assert!(seen.messages().is_empty());
    }

    #[test]
    fn raw_handlers_see_undecoded_payloads() {
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lengths);
        let table = DispatchTable::new().with_handler(Opcode::VertexInfo, move |payload: &[u8]| {
            sink.lock().expect("lock").push(payload.len());
            Ok(())
        });
        assert!(table.handles(Opcode::VertexInfo));
        assert!(!table.handles(Opcode::NodeIp));
        table.dispatch(&frame(1, &[0; 16])).expect("raw handler accepts");
        assert_eq!(*lengths.lock().expect("lock"), vec![16]);
        assert_eq!(format!("{table:?}"), "DispatchTable { opcodes: [VertexInfo] }");
    }
}
