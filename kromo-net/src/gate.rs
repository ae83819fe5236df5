//! Countdown barrier opened once every registered node has finished.

use std::{collections::BTreeSet, time::Duration};

use tokio::{sync::watch, time::timeout};
use tracing::{debug, warn};

use crate::error::NetError;

#[derive(Debug)]
struct Countdown {
    remaining: usize,
    arrived: BTreeSet<u8>,
    failure: Option<String>,
}

impl Countdown {
    fn settled(&self) -> bool {
        self.remaining == 0 || self.failure.is_some()
    }
}

/// Counts distinct finishing nodes down to zero.
///
/// [`arrive`](Self::arrive) is cheap and non-blocking so it can run inside a
/// message handler. Waiters are woken on every change.
///
/// # Examples
/// ```
/// use std::time::Duration;
///
/// use kromo_net::CompletionGate;
///
/// # tokio_test_block_on(async {
/// let gate = CompletionGate::new(2);
/// gate.arrive(1);
/// gate.arrive(1);
/// assert_eq!(gate.remaining(), 1);
/// gate.arrive(2);
/// gate.wait(Duration::from_millis(10)).await.expect("gate is open");
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(future: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread()
/// #         .enable_time()
/// #         .build()
/// #         .expect("runtime builds")
/// #         .block_on(future)
/// # }
/// ```
#[derive(Debug)]
pub struct CompletionGate {
    state: watch::Sender<Countdown>,
}

impl CompletionGate {
    /// Creates a gate that opens after `expected` distinct arrivals.
    #[must_use]
    pub fn new(expected: usize) -> Self {
        let (state, _) = watch::channel(Countdown {
            remaining: expected,
            arrived: BTreeSet::new(),
            failure: None,
        });
        Self { state }
    }

    /// Records that `node` finished. Returns `true` when this arrival was
    /// counted; repeats and arrivals after the gate settled are ignored.
    pub fn arrive(&self, node: u8) -> bool {
        let counted = self.state.send_if_modified(|countdown| {
            if countdown.settled() || !countdown.arrived.insert(node) {
                return false;
            }
            countdown.remaining -= 1;
            true
        });
        if counted {
            debug!(node, remaining = self.remaining(), "node arrived at completion gate");
        } else {
            warn!(node, "ignoring repeated or late completion");
        }
        counted
    }

    /// Aborts every current and future wait with `reason`.
    pub fn fail(&self, reason: impl Into<String>) {
        let message = reason.into();
        self.state.send_if_modified(|countdown| {
            if countdown.settled() {
                return false;
            }
            countdown.failure = Some(message);
            true
        });
    }

    /// Returns how many nodes have yet to arrive.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.state.borrow().remaining
    }

    /// Returns whether `node` has already arrived.
    #[must_use]
    pub fn has_arrived(&self, node: u8) -> bool {
        self.state.borrow().arrived.contains(&node)
    }

    /// Waits until every node has arrived.
    ///
    /// # Errors
    /// Returns [`NetError::CompletionTimeout`] when `limit` elapses first and
    /// [`NetError::CoordinationAborted`] after [`fail`](Self::fail).
    pub async fn wait(&self, limit: Duration) -> Result<(), NetError> {
        let mut watcher = self.state.subscribe();
        let settled = timeout(limit, watcher.wait_for(Countdown::settled)).await;
        let failure = match settled {
            Err(_) => {
                return Err(NetError::CompletionTimeout {
                    remaining: self.remaining(),
                });
            }
            Ok(Err(_)) => Some("completion gate dropped".to_owned()),
            Ok(Ok(countdown)) => countdown.failure.clone(),
        };
        match failure {
            Some(reason) => Err(NetError::CoordinationAborted { reason }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    use rstest::rstest;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn stays_closed_until_the_last_distinct_arrival() {
        let gate = Arc::new(CompletionGate::new(3));
        assert!(gate.arrive(1));
        assert!(gate.arrive(2));
        assert!(!gate.arrive(2));
        assert!(matches!(
            gate.wait(SHORT).await,
            Err(NetError::CompletionTimeout { remaining: 1 })
        ));

        let waiter = {
            let shared = Arc::clone(&gate);
            tokio::spawn(async move { shared.wait(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        assert!(gate.arrive(3));
        waiter
            .await
            .expect("waiter task joins")
            .expect("gate opens after the third node");
        assert!(gate.has_arrived(3));
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[tokio::test]
    async fn empty_or_satisfied_gates_open_immediately(#[case] expected: usize) {
        let gate = CompletionGate::new(expected);
        if expected == 1 {
            gate.arrive(7);
        }
        gate.wait(SHORT).await.expect("gate is open");
        assert!(!gate.arrive(8));
    }

    #[tokio::test]
    async fn failure_aborts_waiters() {
        let gate = Arc::new(CompletionGate::new(2));
        let waiter = {
            let shared = Arc::clone(&gate);
            tokio::spawn(async move { shared.wait(Duration::from_secs(5)).await })
        };
        gate.fail("node 2 vanished");
        let outcome = waiter.await.expect("waiter task joins");
        assert!(matches!(
            outcome,
            Err(NetError::CoordinationAborted { ref reason }) if reason == "node 2 vanished"
        ));
        assert!(!gate.arrive(1));
    }
}
