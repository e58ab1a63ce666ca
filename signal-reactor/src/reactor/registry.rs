use crate::bus::{SubscriptionHandle, Transport};
use crate::error::Error;
use crate::signal::MatchRule;

/// One registered interest and the handle needed to release it.
pub(crate) struct Subscription {
    pub(crate) rule: MatchRule,
    pub(crate) handle: SubscriptionHandle,
}

/// The subscriptions a reactor currently holds on its transport.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    active: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub(crate) fn track(&mut self, rule: MatchRule, handle: SubscriptionHandle) {
        self.active.push(Subscription { rule, handle });
    }

    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    /// Unsubscribes everything and empties the registry.
    ///
    /// The set is emptied before the transport is called, so every handle
    /// is released at most once even if this is re-entered. A failed
    /// release does not stop the others; the first failure is returned.
    pub(crate) fn release_all(&mut self, transport: &dyn Transport) -> Result<(), Error> {
        let drained = std::mem::take(&mut self.active);
        let mut first_error = None;

        for subscription in drained {
            if let Err(err) = transport.unsubscribe(subscription.handle) {
                tracing::warn!(
                    signal = %subscription.rule.signal,
                    handle = %subscription.handle,
                    error = %err,
                    "failed to release subscription"
                );
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
