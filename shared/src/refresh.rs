//! Refresh propagation.
//!
//! A collection view that mutates data tells the dashboard summary to
//! re-fetch. The link holds a plain function pointer producing the event to
//! dispatch, so it stays `Copy`-cheap and carries no captured state.

use std::fmt;

pub struct RefreshLink<E> {
    notify: Option<fn() -> E>,
    fired: u64,
}

impl<E> RefreshLink<E> {
    pub fn connected(notify: fn() -> E) -> Self {
        Self {
            notify: Some(notify),
            fired: 0,
        }
    }

    /// A link with no listener. Notifying it does nothing.
    pub fn detached() -> Self {
        Self {
            notify: None,
            fired: 0,
        }
    }

    pub fn connect(&mut self, notify: fn() -> E) {
        self.notify = Some(notify);
    }

    pub fn disconnect(&mut self) {
        self.notify = None;
    }

    pub fn is_connected(&self) -> bool {
        self.notify.is_some()
    }

    /// Produces the listener's event, if any. Called after every successful
    /// create, update or delete in the owning view.
    pub fn notify(&mut self) -> Option<E> {
        let notify = self.notify?;
        self.fired += 1;
        Some(notify())
    }

    /// How many notifications have been delivered.
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

impl<E> Default for RefreshLink<E> {
    fn default() -> Self {
        Self::detached()
    }
}

impl<E> fmt::Debug for RefreshLink<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshLink")
            .field("connected", &self.is_connected())
            .field("fired", &self.fired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Msg {
        Refresh,
    }

    fn refresh() -> Msg {
        Msg::Refresh
    }

    #[test]
    fn connected_link_produces_event() {
        let mut link = RefreshLink::connected(refresh);
        assert_eq!(link.notify(), Some(Msg::Refresh));
        assert_eq!(link.notify(), Some(Msg::Refresh));
        assert_eq!(link.fired(), 2);
    }

    #[test]
    fn detached_link_is_a_no_op() {
        let mut link: RefreshLink<Msg> = RefreshLink::detached();
        assert_eq!(link.notify(), None);
        assert_eq!(link.fired(), 0);
    }

    #[test]
    fn link_can_be_rewired() {
        let mut link = RefreshLink::connected(refresh);
        link.disconnect();
        assert!(!link.is_connected());
        assert_eq!(link.notify(), None);

        link.connect(refresh);
        assert_eq!(link.notify(), Some(Msg::Refresh));
        assert_eq!(link.fired(), 1);
    }
}
