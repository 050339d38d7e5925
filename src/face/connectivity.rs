//! Bluetooth connectivity debounce.
//!
//! A dropped link only surfaces (vibration + on-screen indicator) after it
//! has stayed down for the debounce delay; momentary drops never alert.
//! Reconnecting at any point clears both the pending warning and an already
//! shown indicator.
//!
//! The host schedules the debounce as a one-shot timer that is never
//! cancelled, so every pending warning carries a sequence number and a stale
//! timer fire is ignored instead of alerting.

/// Debounce delay before a lost link is surfaced.
pub const LINK_DEBOUNCE_MS: u64 = 5_000;

/// Link alerting state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LinkStatus {
    /// Link is up. Also the optimistic initial state before any event.
    Connected,
    /// Link went down, debounce timer running.
    DisconnectedPending { seq: u8 },
    /// Debounce elapsed, warning shown.
    DisconnectedShown,
}

/// What the dispatcher should do after a connectivity event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LinkEventAction {
    None,
    /// Start a one-shot debounce timer carrying this sequence number.
    StartDebounce { seq: u8 },
    /// Hide the previously shown warning indicator.
    ClearWarning,
}

/// What the dispatcher should do after a debounce timer fires.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DebounceAction {
    None,
    /// Show the warning indicator and fire the link-lost vibration.
    ShowWarning,
}

/// Tracks the connectivity state machine.
pub struct ConnectivityMonitor {
    status: LinkStatus,
    seq: u8,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    pub const fn new() -> Self {
        Self {
            status: LinkStatus::Connected,
            seq: 0,
        }
    }

    pub fn connected(&self) -> bool {
        self.status == LinkStatus::Connected
    }

    /// Feed a connect/disconnect event from the host.
    pub fn on_event(&mut self, connected: bool) -> LinkEventAction {
        match (self.status, connected) {
            (LinkStatus::Connected, false) => {
                self.seq = self.seq.wrapping_add(1);
                self.status = LinkStatus::DisconnectedPending { seq: self.seq };
                LinkEventAction::StartDebounce { seq: self.seq }
            }
            (LinkStatus::DisconnectedPending { .. }, true) => {
                // The timer keeps running but its sequence number is now
                // stale, so the fire will be ignored.
                self.status = LinkStatus::Connected;
                LinkEventAction::None
            }
            (LinkStatus::DisconnectedShown, true) => {
                self.status = LinkStatus::Connected;
                LinkEventAction::ClearWarning
            }
            _ => LinkEventAction::None,
        }
    }

    /// Feed a debounce timer fire.
    pub fn on_debounce_timer(&mut self, seq: u8) -> DebounceAction {
        match self.status {
            LinkStatus::DisconnectedPending { seq: pending } if pending == seq => {
                self.status = LinkStatus::DisconnectedShown;
                DebounceAction::ShowWarning
            }
            _ => DebounceAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_optimistically_connected() {
        assert!(ConnectivityMonitor::new().connected());
    }

    #[test]
    fn disconnect_starts_the_debounce() {
        let mut monitor = ConnectivityMonitor::new();
        let action = monitor.on_event(false);
        assert!(matches!(action, LinkEventAction::StartDebounce { .. }));
        assert!(!monitor.connected());
    }

    #[test]
    fn reconnect_within_the_window_never_warns() {
        let mut monitor = ConnectivityMonitor::new();
        let LinkEventAction::StartDebounce { seq } = monitor.on_event(false) else {
            panic!("expected debounce start");
        };
        assert_eq!(monitor.on_event(true), LinkEventAction::None);

        // The never-cancelled timer fires late; it must be ignored.
        assert_eq!(monitor.on_debounce_timer(seq), DebounceAction::None);
        assert!(monitor.connected());
    }

    #[test]
    fn uninterrupted_disconnect_warns_exactly_once() {
        let mut monitor = ConnectivityMonitor::new();
        let LinkEventAction::StartDebounce { seq } = monitor.on_event(false) else {
            panic!("expected debounce start");
        };
        assert_eq!(monitor.on_debounce_timer(seq), DebounceAction::ShowWarning);
        // A duplicate fire does not alert again.
        assert_eq!(monitor.on_debounce_timer(seq), DebounceAction::None);
    }

    #[test]
    fn reconnect_after_warning_clears_the_indicator() {
        let mut monitor = ConnectivityMonitor::new();
        let LinkEventAction::StartDebounce { seq } = monitor.on_event(false) else {
            panic!("expected debounce start");
        };
        monitor.on_debounce_timer(seq);
        assert_eq!(monitor.on_event(true), LinkEventAction::ClearWarning);
        assert!(monitor.connected());
    }

    #[test]
    fn stale_timer_from_an_earlier_drop_is_ignored() {
        let mut monitor = ConnectivityMonitor::new();
        let LinkEventAction::StartDebounce { seq: first } = monitor.on_event(false) else {
            panic!("expected debounce start");
        };
        monitor.on_event(true);
        let LinkEventAction::StartDebounce { seq: second } = monitor.on_event(false) else {
            panic!("expected debounce start");
        };

        // The first timer fires while the second drop is still pending.
        assert_eq!(monitor.on_debounce_timer(first), DebounceAction::None);
        assert_eq!(monitor.on_debounce_timer(second), DebounceAction::ShowWarning);
    }

    #[test]
    fn duplicate_disconnect_events_keep_the_original_timer() {
        let mut monitor = ConnectivityMonitor::new();
        let first = monitor.on_event(false);
        assert!(matches!(first, LinkEventAction::StartDebounce { .. }));
        assert_eq!(monitor.on_event(false), LinkEventAction::None);
    }
}
