use std::time::Duration;

use crate::error::Result;
use crate::provider::{DeviceProvider, EventFeed};
use crate::record::{DeviceRecord, Filter};

/// Where a [`ChangeMonitor`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Subscribed and receiving, but not yet polled.
    Armed,
    /// Steady state, being polled.
    Receiving,
}

/// A live, filtered feed of device add/remove/change events.
///
/// The monitor must be opened *before* the registry scan runs against the
/// same filter; otherwise a device attaching between scan and subscription is
/// neither in the snapshot nor reported by the feed.
/// [`EventLoop`](crate::EventLoop) sequences the two correctly; callers
/// composing the pieces by hand carry that burden themselves.
pub struct ChangeMonitor<F: EventFeed> {
    feed: F,
    state: MonitorState,
}

impl<F: EventFeed> ChangeMonitor<F> {
    /// Opens and arms a subscription for `filter` on `provider`.
    pub fn open<P>(provider: &P, filter: &Filter) -> Result<Self>
    where
        P: DeviceProvider<Monitor = F>,
    {
        Ok(Self {
            feed: provider.monitor(filter)?,
            state: MonitorState::Armed,
        })
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Bounded readiness check on the underlying event source; a zero
    /// timeout never blocks.
    pub fn poll_readiness(&mut self, timeout: Duration) -> Result<bool> {
        self.state = MonitorState::Receiving;
        self.feed.poll_readiness(timeout)
    }

    /// Reads at most one pending event and turns it into a record.
    ///
    /// Returns `None` when nothing is pending or the underlying read failed
    /// transiently. Never fabricates a record: after `poll_readiness`
    /// reported false this returns `None`.
    pub fn try_receive(&mut self) -> Option<DeviceRecord> {
        self.feed
            .try_receive()
            .map(|device| DeviceRecord::from_event(&device))
    }

    /// Releases the subscription deterministically.
    pub fn close(self) {
        drop(self.feed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Action;
    use crate::test_helpers::{FakeDevice, FakeProvider};

    #[test]
    fn add_then_remove_arrive_in_order() {
        let provider = FakeProvider::with_devices(vec![]);
        let mut monitor =
            ChangeMonitor::open(&provider, &Filter::subsystem("hidraw")).unwrap();
        assert_eq!(monitor.state(), MonitorState::Armed);

        provider.emit(FakeDevice::hidraw("/dev/hidraw3").with_action("add"));
        provider.emit(FakeDevice::hidraw("/dev/hidraw3").with_action("remove"));

        assert!(monitor.poll_readiness(Duration::ZERO).unwrap());
        assert_eq!(monitor.state(), MonitorState::Receiving);

        let first = monitor.try_receive().unwrap();
        let second = monitor.try_receive().unwrap();
        assert_eq!(first.action, Some(Action::Add));
        assert_eq!(second.action, Some(Action::Remove));
        assert_eq!(first.devnode, second.devnode);
    }

    #[test]
    fn no_event_is_fabricated_when_idle() {
        let provider = FakeProvider::with_devices(vec![]);
        let mut monitor =
            ChangeMonitor::open(&provider, &Filter::subsystem("hidraw")).unwrap();

        assert!(!monitor.poll_readiness(Duration::ZERO).unwrap());
        assert!(monitor.try_receive().is_none());
    }
}
