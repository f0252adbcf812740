use chrono::{DateTime, Utc};

/// A fact emitted by an aggregate or appended to the movement journal.
///
/// Order, ASN and inventory record events drive their aggregates' `apply`;
/// movement entries are the ones that leave the process through the bus.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Routing name, dotted by owner (`orders.order.shipped`,
    /// `inventory.movement.inbound`).
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    /// Business time of the fact, as recorded by the command that caused it.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Top-level owner segment of [`event_type`](Event::event_type).
    fn owner(&self) -> &'static str {
        let name = self.event_type();
        name.split('.').next().unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Probe(&'static str);

    impl Event for Probe {
        fn event_type(&self) -> &'static str {
            self.0
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    #[test]
    fn owner_is_the_first_segment() {
        assert_eq!(Probe("inventory.movement.inbound").owner(), "inventory");
        assert_eq!(Probe("standalone").owner(), "standalone");
    }
}
