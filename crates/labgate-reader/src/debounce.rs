use labgate_core::CardUid;
use std::time::Duration;
use tokio::time::Instant;

/// Suppresses repeated detections of the card that is still on the reader.
///
/// A reader reports the same UID on every poll while the card stays in the
/// field. Only the first detection, and any detection after the cooldown has
/// run out, are accepted. A different card is accepted immediately.
#[derive(Debug, Clone)]
pub struct ScanDebouncer {
    cooldown: Duration,
    last: Option<(CardUid, Instant)>,
}

impl ScanDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last: None }
    }

    /// Decide whether the detection of `uid` at `now` is a new scan.
    ///
    /// Suppressed detections leave the state untouched, so the window is
    /// measured from the last accepted scan and not extended while the card
    /// is held in place.
    pub fn accept(&mut self, uid: &CardUid, now: Instant) -> bool {
        if let Some((last_uid, last_at)) = &self.last
            && last_uid == uid
            && now.saturating_duration_since(*last_at) < self.cooldown
        {
            return false;
        }

        self.last = Some((uid.clone(), now));
        true
    }

    pub fn last_accepted(&self) -> Option<&CardUid> {
        self.last.as_ref().map(|(uid, _)| uid)
    }

    pub fn last_accepted_at(&self) -> Option<Instant> {
        self.last.as_ref().map(|(_, at)| *at)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(hex: &str) -> CardUid {
        CardUid::from_hex(hex).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_suppress_accept() {
        let mut debouncer = ScanDebouncer::new(Duration::from_secs(3));
        let t0 = Instant::now();
        let card = uid("04a2b3c4");

        assert!(debouncer.accept(&card, t0));
        assert!(!debouncer.accept(&card, t0 + Duration::from_secs(1)));
        assert!(debouncer.accept(&card, t0 + Duration::from_secs(4)));
        assert_eq!(debouncer.last_accepted_at(), Some(t0 + Duration::from_secs(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppression_does_not_extend_window() {
        let mut debouncer = ScanDebouncer::new(Duration::from_secs(3));
        let t0 = Instant::now();
        let card = uid("04a2b3c4");

        assert!(debouncer.accept(&card, t0));
        for ms in (100..3000).step_by(100) {
            assert!(!debouncer.accept(&card, t0 + Duration::from_millis(ms)));
        }
        assert!(debouncer.accept(&card, t0 + Duration::from_secs(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_card_accepted_immediately() {
        let mut debouncer = ScanDebouncer::new(Duration::from_secs(3));
        let t0 = Instant::now();

        assert!(debouncer.accept(&uid("04a2b3c4"), t0));
        assert!(debouncer.accept(&uid("04e68f2a"), t0 + Duration::from_millis(10)));
        // The first card is new again relative to the last accepted one.
        assert!(debouncer.accept(&uid("04a2b3c4"), t0 + Duration::from_millis(20)));
        assert_eq!(debouncer.last_accepted(), Some(&uid("04a2b3c4")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_forgets_last_card() {
        let mut debouncer = ScanDebouncer::new(Duration::from_secs(3));
        let t0 = Instant::now();
        let card = uid("04a2b3c4");

        assert!(debouncer.accept(&card, t0));
        debouncer.reset();
        assert!(debouncer.accept(&card, t0 + Duration::from_millis(1)));
    }
}
