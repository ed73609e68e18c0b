use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between outbound calls, shared by every unit in a batch.
///
/// Callers reserve the next free slot under the lock and sleep outside it, so the
/// lock is never held across an await.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced() {
        let throttle = Arc::new(Throttle::new(Duration::from_millis(100)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let throttle = throttle.clone();
            handles.push(tokio::spawn(async move {
                throttle.acquire().await;
                Instant::now()
            }));
        }

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap() - start);
        }
        times.sort();

        assert_eq!(times[0], Duration::ZERO);
        assert!(times[1] >= Duration::from_millis(100));
        assert!(times[2] >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let throttle = Throttle::unlimited();
        let start = Instant::now();
        for _ in 0..100 {
            throttle.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
