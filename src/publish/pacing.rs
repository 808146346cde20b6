//! Fixed-interval pacing between topics, kept as an explicit policy object
//! over the injectable sleeper so tests never wait for real.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Sleeper;

pub struct Pacer {
    interval: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Pacer {
    pub fn new(interval: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { interval, sleeper }
    }

    /// Unconditional wait after a processed topic; the upstream rate limit
    /// is respected whether the topic succeeded or failed.
    pub async fn pause(&self) {
        if !self.interval.is_zero() {
            self.sleeper.sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    #[tokio::test]
    async fn pauses_for_the_configured_interval() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pacer = Pacer::new(Duration::from_secs(2), sleeper.clone());
        pacer.pause().await;
        pacer.pause().await;
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn zero_interval_never_sleeps() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let pacer = Pacer::new(Duration::ZERO, sleeper.clone());
        pacer.pause().await;
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }
}
