//! Timer-driven loops with cooperative shutdown.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use crossbeam::channel::{after, select, Receiver};

const SECONDS_PER_HOUR: u64 = 3600;

/// When a periodic task runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// A fixed pause between the end of one run and the start of the next.
    Every(Duration),
    /// `times` evenly spaced runs each hour, the first at `offset` past the
    /// hour (modulo the spacing).
    PerHour { times: u32, offset: Duration },
}

impl Schedule {
    /// How long to wait from `now` until the next run.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            Schedule::Every(period) => period,
            Schedule::PerHour { times, offset } => {
                let interval = SECONDS_PER_HOUR / u64::from(times.clamp(1, 3600));
                let phase = offset.as_secs() % interval;
                let into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
                let into_interval = (into_hour + interval - phase) % interval;
                let wait = interval - into_interval;
                Duration::from_secs(wait)
                    .saturating_sub(Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000)))
            }
        }
    }
}

/// Run `task` on `schedule` until `shutdown` yields a message or its sender
/// is dropped. A run in progress always completes; shutdown is only observed
/// between runs.
pub fn run_periodically<F>(name: &str, shutdown: &Receiver<()>, schedule: Schedule, mut task: F)
where
    F: FnMut(),
{
    tracing::debug!(task = name, schedule = ?schedule, "periodic task started");
    loop {
        let delay = schedule.next_delay(Utc::now());
        select! {
            recv(shutdown) -> _ => break,
            recv(after(delay)) -> _ => task(),
        }
    }
    tracing::debug!(task = name, "periodic task stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use chrono::TimeZone;
    use crossbeam::channel::bounded;

    use super::*;

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, second).unwrap()
    }

    fn per_hour(times: u32, offset_minutes: u64) -> Schedule {
        Schedule::PerHour {
            times,
            offset: Duration::from_secs(offset_minutes * 60),
        }
    }

    #[test]
    fn every_is_constant() {
        let schedule = Schedule::Every(Duration::from_secs(5));
        assert_eq!(schedule.next_delay(at(0, 0)), Duration::from_secs(5));
        assert_eq!(schedule.next_delay(at(59, 59)), Duration::from_secs(5));
    }

    #[test]
    fn once_an_hour_at_offset() {
        let schedule = per_hour(1, 35);
        assert_eq!(schedule.next_delay(at(0, 0)), Duration::from_secs(35 * 60));
        assert_eq!(schedule.next_delay(at(34, 0)), Duration::from_secs(60));
        // Exactly on the tick waits for the next hour.
        assert_eq!(schedule.next_delay(at(35, 0)), Duration::from_secs(3600));
        assert_eq!(schedule.next_delay(at(50, 0)), Duration::from_secs(45 * 60));
    }

    #[test]
    fn several_times_an_hour() {
        // Every 15 minutes, at :02, :17, :32 and :47.
        let schedule = per_hour(4, 2);
        assert_eq!(schedule.next_delay(at(0, 0)), Duration::from_secs(2 * 60));
        assert_eq!(schedule.next_delay(at(3, 0)), Duration::from_secs(14 * 60));
        assert_eq!(schedule.next_delay(at(47, 30)), Duration::from_secs(14 * 60 + 30));
    }

    #[test]
    fn offset_larger_than_interval_wraps() {
        // Every 30 minutes with a 40 minute offset runs at :10 and :40.
        let schedule = per_hour(2, 40);
        assert_eq!(schedule.next_delay(at(0, 0)), Duration::from_secs(10 * 60));
        assert_eq!(schedule.next_delay(at(20, 0)), Duration::from_secs(20 * 60));
    }

    #[test]
    fn stops_when_sender_is_dropped() {
        let (tx, rx) = bounded::<()>(0);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let handle = thread::spawn(move || {
            run_periodically("test", &rx, Schedule::Every(Duration::from_millis(5)), || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });
        while runs.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        drop(tx);
        handle.join().unwrap();
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }
}
