use std::sync::Mutex;
use uuid::Uuid;

/// Wall clock in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    fn now_unix_secs(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Produces `image_<seconds>.png` object keys.
///
/// A second that already produced a key (or a clock that stepped backwards)
/// gets a random suffix, `image_<seconds>_<uuid>.png`, so keys never repeat
/// within the process.
pub struct ObjectKeyGenerator<C: Clock = SystemClock> {
    clock: C,
    last_secs: Mutex<Option<i64>>,
}

impl<C: Clock> ObjectKeyGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last_secs: Mutex::new(None),
        }
    }

    pub fn next_key(&self) -> String {
        let secs = self.clock.now_unix_secs();
        // A poisoned lock only means a previous caller panicked mid-update; the value is still usable.
        let mut last = self.last_secs.lock().unwrap_or_else(|e| e.into_inner());
        let collides = matches!(*last, Some(prev) if secs <= prev);
        if !collides {
            *last = Some(secs);
            return format!("image_{}.png", secs);
        }
        let key = format!("image_{}_{}.png", secs, Uuid::new_v4().simple());
        tracing::debug!(%key, "Timestamp already used for a key, added unique suffix");
        key
    }
}
