use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use foundation::math::LonLat;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::events::CameraCommand;

/// Time of the most recent user interaction with the map.
#[derive(Debug, Clone, Default)]
pub struct InteractionClock {
    last: Arc<Mutex<Option<Instant>>>,
}

impl InteractionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) {
        self.record_at(Instant::now());
    }

    pub fn record_at(&self, at: Instant) {
        *self.last.lock() = Some(at);
    }

    pub fn last(&self) -> Option<Instant> {
        *self.last.lock()
    }

    pub fn since_last(&self, now: Instant) -> Option<Duration> {
        self.last().map(|t| now.saturating_duration_since(t))
    }
}

/// Decides whether a debounced location may move the camera.
///
/// Each location is judged on its own: a suppressed update does not disarm the
/// gate for later ones.
#[derive(Debug, Clone)]
pub struct RecenterGate {
    clock: InteractionClock,
    cooldown: Duration,
    following: Arc<AtomicBool>,
}

impl RecenterGate {
    pub fn new(clock: InteractionClock, cooldown: Duration, following: Arc<AtomicBool>) -> Self {
        Self {
            clock,
            cooldown,
            following,
        }
    }

    /// Closed while following, and until `cooldown` has passed since the last
    /// interaction.
    pub fn admits(&self, now: Instant) -> bool {
        if self.following.load(Ordering::SeqCst) {
            return false;
        }
        self.clock.since_last(now).is_none_or(|d| d > self.cooldown)
    }
}

/// Debounces the location stream by `quiet` and recenters through `gate`.
///
/// The task ends when the location sender is dropped.
pub fn spawn_auto_recenter<F>(
    mut locations: watch::Receiver<Option<LonLat>>,
    gate: RecenterGate,
    quiet: Duration,
    max_zoom: u8,
    mut on_recenter: F,
) -> JoinHandle<()>
where
    F: FnMut(CameraCommand) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            if locations.changed().await.is_err() {
                return;
            }
            loop {
                tokio::select! {
                    changed = locations.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(quiet) => break,
                }
            }
            let latest = *locations.borrow_and_update();
            let Some(center) = latest else { continue };
            if gate.admits(Instant::now()) {
                on_recenter(CameraCommand::CenterOn { center, max_zoom });
            } else {
                debug!("auto-recenter suppressed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{InteractionClock, RecenterGate, spawn_auto_recenter};
    use crate::events::CameraCommand;
    use crate::state::channels;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    const QUIET: Duration = Duration::from_secs(15);
    const COOLDOWN: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn gate_respects_cooldown_and_follow() {
        let clock = InteractionClock::new();
        let following = Arc::new(AtomicBool::new(false));
        let gate = RecenterGate::new(clock.clone(), COOLDOWN, Arc::clone(&following));
        let now = Instant::now();
        assert!(gate.admits(now));

        clock.record_at(now);
        assert!(!gate.admits(now + Duration::from_secs(5)));
        assert!(gate.admits(now + Duration::from_secs(11)));

        following.store(true, Ordering::SeqCst);
        assert!(!gate.admits(now + Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn suppressed_updates_do_not_disarm_the_gate() {
        let (state, _route, location, _vehicle) = channels();
        let clock = InteractionClock::new();
        let gate = RecenterGate::new(clock.clone(), COOLDOWN, Arc::new(AtomicBool::new(false)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let task = spawn_auto_recenter(state.subscribe_location(), gate, QUIET, 13, move |cmd| {
            sink.lock().push(cmd)
        });

        // Bursts collapse into one recenter after the quiet period.
        location.publish([25.0, 44.0]);
        sleep(Duration::from_secs(5)).await;
        location.publish([25.1, 44.1]);
        sleep(Duration::from_secs(16)).await;
        assert_eq!(
            *seen.lock(),
            vec![CameraCommand::CenterOn {
                center: [25.1, 44.1],
                max_zoom: 13
            }]
        );

        // Interaction 5 s before the debounced emission suppresses it.
        location.publish([25.2, 44.2]);
        sleep(Duration::from_secs(10)).await;
        clock.record();
        sleep(Duration::from_secs(6)).await;
        assert_eq!(seen.lock().len(), 1);

        // The next quiet update recenters again.
        location.publish([25.3, 44.3]);
        sleep(Duration::from_secs(16)).await;
        assert_eq!(seen.lock().len(), 2);

        drop(location);
        task.await.unwrap();
    }
}
