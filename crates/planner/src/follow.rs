use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::PlannerConfig;
use crate::events::CameraCommand;
use crate::state::SharedState;

/// Camera command for one follow tick: center on the live location when
/// known, otherwise fit the current route, otherwise nothing.
pub fn follow_camera(state: &SharedState, max_zoom: u8, padding: u32) -> Option<CameraCommand> {
    if let Some(center) = state.current_location() {
        return Some(CameraCommand::CenterOn { center, max_zoom });
    }
    let bounds = state.current_route()?.bounds()?;
    Some(CameraCommand::FitBounds {
        bounds,
        padding,
        max_zoom: None,
    })
}

/// Periodic camera follow.
///
/// At most one tick task exists per controller: `follow` stops the previous
/// task before spawning a new one, and the task is aborted on
/// `stop_following` and on drop.
pub struct FollowController {
    state: SharedState,
    interval: Duration,
    max_zoom: u8,
    padding: u32,
    following: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FollowController {
    pub fn new(state: SharedState, config: &PlannerConfig) -> Self {
        Self {
            state,
            interval: config.follow_interval(),
            max_zoom: config.follow_max_zoom,
            padding: config.follow_padding,
            following: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Starts ticking now and then every interval. Must be called inside a
    /// tokio runtime.
    pub fn follow<F>(&mut self, mut on_tick: F)
    where
        F: FnMut(CameraCommand) + Send + 'static,
    {
        self.stop_following();
        let state = self.state.clone();
        let (period, max_zoom, padding) = (self.interval, self.max_zoom, self.padding);
        self.following.store(true, Ordering::SeqCst);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Some(cmd) = follow_camera(&state, max_zoom, padding) {
                    on_tick(cmd);
                }
            }
        }));
        debug!(?period, "follow started");
    }

    /// Idempotent.
    pub fn stop_following(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("follow stopped");
        }
        self.following.store(false, Ordering::SeqCst);
    }

    pub fn is_following(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Shared flag the recenter gate consults.
    pub fn following_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.following)
    }
}

impl Drop for FollowController {
    fn drop(&mut self) {
        self.stop_following();
    }
}

#[cfg(test)]
mod tests {
    use super::{FollowController, follow_camera};
    use crate::config::PlannerConfig;
    use crate::events::CameraCommand;
    use crate::state::channels;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn recorder() -> (Arc<Mutex<Vec<CameraCommand>>>, impl FnMut(CameraCommand) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |cmd| sink.lock().push(cmd))
    }

    #[tokio::test(start_paused = true)]
    async fn following_twice_keeps_a_single_timer() {
        let (state, _route, location, _vehicle) = channels();
        location.publish([25.0, 44.0]);
        let mut follow = FollowController::new(state, &PlannerConfig::default());

        let (first, sink) = recorder();
        follow.follow(sink);
        let (second, sink) = recorder();
        follow.follow(sink);

        tokio::time::sleep(Duration::from_millis(7_500)).await;
        assert!(first.lock().is_empty());
        // Ticks at 0 s, 3 s and 6 s.
        assert_eq!(second.lock().len(), 3);
        assert_eq!(
            second.lock()[0],
            CameraCommand::CenterOn {
                center: [25.0, 44.0],
                max_zoom: 13
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_ticks_and_is_idempotent() {
        let (state, _route, location, _vehicle) = channels();
        location.publish([25.0, 44.0]);
        let mut follow = FollowController::new(state, &PlannerConfig::default());
        let flag = follow.following_flag();

        let (seen, sink) = recorder();
        follow.follow(sink);
        assert!(flag.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(100)).await;
        follow.stop_following();
        follow.stop_following();
        assert!(!follow.is_following());
        assert!(!flag.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn no_location_and_no_route_means_no_command() {
        let (state, _route, _location, _vehicle) = channels();
        assert_eq!(follow_camera(&state, 13, 160), None);
    }
}
