/// Real time playback of a recorded track as location updates.
///
/// Points are sent strictly in source order, one at a time. Before each point after the first the
/// scheduler waits for the whole number of seconds between the previous point's timestamp and
/// this one's. Sub-second differences are truncated, so points within the same second go out
/// back to back, and out-of-order timestamps never wait.
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, FixedOffset};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::{
    connection::Connection, session::LocationSession, track::WaypointSource, Error, SLResult,
};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub points_sent: usize,
    pub total_wait: Duration,
}

/// Shared signal used to abort a playback run from another thread.
///
/// Nothing is ever sent on the channel. Cancelling drops the only sender, which disconnects every
/// receiver at once and wakes any of them blocked in [`CancelToken::wait_timeout`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block for up to `timeout`. Returns true if the token was (or got) cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }
}

/// How the scheduler waits between points.
pub trait Sleeper {
    /// Wait for `duration`, returning [`Error::Cancelled`] as soon as `cancel` fires.
    fn sleep(&mut self, duration: Duration, cancel: &CancelToken) -> SLResult<()>;
}

/// Blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration, cancel: &CancelToken) -> SLResult<()> {
        if cancel.wait_timeout(duration) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

//  ____       _              _       _
// / ___|  ___| |__   ___  __| |_   _| | ___ _ __
// \___ \ / __| '_ \ / _ \/ _` | | | | |/ _ \ '__|
//  ___) | (__| | | |  __/ (_| | |_| | |  __/ |
// |____/ \___|_| |_|\___|\__,_|\__,_|_|\___|_|

pub struct PlaybackScheduler<S: Sleeper> {
    sleeper: S,
    cancel: CancelToken,
    state: PlaybackState,
}

impl<S: Sleeper> PlaybackScheduler<S> {
    pub fn new(sleeper: S, cancel: CancelToken) -> Self {
        Self {
            sleeper,
            cancel,
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Play every waypoint of `source` through `session`. A scheduler runs once.
    ///
    /// The first error aborts the remaining points and is returned as is.
    pub fn run<C, W>(
        &mut self,
        session: &mut LocationSession<C>,
        source: &W,
    ) -> SLResult<PlaybackSummary>
    where
        C: Connection,
        W: WaypointSource + ?Sized,
    {
        if self.state != PlaybackState::Idle {
            return Err(Error::InvalidState(self.state));
        }
        self.state = PlaybackState::Running;
        let mut summary = PlaybackSummary::default();
        match self.play(session, source, &mut summary) {
            Ok(()) => {
                self.state = PlaybackState::Completed;
                info!(
                    points = summary.points_sent,
                    waited_s = summary.total_wait.as_secs(),
                    "playback completed"
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = PlaybackState::Failed;
                warn!(points = summary.points_sent, "playback failed: {e}");
                Err(e)
            }
        }
    }

    fn play<C, W>(
        &mut self,
        session: &mut LocationSession<C>,
        source: &W,
        summary: &mut PlaybackSummary,
    ) -> SLResult<()>
    where
        C: Connection,
        W: WaypointSource + ?Sized,
    {
        let mut last: Option<DateTime<FixedOffset>> = None;
        for (i, waypoint) in source.waypoints().enumerate() {
            let current = match last {
                Some(last) => {
                    let current = waypoint.timestamp()?;
                    let delta = current.timestamp() - last.timestamp();
                    if delta > 0 {
                        let wait = Duration::from_secs(delta as u64);
                        debug!(point = i, wait_s = delta, "waiting");
                        self.check_cancelled()?;
                        self.sleeper.sleep(wait, &self.cancel)?;
                        summary.total_wait += wait;
                    }
                    Some(current)
                }
                // Nothing to pace against yet, so a bad first timestamp only means no wait.
                None => waypoint.timestamp().ok(),
            };
            last = current;

            self.check_cancelled()?;
            session.set_location(&waypoint.lat, &waypoint.lon)?;
            summary.points_sent += 1;
        }
        Ok(())
    }

    fn check_cancelled(&self) -> SLResult<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
