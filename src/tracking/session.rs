use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use super::{
    domain::{resolve, Domain},
    event::{BrowserEvent, TabId},
};

/// Contiguous interval during which one domain was the focused tab.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Session {
    pub domain: Domain,
    pub tab_id: Option<TabId>,
    pub started_at: DateTime<Utc>,
    /// Set once a checkpoint has already reported the visit for this session.
    visit_counted: bool,
}

impl Session {
    fn open(domain: Domain, tab_id: TabId, now: DateTime<Utc>) -> Self {
        debug!("Opening session for {domain}");
        Self {
            domain,
            tab_id: Some(tab_id),
            started_at: now,
            visit_counted: false,
        }
    }

    /// Converts the time accrued since `started_at` into a [Flush], unless it is too short to
    /// count. Redirect chains and rapid tab cycling end up here.
    fn flush(&self, now: DateTime<Utc>, min_dwell: Duration) -> Option<Flush> {
        let elapsed = now - self.started_at;
        if elapsed <= min_dwell {
            trace!("Discarding {elapsed} on {}", self.domain);
            return None;
        }
        Some(Flush {
            domain: self.domain.clone(),
            started_at: self.started_at,
            ended_at: now,
            visits: if self.visit_counted { 0 } else { 1 },
        })
    }
}

/// Elapsed time of a session on a single domain, waiting to be accumulated.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Flush {
    pub domain: Domain,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub visits: u32,
}

impl Flush {
    pub fn elapsed(&self) -> Duration {
        self.ended_at - self.started_at
    }
}

/// Holds the single active [Session] and turns browser events into session transitions. A
/// transition closes the previous session and opens the next one in the same call, so no event
/// ever sees a half closed session.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    active: Option<Session>,
    min_dwell: Duration,
}

impl SessionTracker {
    pub fn new(min_dwell: Duration) -> Self {
        Self {
            active: None,
            min_dwell,
        }
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    /// Applies an event. Returns the time of the session the event closed, if it was long enough
    /// to count.
    pub fn handle(&mut self, event: &BrowserEvent, now: DateTime<Utc>) -> Option<Flush> {
        match event {
            BrowserEvent::FocusChanged { tab_id, url } => {
                self.focus(*tab_id, resolve(url.as_deref()), now)
            }
            BrowserEvent::NavigationComplete { tab_id, url } => {
                self.navigate(*tab_id, resolve(url.as_deref()), now)
            }
            BrowserEvent::TabClosed { tab_id } => match &self.active {
                Some(session) if session.tab_id == Some(*tab_id) => self.close(now),
                _ => None,
            },
            BrowserEvent::WindowClosed | BrowserEvent::IdleOrLocked => self.close(now),
            BrowserEvent::ScheduledTick { .. } => None,
        }
    }

    fn focus(&mut self, tab_id: TabId, domain: Option<Domain>, now: DateTime<Utc>) -> Option<Flush> {
        // Another tab on the same site keeps the session going.
        if let Some(session) = self
            .active
            .as_mut()
            .filter(|v| Some(&v.domain) == domain.as_ref())
        {
            session.tab_id = Some(tab_id);
            return None;
        }
        self.transition(domain.map(|v| (v, tab_id)), now)
    }

    fn navigate(
        &mut self,
        tab_id: TabId,
        domain: Option<Domain>,
        now: DateTime<Utc>,
    ) -> Option<Flush> {
        if let Some(session) = &self.active {
            if session.tab_id.is_some_and(|v| v != tab_id) {
                trace!("Ignoring navigation in background tab {tab_id:?}");
                return None;
            }
            if domain.as_ref() == Some(&session.domain) {
                return None;
            }
        }
        self.transition(domain.map(|v| (v, tab_id)), now)
    }

    fn transition(&mut self, next: Option<(Domain, TabId)>, now: DateTime<Utc>) -> Option<Flush> {
        let flush = self.close(now);
        self.active = next.map(|(domain, tab_id)| Session::open(domain, tab_id, now));
        flush
    }

    /// Ends the active session, leaving the tracker idle.
    pub fn close(&mut self, now: DateTime<Utc>) -> Option<Flush> {
        let session = self.active.take()?;
        debug!("Closing session for {}", session.domain);
        session.flush(now, self.min_dwell)
    }

    /// Flushes the time accrued so far while keeping the session open, as if it was closed and
    /// reopened on the same tab.
    pub fn checkpoint(&mut self, now: DateTime<Utc>) -> Option<Flush> {
        let min_dwell = self.min_dwell;
        let session = self.active.as_mut()?;
        let flush = session.flush(now, min_dwell)?;
        session.started_at = now;
        session.visit_counted = true;
        Some(flush)
    }

    /// Forgets the time accrued by the active session without closing it.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        if let Some(session) = self.active.as_mut() {
            session.started_at = now;
            session.visit_counted = false;
        }
    }
}
