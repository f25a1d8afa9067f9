//! Crawl phase definitions
//!
//! A crawl moves `Idle → Paginating → Draining → Done`; `Aborted` is the terminal
//! failure state.

use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Configured but not started
    Idle,

    /// Pages are being discovered and fed to the scheduler
    Paginating,

    /// No new pages will be admitted; waiting for in-flight fetches
    Draining,

    // ===== Terminal States =====
    /// Every page was processed and results were handed to the writer
    Done,

    /// No seed page could be established, or the deadline expired
    Aborted,
}

impl CrawlPhase {
    /// Returns true if this is a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true if the crawl ended without aborting
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the crawl may still admit new pages
    pub fn accepts_pages(&self) -> bool {
        matches!(self, Self::Paginating)
    }

    /// Returns true if moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Paginating)
                | (Self::Paginating, Self::Draining)
                | (Self::Paginating, Self::Aborted)
                | (Self::Draining, Self::Done)
                | (Self::Draining, Self::Aborted)
        )
    }

    /// Lowercase name used in logs and the summary
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Paginating => "paginating",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
