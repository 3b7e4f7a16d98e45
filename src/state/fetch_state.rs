//! Per-URL fetch states of the escalation controller
//!
//! A product URL moves through `Unfetched -> FetchedPlain -> {Complete | PendingRender}`,
//! and from `PendingRender` through `FetchedRendered -> Complete`. When the rendered
//! re-fetch itself fails the URL goes straight from `PendingRender` to `Complete` with the
//! plain result.

use crate::{Result, TrackerError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    /// Claimed by the session, no request issued yet
    Unfetched,

    /// The plain fetch returned and was extracted
    FetchedPlain,

    /// The plain extraction found no price; one rendered fetch is owed
    PendingRender,

    /// The rendered fetch returned and was extracted
    FetchedRendered,

    /// Extraction result accepted; no further fetch for this URL
    Complete,
}

impl FetchState {
    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: FetchState) -> bool {
        use FetchState::*;

        matches!(
            (self, next),
            (Unfetched, FetchedPlain)
                | (FetchedPlain, Complete)
                | (FetchedPlain, PendingRender)
                | (PendingRender, FetchedRendered)
                | (PendingRender, Complete)
                | (FetchedRendered, Complete)
        )
    }

    /// Moves to `next`, rejecting illegal transitions
    ///
    /// # Returns
    ///
    /// * `Ok(FetchState)` - The new state
    /// * `Err(TrackerError::InvalidTransition)` - `next` is not reachable from this state
    pub fn transition(self, next: FetchState) -> Result<FetchState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TrackerError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unfetched => "unfetched",
            Self::FetchedPlain => "fetched_plain",
            Self::PendingRender => "pending_render",
            Self::FetchedRendered => "fetched_rendered",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FetchState::*;

    const ALL: [FetchState; 5] = [Unfetched, FetchedPlain, PendingRender, FetchedRendered, Complete];

    #[test]
    fn test_happy_paths() {
        let plain_only = Unfetched
            .transition(FetchedPlain)
            .and_then(|s| s.transition(Complete))
            .unwrap();
        assert!(plain_only.is_terminal());

        let escalated = Unfetched
            .transition(FetchedPlain)
            .and_then(|s| s.transition(PendingRender))
            .and_then(|s| s.transition(FetchedRendered))
            .and_then(|s| s.transition(Complete))
            .unwrap();
        assert_eq!(escalated, Complete);
    }

    #[test]
    fn test_rendered_state_cannot_escalate_again() {
        assert!(!FetchedRendered.can_transition_to(PendingRender));
        let err = FetchedRendered.transition(PendingRender).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidTransition {
                from: FetchedRendered,
                to: PendingRender
            }
        ));
    }

    #[test]
    fn test_complete_is_final() {
        for next in ALL {
            assert!(!Complete.can_transition_to(next));
        }
    }

    #[test]
    fn test_no_path_issues_a_third_fetch() {
        // Walk every legal path from Unfetched and count fetch-issuing transitions.
        fn walk(state: FetchState, fetches: u8, max_seen: &mut u8) {
            *max_seen = (*max_seen).max(fetches);
            for next in ALL {
                if state.can_transition_to(next) {
                    let issued = matches!(next, FetchedPlain | FetchedRendered) as u8;
                    walk(next, fetches + issued, max_seen);
                }
            }
        }

        let mut max_seen = 0;
        walk(Unfetched, 0, &mut max_seen);
        assert_eq!(max_seen, 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(PendingRender.to_string(), "pending_render");
    }
}
