//! Per-attempt issuance state machine.
//!
//! ```text
//! Requested ──► Funded ──► Submitted ──► Confirmed ──► Revoked
//!     │                        │
//!     ▼                        ▼
//!  Rejected                  Failed
//! ```
//!
//! `Rejected`, `Failed` and `Revoked` are terminal. Nothing leads back out
//! of `Confirmed` except an explicit revoke.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::IssuanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssuanceState {
    Requested,
    Funded,
    Submitted,
    Confirmed,
    Failed,
    Rejected,
    Revoked,
}

impl IssuanceState {
    pub fn can_transition_to(self, next: IssuanceState) -> bool {
        use IssuanceState::*;
        matches!(
            (self, next),
            (Requested, Funded)
                | (Requested, Rejected)
                | (Funded, Submitted)
                | (Submitted, Confirmed)
                | (Submitted, Failed)
                | (Confirmed, Revoked)
        )
    }

    /// Checked transition. Illegal moves are `InvalidTransition`.
    pub fn transition(self, next: IssuanceState) -> Result<IssuanceState, IssuanceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(IssuanceError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Rejected | Self::Revoked)
    }
}

impl fmt::Display for IssuanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::Funded => "funded",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::Revoked => "revoked",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::IssuanceState::*;
    use super::*;

    const ALL: [IssuanceState; 7] = [
        Requested, Funded, Submitted, Confirmed, Failed, Rejected, Revoked,
    ];

    #[test]
    fn happy_path() {
        let s = Requested.transition(Funded).unwrap();
        let s = s.transition(Submitted).unwrap();
        let s = s.transition(Confirmed).unwrap();
        assert_eq!(s.transition(Revoked).unwrap(), Revoked);
    }

    #[test]
    fn confirmed_never_goes_back() {
        for next in [Requested, Funded, Submitted, Failed, Rejected] {
            assert!(Confirmed.transition(next).is_err(), "confirmed -> {next}");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn cannot_submit_without_funding() {
        let err = Requested.transition(Submitted).unwrap_err();
        assert!(matches!(
            err,
            IssuanceError::InvalidTransition {
                from: Requested,
                to: Submitted
            }
        ));
    }
}
