use crate::error::PipelineError;
use crate::models::{SignalLabel, Status};

/// Result of a successful transition. `changed` is false for accepted no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Status,
    pub to: Status,
    pub changed: bool,
}

impl Transition {
    fn between(from: Status, to: Status) -> Self {
        Self {
            from,
            to,
            changed: from != to,
        }
    }

    /// Every real change is worth telling the user about, except a move into `New`.
    pub fn notify(&self) -> bool {
        self.changed && self.to != Status::New
    }
}

/// State a signal points at.
pub fn target(label: SignalLabel) -> Status {
    match label {
        SignalLabel::Confirmation => Status::Applied,
        SignalLabel::OAInvite => Status::OA,
        SignalLabel::PhoneInvite => Status::Phone,
        SignalLabel::TechInvite => Status::Technical,
        SignalLabel::OfferLetter => Status::Offer,
        SignalLabel::Rejection => Status::Rejected,
    }
}

/// Position in the hiring funnel. `None` for states outside it.
fn rank(status: Status) -> Option<u8> {
    match status {
        Status::New => Some(0),
        Status::Applied => Some(1),
        Status::OA => Some(2),
        Status::Phone => Some(3),
        Status::Technical => Some(4),
        Status::Offer => Some(5),
        Status::Rejected | Status::Ghosted => None,
    }
}

pub fn is_terminal(status: Status) -> bool {
    matches!(status, Status::Offer | Status::Rejected)
}

/// Apply a classified signal to a record in state `current`.
pub fn transition(current: Status, label: SignalLabel) -> Result<Transition, PipelineError> {
    let next = target(label);

    if next == Status::Rejected {
        return Ok(Transition::between(current, next));
    }

    match current {
        Status::Offer | Status::Rejected => Err(PipelineError::invalid_transition(current, label)),
        Status::Ghosted => revive(None, label),
        _ => {
            let (Some(from_rank), Some(to_rank)) = (rank(current), rank(next)) else {
                return Err(PipelineError::invalid_transition(current, label));
            };
            if to_rank < from_rank {
                Err(PipelineError::invalid_transition(current, label))
            } else {
                Ok(Transition::between(current, next))
            }
        }
    }
}

/// A signal for a `Ghosted` record: the company came back after the user gave
/// up on it. The record never lands below `prior`, the state it was ghosted from.
pub fn revive(prior: Option<Status>, label: SignalLabel) -> Result<Transition, PipelineError> {
    let next = target(label);
    let to = match prior {
        Some(prior) if next != Status::Rejected && rank(prior) > rank(next) => prior,
        _ => next,
    };
    Ok(Transition::between(Status::Ghosted, to))
}

/// User-initiated move to `Ghosted`. Never produced by a signal.
pub fn mark_ghosted(current: Status) -> Result<Transition, PipelineError> {
    if is_terminal(current) {
        return Err(PipelineError::InvalidTransition {
            from: current,
            label: "Ghosted".to_string(),
        });
    }
    Ok(Transition::between(current, Status::Ghosted))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [Status; 8] = [
        Status::New,
        Status::Applied,
        Status::OA,
        Status::Phone,
        Status::Technical,
        Status::Offer,
        Status::Rejected,
        Status::Ghosted,
    ];

    #[test]
    fn test_forward_progression() {
        let mut state = Status::New;
        for label in [
            SignalLabel::Confirmation,
            SignalLabel::OAInvite,
            SignalLabel::PhoneInvite,
            SignalLabel::TechInvite,
            SignalLabel::OfferLetter,
        ] {
            let t = transition(state, label).unwrap();
            assert!(t.changed);
            assert!(t.notify());
            state = t.to;
        }
        assert_eq!(state, Status::Offer);
    }

    #[test]
    fn test_skipping_stages_is_allowed() {
        let t = transition(Status::New, SignalLabel::TechInvite).unwrap();
        assert_eq!(t.to, Status::Technical);
        let t = transition(Status::Applied, SignalLabel::OfferLetter).unwrap();
        assert_eq!(t.to, Status::Offer);
    }

    #[test]
    fn test_backward_signal_is_invalid() {
        let err = transition(Status::OA, SignalLabel::Confirmation).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition { from: Status::OA, .. }
        ));

        assert!(transition(Status::Technical, SignalLabel::PhoneInvite).is_err());
    }

    #[test]
    fn test_rejection_from_every_state() {
        for state in ALL_STATES {
            let t = transition(state, SignalLabel::Rejection).unwrap();
            assert_eq!(t.to, Status::Rejected);
            assert_eq!(t.changed, state != Status::Rejected);
        }
    }

    #[test]
    fn test_repeated_rejection_is_silent_noop() {
        let t = transition(Status::Rejected, SignalLabel::Rejection).unwrap();
        assert_eq!(t.from, Status::Rejected);
        assert!(!t.changed);
        assert!(!t.notify());
    }

    #[test]
    fn test_terminal_states_refuse_other_signals() {
        for label in [
            SignalLabel::Confirmation,
            SignalLabel::OAInvite,
            SignalLabel::PhoneInvite,
            SignalLabel::TechInvite,
            SignalLabel::OfferLetter,
        ] {
            assert!(transition(Status::Rejected, label).is_err());
            assert!(transition(Status::Offer, label).is_err());
        }
    }

    #[test]
    fn test_same_state_signal_is_noop() {
        let t = transition(Status::OA, SignalLabel::OAInvite).unwrap();
        assert_eq!(t.to, Status::OA);
        assert!(!t.changed);
        assert!(!t.notify());
    }

    #[test]
    fn test_signals_never_produce_ghosted() {
        for state in ALL_STATES {
            for label in [
                SignalLabel::Confirmation,
                SignalLabel::OAInvite,
                SignalLabel::PhoneInvite,
                SignalLabel::TechInvite,
                SignalLabel::OfferLetter,
                SignalLabel::Rejection,
            ] {
                if let Ok(t) = transition(state, label) {
                    assert_ne!(t.to, Status::Ghosted);
                }
            }
        }
    }

    #[test]
    fn test_ghosting() {
        let t = mark_ghosted(Status::Applied).unwrap();
        assert_eq!(t.to, Status::Ghosted);
        assert!(t.changed);

        assert!(!mark_ghosted(Status::Ghosted).unwrap().changed);
        assert!(mark_ghosted(Status::Offer).is_err());
        assert!(mark_ghosted(Status::Rejected).is_err());

        let revived = transition(Status::Ghosted, SignalLabel::PhoneInvite).unwrap();
        assert_eq!(revived.to, Status::Phone);
    }

    #[test]
    fn test_revival_keeps_progress_made_before_ghosting() {
        let late = revive(Some(Status::Technical), SignalLabel::Confirmation).unwrap();
        assert_eq!((late.from, late.to), (Status::Ghosted, Status::Technical));
        assert!(late.changed && late.notify());

        let ahead = revive(Some(Status::Applied), SignalLabel::OfferLetter).unwrap();
        assert_eq!(ahead.to, Status::Offer);

        let rejected = revive(Some(Status::Technical), SignalLabel::Rejection).unwrap();
        assert_eq!(rejected.to, Status::Rejected);

        let unknown = revive(None, SignalLabel::Confirmation).unwrap();
        assert_eq!(unknown.to, Status::Applied);
    }
}
