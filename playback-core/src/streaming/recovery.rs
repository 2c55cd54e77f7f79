// Playback resilience controller - error classifier & recovery policy
//
// Raw engine/sink error signals are mapped onto four classes, and a
// class-keyed rule table decides between bounded recovery, escalation to
// `Failed`, or ignoring the signal.

use std::collections::HashMap;
use std::fmt;

use common::{
    AttachError, EngineErrorKind, ErrorClass, FailureReason, MediaErrorCode, PlaybackError,
    RawError, SessionState,
};

use crate::config::RecoveryConfig;

/// Result of classifying a raw error signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Goes through the recovery policy
    Error(PlaybackError),
    /// The sink refused the source before the session became ready
    AttachRejected(AttachError),
    /// Handled internally by the collaborator, nothing to do
    Ignored(RawError),
}

/// Map a raw signal onto the error taxonomy.
///
/// `state` is the session state at arrival; a source-not-supported error is an
/// attach failure while the session is still attaching.
pub fn classify_error(raw: RawError, state: SessionState) -> Classification {
    match verdict(&raw, state) {
        Verdict::Class(class) => Classification::Error(PlaybackError::new(class, raw)),
        Verdict::Ignore => Classification::Ignored(raw),
        Verdict::Reject(error) => Classification::AttachRejected(error),
    }
}

enum Verdict {
    Class(ErrorClass),
    Ignore,
    Reject(AttachError),
}

fn verdict(raw: &RawError, state: SessionState) -> Verdict {
    match raw {
        RawError::Engine(error) if error.detail.is_buffer_stall() => {
            Verdict::Class(ErrorClass::Stall)
        }
        RawError::Engine(error) if !error.fatal => Verdict::Ignore,
        RawError::Engine(error) => match error.kind {
            EngineErrorKind::Network => Verdict::Class(ErrorClass::Network),
            EngineErrorKind::Media => Verdict::Class(ErrorClass::Media),
            EngineErrorKind::KeySystem | EngineErrorKind::Mux | EngineErrorKind::Other => {
                Verdict::Class(ErrorClass::Unknown)
            }
        },
        RawError::Sink { code } => match code {
            MediaErrorCode::Aborted => Verdict::Ignore,
            MediaErrorCode::Network => Verdict::Class(ErrorClass::Network),
            MediaErrorCode::Decode => Verdict::Class(ErrorClass::Media),
            MediaErrorCode::SrcNotSupported if state == SessionState::Attaching => {
                Verdict::Reject(AttachError::SinkRejected(
                    "source format not supported".to_string(),
                ))
            }
            MediaErrorCode::SrcNotSupported => Verdict::Class(ErrorClass::Unknown),
        },
        RawError::SinkStalled => Verdict::Class(ErrorClass::Stall),
    }
}

/// Recovery action executed through the lifecycle manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryAction {
    /// Restart manifest/segment loading
    RestartLoad,
    /// Re-initialize decoding in place
    RecoverMedia,
    /// Nudge a starved buffer
    RecoverBuffer,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryAction::RestartLoad => "restart_load",
            RecoveryAction::RecoverMedia => "recover_media",
            RecoveryAction::RecoverBuffer => "recover_buffer",
        };
        f.write_str(name)
    }
}

/// How many times a rule's action may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBound {
    /// Not counted, may run any number of times
    Unbounded,
    /// At most `n` counted attempts, then escalate
    AtMost(u32),
    /// Escalate immediately
    Never,
}

/// One row of the policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyRule {
    pub action: Option<RecoveryAction>,
    pub bound: RetryBound,
    /// Whether forward progress clears this class's attempt counter
    pub resets_on_progress: bool,
}

impl PolicyRule {
    const ESCALATE: PolicyRule = PolicyRule {
        action: None,
        bound: RetryBound::Never,
        resets_on_progress: false,
    };
}

/// Decision for one classified error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Recover {
        action: RecoveryAction,
        /// 1-based attempt number for counted classes, 0 otherwise
        attempt: u32,
    },
    Escalate(FailureReason),
    Ignore,
}

/// Per-session attempt counters, one per error class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryLedger {
    counts: HashMap<ErrorClass, u32>,
}

impl RetryLedger {
    pub fn count(&self, class: ErrorClass) -> u32 {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    /// Record one attempt and return the new count.
    pub fn record(&mut self, class: ErrorClass) -> u32 {
        let count = self.counts.entry(class).or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset(&mut self, class: ErrorClass) {
        self.counts.remove(&class);
    }
}

/// Class → rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    rules: HashMap<ErrorClass, PolicyRule>,
}

impl RecoveryPolicy {
    pub fn new(config: &RecoveryConfig) -> Self {
        let mut rules = HashMap::new();

        rules.insert(
            ErrorClass::Network,
            PolicyRule {
                action: Some(RecoveryAction::RestartLoad),
                bound: RetryBound::AtMost(config.network_max_retries),
                resets_on_progress: true,
            },
        );
        rules.insert(
            ErrorClass::Media,
            PolicyRule {
                action: Some(RecoveryAction::RecoverMedia),
                bound: RetryBound::AtMost(config.media_max_recoveries),
                resets_on_progress: false,
            },
        );
        rules.insert(
            ErrorClass::Stall,
            PolicyRule {
                action: config.stall_recovery.then_some(RecoveryAction::RecoverBuffer),
                bound: RetryBound::Unbounded,
                resets_on_progress: false,
            },
        );
        rules.insert(ErrorClass::Unknown, PolicyRule::ESCALATE);

        Self { rules }
    }

    pub fn rule(&self, class: ErrorClass) -> &PolicyRule {
        self.rules.get(&class).unwrap_or(&PolicyRule::ESCALATE)
    }

    /// Classes whose counters forward progress clears.
    pub fn progress_resets(&self) -> impl Iterator<Item = ErrorClass> + '_ {
        ErrorClass::ALL
            .into_iter()
            .filter(|class| self.rule(*class).resets_on_progress)
    }

    /// Decide what to do about `error` given the attempts already made.
    ///
    /// Pure: the caller records the attempt when it acts on `Recover`.
    pub fn decide(&self, error: &PlaybackError, ledger: &RetryLedger) -> Decision {
        let rule = self.rule(error.class);

        match (rule.bound, rule.action) {
            (RetryBound::Never, _) | (RetryBound::AtMost(_), None) => {
                Decision::Escalate(self.escalation(error, ledger))
            }
            (RetryBound::Unbounded, None) => Decision::Ignore,
            (RetryBound::Unbounded, Some(action)) => Decision::Recover { action, attempt: 0 },
            (RetryBound::AtMost(max), Some(action)) => {
                let used = ledger.count(error.class);
                if used < max {
                    Decision::Recover {
                        action,
                        attempt: used + 1,
                    }
                } else {
                    Decision::Escalate(self.escalation(error, ledger))
                }
            }
        }
    }

    fn escalation(&self, error: &PlaybackError, ledger: &RetryLedger) -> FailureReason {
        match error.class {
            ErrorClass::Unknown => FailureReason::UnknownFatal {
                detail: error.raw.to_string(),
            },
            class => FailureReason::RetriesExhausted {
                class,
                attempts: ledger.count(class),
            },
        }
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::new(&RecoveryConfig::default())
    }
}
