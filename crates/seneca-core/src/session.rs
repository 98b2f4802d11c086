//! Analysis session state
//!
//! The lifecycle is a small state machine:
//!
//! ```text
//! Stopped ──start──▶ Running ──pause──▶ Paused
//!    ▲                 │  ▲               │
//!    └──────stop───────┘  └─────start─────┤
//!    ▲                                    │
//!    └────────────────stop────────────────┘
//! ```
//!
//! [`AnalysisSession`] carries everything a run needs between ticks. It is
//! moved into the loop task and handed back when the loop ends, so pausing
//! keeps the rendered state and a fresh start replaces it.

use crate::error::AnalysisError;
use seneca_patch::Patch;
use seneca_reconcile::DisplayState;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Lifecycle state of the analysis loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No loop task; display state is kept until the next fresh start
    Stopped,
    /// Loop task ticking
    Running,
    /// Loop task ended; display state kept for a restart
    Paused,
}

impl SessionState {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: SessionState) -> Vec<SessionState> {
    use SessionState::*;
    match from {
        Stopped => vec![Running],
        Running => vec![Paused, Stopped],
        Paused => vec![Running, Stopped],
    }
}

/// Validate a lifecycle transition
///
/// # Errors
/// Returns [`AnalysisError::IllegalTransition`] when `to` is not reachable
/// from `from`
pub fn validate_transition(from: SessionState, to: SessionState) -> Result<(), AnalysisError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(AnalysisError::IllegalTransition { from, to })
    }
}

/// Sleep and warning decision for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickTiming {
    /// Remaining time until the next tick, if any
    pub sleep: Option<Duration>,
    /// One-shot overrun warning
    pub warning: Option<Patch>,
}

/// State carried across ticks of one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    display: DisplayState,
    period: Duration,
    overrun_warned: bool,
    ticks: u64,
}

impl AnalysisSession {
    /// New session with empty display state
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            display: DisplayState::new(),
            period,
            overrun_warned: false,
            ticks: 0,
        }
    }

    /// Rendered elements
    #[inline]
    #[must_use]
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Rendered elements, mutably
    #[inline]
    pub fn display_mut(&mut self) -> &mut DisplayState {
        &mut self.display
    }

    /// Tick period
    #[inline]
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Change the tick period for subsequent ticks
    #[inline]
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Ticks run since the session was created
    #[inline]
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Whether this run already reported an overrun
    #[inline]
    #[must_use]
    pub fn overrun_warned(&self) -> bool {
        self.overrun_warned
    }

    /// Start a new run with the same display state
    ///
    /// The overrun warning is one-shot per run, so it is re-armed here.
    pub fn begin_run(&mut self) {
        self.overrun_warned = false;
    }

    /// Record a finished tick that took `elapsed`
    pub fn account_tick(&mut self, elapsed: Duration) -> TickTiming {
        self.ticks += 1;
        if elapsed < self.period {
            return TickTiming {
                sleep: Some(self.period - elapsed),
                warning: None,
            };
        }

        let warning = if self.overrun_warned {
            None
        } else {
            self.overrun_warned = true;
            let over = (elapsed - self.period).as_secs_f64();
            Some(Patch::status(&format!(
                "Warning: Period is shorter than execution time by {} seconds",
                format_significant(over)
            )))
        };
        TickTiming {
            sleep: None,
            warning,
        }
    }
}

/// Format with three significant digits, trailing zeros dropped
///
/// `0.0899` stays `0.0899`, `1.23456` becomes `1.23`, `1234.5` becomes
/// `1.23e+03`.
#[must_use]
pub fn format_significant(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }

    #[allow(clippy::cast_possible_truncation)]
    let exponent = value.abs().log10().floor() as i32;
    if (-4..3).contains(&exponent) {
        #[allow(clippy::cast_sign_loss)]
        let decimals = (2 - exponent).max(0) as usize;
        return strip_zeros(format!("{value:.decimals$}"));
    }

    let mut mantissa = value / 10f64.powi(exponent);
    let mut exponent = exponent;
    if format!("{mantissa:.2}").trim_start_matches('-').starts_with("10") {
        mantissa /= 10.0;
        exponent += 1;
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    format!(
        "{}e{sign}{:02}",
        strip_zeros(format!("{mantissa:.2}")),
        exponent.abs()
    )
}

fn strip_zeros(text: String) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn transition_table() {
        assert!(validate_transition(Stopped, Running).is_ok());
        assert!(validate_transition(Running, Paused).is_ok());
        assert!(validate_transition(Paused, Running).is_ok());
        assert!(validate_transition(Paused, Stopped).is_ok());
        assert!(validate_transition(Running, Stopped).is_ok());

        assert!(validate_transition(Running, Running).is_err());
        assert!(validate_transition(Stopped, Paused).is_err());
        assert!(validate_transition(Stopped, Stopped).is_err());
        assert!(validate_transition(Paused, Paused).is_err());
    }

    #[test]
    fn no_state_transitions_to_itself() {
        for state in [Stopped, Running, Paused] {
            assert!(!allowed_transitions(state).contains(&state), "{state}");
        }
    }

    #[test]
    fn fast_tick_sleeps_remaining_period() {
        let mut session = AnalysisSession::new(Duration::from_millis(100));
        let timing = session.account_tick(Duration::from_millis(30));
        assert_eq!(timing.sleep, Some(Duration::from_millis(70)));
        assert_eq!(timing.warning, None);
        assert_eq!(session.ticks(), 1);
    }

    #[test]
    fn overrun_warns_once_per_run() {
        let mut session = AnalysisSession::new(Duration::from_millis(10));
        let warnings: Vec<_> = (0..5)
            .filter_map(|_| session.account_tick(Duration::from_millis(100)).warning)
            .collect();
        assert_eq!(
            warnings,
            vec![Patch::status(
                "Warning: Period is shorter than execution time by 0.09 seconds"
            )]
        );

        session.begin_run();
        assert!(session.account_tick(Duration::from_millis(100)).warning.is_some());
    }

    #[test]
    fn overrun_does_not_sleep() {
        let mut session = AnalysisSession::new(Duration::from_millis(10));
        assert_eq!(session.account_tick(Duration::from_millis(10)).sleep, None);
    }

    #[test]
    fn significant_digits() {
        assert_eq!(format_significant(0.09), "0.09");
        assert_eq!(format_significant(0.0899), "0.0899");
        assert_eq!(format_significant(1.23456), "1.23");
        assert_eq!(format_significant(12.0), "12");
        assert_eq!(format_significant(123.456), "123");
        assert_eq!(format_significant(1234.5), "1.23e+03");
        assert_eq!(format_significant(0.000_012_34), "1.23e-05");
        assert_eq!(format_significant(0.0), "0");
    }
}
