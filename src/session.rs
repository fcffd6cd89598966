//! Session state for the three-step demo: policy, weather check, payout.
//!
//! Every transition goes through [`Session`]; callers flip into an in-flight
//! stage before any delay and commit afterwards, so a repeated click sees the
//! step as busy instead of running it twice.

use serde::Serialize;
use thiserror::Error;

use crate::oracle::WeatherObservation;
use crate::payout::PayoutOutcome;
use crate::policy::{Policy, PolicyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AwaitingPolicy,
    Deploying,
    AwaitingWeather,
    CheckingWeather,
    /// Weather came back and the payout stage shows a real outcome.
    Evaluated,
    /// Weather service unavailable; only the manual trigger is offered.
    DemoMode,
    Simulating,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AwaitingPolicy => "awaiting_policy",
            Stage::Deploying => "deploying",
            Stage::AwaitingWeather => "awaiting_weather",
            Stage::CheckingWeather => "checking_weather",
            Stage::Evaluated => "evaluated",
            Stage::DemoMode => "demo_mode",
            Stage::Simulating => "simulating",
        }
    }

    pub fn weather_unlocked(&self) -> bool {
        !matches!(self, Stage::AwaitingPolicy | Stage::Deploying)
    }

    pub fn payout_unlocked(&self) -> bool {
        matches!(self, Stage::Evaluated | Stage::DemoMode | Stage::Simulating)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("a policy is already deployed for this session (stage: {0})")]
    PolicyAlreadyDeployed(Stage),
    #[error("create a policy first")]
    NoPolicy,
    #[error("weather check is not available in stage {0}")]
    WeatherLocked(Stage),
    #[error("payout simulation is not available in stage {0}")]
    PayoutLocked(Stage),
    #[error("session was reset while the step was running")]
    Superseded,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Policy(e) => e.code(),
            SessionError::PolicyAlreadyDeployed(_) => "policy_exists",
            SessionError::NoPolicy => "no_policy",
            SessionError::WeatherLocked(_) => "weather_locked",
            SessionError::PayoutLocked(_) => "payout_locked",
            SessionError::Superseded => "session_reset",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: u64,
    /// Wallet "connected" when the session starts
    pub wallet: String,
    pub policy: Option<Policy>,
    pub stage: Stage,
    pub observation: Option<WeatherObservation>,
    pub outcome: Option<PayoutOutcome>,
    pub status_message: Option<String>,
}

impl Session {
    pub fn new(id: u64, wallet: String) -> Self {
        Self {
            id,
            wallet,
            policy: None,
            stage: Stage::AwaitingPolicy,
            observation: None,
            outcome: None,
            status_message: None,
        }
    }

    pub fn begin_deploy(&mut self) -> Result<(), SessionError> {
        if self.stage != Stage::AwaitingPolicy {
            return Err(SessionError::PolicyAlreadyDeployed(self.stage));
        }
        self.stage = Stage::Deploying;
        Ok(())
    }

    pub fn commit_policy(&mut self, policy: Policy) {
        self.policy = Some(policy);
        self.stage = Stage::AwaitingWeather;
    }

    /// Enter the weather check and hand back the policy to query for.
    pub fn begin_weather_check(&mut self) -> Result<Policy, SessionError> {
        let policy = self.policy.clone().ok_or(SessionError::NoPolicy)?;
        if self.stage != Stage::AwaitingWeather {
            return Err(SessionError::WeatherLocked(self.stage));
        }
        self.stage = Stage::CheckingWeather;
        Ok(policy)
    }

    pub fn commit_evaluation(&mut self, observation: WeatherObservation, outcome: PayoutOutcome) {
        self.observation = Some(observation);
        self.outcome = Some(outcome);
        self.status_message = None;
        self.stage = Stage::Evaluated;
    }

    pub fn enter_demo_mode(&mut self, status: impl Into<String>) {
        self.observation = None;
        self.outcome = None;
        self.status_message = Some(status.into());
        self.stage = Stage::DemoMode;
    }

    /// Manual override is offered once the weather step has finished.
    pub fn begin_simulation(&mut self) -> Result<(Policy, Stage), SessionError> {
        let policy = self.policy.clone().ok_or(SessionError::NoPolicy)?;
        match self.stage {
            Stage::DemoMode | Stage::Evaluated => {
                let previous = self.stage;
                self.stage = Stage::Simulating;
                self.status_message = Some("Simulating threshold breach...".to_string());
                Ok((policy, previous))
            }
            other => Err(SessionError::PayoutLocked(other)),
        }
    }

    pub fn commit_simulation(&mut self, outcome: PayoutOutcome) {
        self.outcome = Some(outcome);
        self.status_message = None;
        self.stage = Stage::Evaluated;
    }

    /// Undo an interrupted step. Only applies while the session is still in `in_flight`.
    pub fn restore_stage(&mut self, in_flight: Stage, previous: Stage, status: Option<String>) -> bool {
        if self.stage != in_flight {
            return false;
        }
        self.stage = previous;
        self.status_message = status;
        true
    }
}
