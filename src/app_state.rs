use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::ResolvedConfig;
use crate::devnet::{self, BlockCounter};
use crate::oracle::{OracleError, WeatherObservation, WeatherOracle};
use crate::payout::{self, PayoutOutcome};
use crate::policy::{PolicyReceipt, PolicyRequest};
use crate::session::{Session, SessionError, Stage};

pub const DEMO_STATUS: &str = "Backend service initializing. Click below for demo.";

/// Result of the weather step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WeatherReport {
    Live {
        city: String,
        observation: WeatherObservation,
        threshold: f64,
        threshold_met: bool,
        outcome: PayoutOutcome,
    },
    /// Oracle unavailable; the caller should offer the manual trigger.
    Demo { city: String, status: String },
}

/// Restores the session if a step's future is dropped before it commits,
/// e.g. when the HTTP client disconnects mid-delay.
struct StepGuard<'a> {
    session: &'a Mutex<Session>,
    session_id: u64,
    in_flight: Stage,
    previous: Stage,
    previous_status: Option<String>,
    armed: bool,
}

impl<'a> StepGuard<'a> {
    /// Run `begin` under the held lock; arm the guard only if it succeeds.
    fn begin<T>(
        session: &'a Mutex<Session>,
        in_flight: Stage,
        begin: impl FnOnce(&mut Session) -> Result<T, SessionError>,
    ) -> Result<(T, Self), SessionError> {
        let mut s = session.lock();
        let (previous, previous_status) = (s.stage, s.status_message.clone());
        let started = begin(&mut *s)?;
        let guard = Self {
            session,
            session_id: s.id,
            in_flight,
            previous,
            previous_status,
            armed: true,
        };
        Ok((started, guard))
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut s = self.session.lock();
        if s.id != self.session_id {
            return;
        }
        if s.restore_stage(self.in_flight, self.previous, self.previous_status.take()) {
            tracing::warn!(
                stage = %self.in_flight,
                restored = %self.previous,
                "Step interrupted before commit, session restored"
            );
        }
    }
}

/// Shared state handed to every handler: config, oracle, block counter and the one session.
pub struct AppState {
    pub config: ResolvedConfig,
    pub oracle: WeatherOracle,
    pub blocks: Arc<BlockCounter>,
    session: Mutex<Session>,
    next_session_id: AtomicU64,
}

impl AppState {
    pub fn new(config: ResolvedConfig) -> Result<Self, OracleError> {
        let oracle = WeatherOracle::with_timeout(config.weather_url.clone(), config.http_timeout)?;
        let blocks = Arc::new(BlockCounter::new(
            config.start_block,
            config.block_advance_probability,
        ));
        let wallet = devnet::random_address(&mut rand::thread_rng());
        tracing::info!(wallet = %devnet::short_address(&wallet), "Demo wallet connected");

        Ok(Self {
            config,
            oracle,
            blocks,
            session: Mutex::new(Session::new(1, wallet)),
            next_session_id: AtomicU64::new(2),
        })
    }

    pub fn snapshot(&self) -> Session {
        self.session.lock().clone()
    }

    /// Drop the policy and connect a fresh wallet, like reloading the page.
    pub fn reset(&self) -> Session {
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let wallet = devnet::random_address(&mut rand::thread_rng());
        let fresh = Session::new(id, wallet);
        *self.session.lock() = fresh.clone();
        tracing::info!(session = id, "Session reset");
        fresh
    }

    /// Step 1: validate, fake the deployment latency, commit the policy.
    pub async fn setup_policy(&self, req: PolicyRequest) -> Result<PolicyReceipt, SessionError> {
        let policy = req.validate()?;
        let ((), mut guard) = StepGuard::begin(&self.session, Stage::Deploying, Session::begin_deploy)?;

        tracing::info!(
            city = %policy.city,
            threshold = policy.threshold,
            payout = policy.payout,
            "Deploying policy"
        );
        tokio::time::sleep(self.config.deploy_delay).await;

        let receipt = PolicyReceipt {
            setup_tx: devnet::random_tx_hash(&mut rand::thread_rng()),
            policy: policy.clone(),
            deployed_at: chrono::Utc::now(),
        };

        let mut s = self.session.lock();
        if s.id != guard.session_id {
            return Err(SessionError::Superseded);
        }
        s.commit_policy(policy);
        guard.disarm();
        tracing::info!(tx = %devnet::truncate(&receipt.setup_tx, 18), "Policy created");
        Ok(receipt)
    }

    /// Step 2: query the oracle and evaluate, or fall back to demo mode.
    pub async fn check_weather(&self) -> Result<WeatherReport, SessionError> {
        let (policy, mut guard) =
            StepGuard::begin(&self.session, Stage::CheckingWeather, Session::begin_weather_check)?;

        let observed = self.oracle.observe(&policy.city).await;
        match observed {
            Ok(observation) => {
                tokio::time::sleep(self.config.weather_delay).await;

                let mut s = self.session.lock();
                if s.id != guard.session_id {
                    return Err(SessionError::Superseded);
                }
                let outcome = payout::evaluate(
                    &mut rand::thread_rng(),
                    &policy,
                    observation.rainfall_mm,
                    &s.wallet,
                    self.blocks.current(),
                );
                tracing::info!(
                    rainfall_mm = observation.rainfall_mm,
                    threshold = policy.threshold,
                    triggered = outcome.is_triggered(),
                    "Policy evaluated"
                );
                s.commit_evaluation(observation.clone(), outcome.clone());
                guard.disarm();

                Ok(WeatherReport::Live {
                    city: policy.city,
                    threshold_met: outcome.is_triggered(),
                    threshold: policy.threshold,
                    observation,
                    outcome,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Weather oracle unavailable, switching to demo mode");
                tokio::time::sleep(self.config.fallback_delay).await;

                let mut s = self.session.lock();
                if s.id != guard.session_id {
                    return Err(SessionError::Superseded);
                }
                s.enter_demo_mode(DEMO_STATUS);
                guard.disarm();
                Ok(WeatherReport::Demo {
                    city: policy.city,
                    status: DEMO_STATUS.to_string(),
                })
            }
        }
    }

    /// Step 3 override: fabricate a breach and force the payout.
    pub async fn simulate_payout(&self) -> Result<PayoutOutcome, SessionError> {
        let ((policy, previous), mut guard) =
            StepGuard::begin(&self.session, Stage::Simulating, Session::begin_simulation)?;
        tracing::info!(from = %previous, "Simulating threshold breach");

        tokio::time::sleep(self.config.simulate_delay).await;

        let mut s = self.session.lock();
        if s.id != guard.session_id {
            return Err(SessionError::Superseded);
        }
        let outcome = payout::simulate(
            &mut rand::thread_rng(),
            &policy,
            &s.wallet,
            self.blocks.current(),
        );
        tracing::info!(rainfall_mm = outcome.rainfall_mm(), "Demo payout sent");
        s.commit_simulation(outcome.clone());
        guard.disarm();
        Ok(outcome)
    }
}
