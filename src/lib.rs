// ---- Clippy/lints: keep signals high, noise low ----
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Library crate entry so the binary and the integration tests share one workflow
pub mod api;
pub mod app_state;
pub mod config;
pub mod devnet;
pub mod oracle;
pub mod payout;
pub mod policy;
pub mod session;

/// Display name of the demo token paid out by policies.
pub const TOKEN_SYMBOL: &str = "DEMO RALO";
