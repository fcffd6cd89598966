//! Demo DevNet simulator
//!
//! Address-like and hash-like strings plus a block counter, for display only.
//! Nothing here is verified or signed.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Base58-style alphabet (no 0, O, I, l)
pub const ADDRESS_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
pub const ADDRESS_LEN: usize = 44;

/// Cosmetic network fee attached to every simulated payout.
pub const DEMO_FEE: f64 = 0.000021;

/// Generate a random wallet address.
pub fn random_address<R: Rng>(rng: &mut R) -> String {
    let chars = ADDRESS_ALPHABET.as_bytes();
    (0..ADDRESS_LEN)
        .map(|_| chars[rng.gen_range(0..chars.len())] as char)
        .collect()
}

/// Derive a stable address from `seed` (the policy city).
///
/// Character `i` is picked from the UTF-16 code unit at `i % len` shifted by `7 * i`,
/// so the same city always maps to the same wallet. An empty seed contributes zero.
pub fn derived_address(seed: &str) -> String {
    let chars = ADDRESS_ALPHABET.as_bytes();
    let units: Vec<u16> = seed.encode_utf16().collect();
    (0..ADDRESS_LEN)
        .map(|i| {
            let unit = if units.is_empty() {
                0
            } else {
                units[i % units.len()] as usize
            };
            chars[(unit + i * 7) % chars.len()] as char
        })
        .collect()
}

pub fn is_valid_address(addr: &str) -> bool {
    addr.len() == ADDRESS_LEN && addr.chars().all(|c| ADDRESS_ALPHABET.contains(c))
}

/// `0x` followed by 64 lowercase hex digits.
pub fn random_tx_hash<R: Rng>(rng: &mut R) -> String {
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

/// `✓ abcde…wxyz` badge shown for the connected wallet.
pub fn wallet_badge(addr: &str) -> String {
    format!("✓ {}", short_address(addr))
}

/// First five and last four characters joined by an ellipsis.
pub fn short_address(addr: &str) -> String {
    let chars: Vec<char> = addr.chars().collect();
    if chars.len() <= 9 {
        return addr.to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

/// Keep the first `n` characters and mark the cut.
pub fn truncate(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        return s.to_string();
    }
    let head: String = s.chars().take(n).collect();
    format!("{head}…")
}

/// `8412047` -> `8,412,047`
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// One decimal place with exact ties rounded away from zero (`0.25` -> `"0.3"`).
///
/// `{:.1}` rounds ties to even. An exact tie is only possible at odd quarters.
pub fn fixed_1(x: f64) -> String {
    let quarters = x * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 != 0.0 {
        return format!("{:.1}", (x * 10.0).round() / 10.0);
    }
    format!("{:.1}", x)
}

/// Monotonic block height for the status bar and payout receipts.
#[derive(Debug)]
pub struct BlockCounter {
    current: AtomicU64,
    advance_probability: f64,
}

impl BlockCounter {
    pub fn new(start: u64, advance_probability: f64) -> Self {
        Self {
            current: AtomicU64::new(start),
            advance_probability: advance_probability.clamp(0.0, 1.0),
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Advance by one with the configured probability. Returns the height after the tick.
    pub fn tick<R: Rng>(&self, rng: &mut R) -> u64 {
        if rng.gen_bool(self.advance_probability) {
            self.current.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.current()
        }
    }
}

/// Start the background block ticker.
pub fn start_block_ticker(blocks: Arc<BlockCounter>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_ms = every.as_millis() as u64, "Starting demo block ticker");

        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        // first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let height = blocks.tick(&mut rand::thread_rng());
            tracing::trace!(height, "block tick");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_address_uses_alphabet_only() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let addr = random_address(&mut rng);
            assert_eq!(addr.len(), ADDRESS_LEN);
            assert!(is_valid_address(&addr), "bad address {addr}");
        }
    }

    #[test]
    fn derived_address_is_stable_per_city() {
        let a = derived_address("Lagos");
        let b = derived_address("Lagos");
        let c = derived_address("Nairobi");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(is_valid_address(&a));
        assert!(is_valid_address(&derived_address("São Paulo")));
    }

    #[test]
    fn derived_address_first_char_follows_code_unit() {
        // 'A' = 65, 65 % 58 = 7 -> '8'
        assert!(derived_address("A").starts_with('8'));
    }

    #[test]
    fn tx_hash_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let h = random_tx_hash(&mut rng);
        assert_eq!(h.len(), 66);
        assert!(h.starts_with("0x"));
        assert!(h[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn formats_block_numbers() {
        assert_eq!(format_thousands(8_412_047), "8,412,047");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(0), "0");
    }

    #[test]
    fn short_forms() {
        let addr = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijk";
        assert_eq!(short_address(addr), "12345…hijk");
        assert_eq!(wallet_badge(addr), "✓ 12345…hijk");
        assert_eq!(truncate("0xabcdef", 4), "0xab…");
        assert_eq!(truncate("0xab", 4), "0xab");
    }

    #[test]
    fn counter_never_goes_backwards() {
        let mut rng = StdRng::seed_from_u64(42);
        let blocks = BlockCounter::new(100, 0.7);
        let mut last = blocks.current();
        for _ in 0..500 {
            let now = blocks.tick(&mut rng);
            assert!(now == last || now == last + 1);
            last = now;
        }
        assert!(last > 100);
    }

    #[test]
    fn counter_probability_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let frozen = BlockCounter::new(5, 0.0);
        let always = BlockCounter::new(5, 1.0);
        for _ in 0..10 {
            frozen.tick(&mut rng);
            always.tick(&mut rng);
        }
        assert_eq!(frozen.current(), 5);
        assert_eq!(always.current(), 15);
    }

    #[test]
    fn fixed_1_rounds_ties_up() {
        assert_eq!(fixed_1(0.25), "0.3");
        assert_eq!(fixed_1(1.25), "1.3");
        assert_eq!(fixed_1(-1.25), "-1.3");
        assert_eq!(fixed_1(0.75), "0.8");
        assert_eq!(fixed_1(7.2), "7.2");
        assert_eq!(fixed_1(5.0), "5.0");
        // not an exact tie in binary
        assert_eq!(fixed_1(0.15), "0.1");
        assert_eq!(fixed_1(2.04), "2.0");
    }
}
