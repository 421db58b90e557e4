// Fantasy scoring: rules, per-entry scoring, optimal lineups, weekly ranks,
// and roster results.

pub mod engine;
pub mod lineup;
pub mod ranks;
pub mod results;
pub mod rules;

/// Round to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
