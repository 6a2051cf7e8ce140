//! # gramin-match
//!
//! Pure, deterministic candidate scoring for village auto-linking.
//!
//! Matching is heuristic and explainable — exact foreign-key equality and
//! case-insensitive name containment — not statistical. The scorer performs
//! no I/O and holds no state; each (village, candidate) pair is scored
//! independently of every other pair, so the four candidate-kind passes of a
//! scan are order-independent by construction.

mod score;

pub use score::{score, Confidence};
