//! Confidence scoring for (village, candidate) pairs.

use gramin_core::{Candidate, ScanMode, Village};

/// A match confidence in [0, 1].
pub type Confidence = f32;

/// Confidence for an explicit owning-village id match. Highest trust in
/// both modes: the content editor already asserted the association.
const EXACT_VILLAGE: Confidence = 1.0;

/// Confidence for a case-insensitive name containment match (fuzzy mode).
const NAME_CONTAINMENT: Confidence = 0.8;

/// Confidence when the district matches and the candidate's free-text
/// region mentions the village name (fuzzy mode).
const DISTRICT_WITH_REGION_MENTION: Confidence = 0.6;

/// Confidence when only the owning-district id matches (fuzzy mode).
const DISTRICT_ONLY: Confidence = 0.5;

/// Confidence for a district match in geo mode. Geo scoring degrades to
/// district equality when precise coordinates are absent; radius_meters is
/// accepted by the job but unused here (documented simplification).
const GEO_DISTRICT: Confidence = 0.6;

/// Score one candidate against the target village under the given mode.
///
/// Deterministic and side-effect-free. Returns 0.0 for candidates with no
/// detectable association; callers apply the persistence threshold.
pub fn score(mode: ScanMode, village: &Village, candidate: &Candidate) -> Confidence {
    // Exact structural match outranks everything, regardless of mode.
    if candidate.village_id == Some(village.id) {
        return EXACT_VILLAGE;
    }

    let district_matches = candidate.district_id == Some(village.district_id);

    match mode {
        ScanMode::Fuzzy => {
            if names_overlap(&village.name, &candidate.name) {
                return NAME_CONTAINMENT;
            }
            if district_matches {
                if region_mentions(candidate.region_text.as_deref(), &village.name) {
                    return DISTRICT_WITH_REGION_MENTION;
                }
                return DISTRICT_ONLY;
            }
            0.0
        }
        ScanMode::Geo => {
            if district_matches {
                GEO_DISTRICT
            } else {
                0.0
            }
        }
    }
}

/// Case-insensitive name overlap: the candidate name contains the village
/// name, or the village name contains the candidate's first whitespace
/// token. Empty names never match.
fn names_overlap(village_name: &str, candidate_name: &str) -> bool {
    let village = village_name.trim().to_lowercase();
    let candidate = candidate_name.trim().to_lowercase();
    if village.is_empty() || candidate.is_empty() {
        return false;
    }

    if candidate.contains(&village) {
        return true;
    }

    match candidate.split_whitespace().next() {
        Some(first_token) => village.contains(first_token),
        None => false,
    }
}

/// Whether the candidate's free-text destination/region field mentions the
/// village name, case-insensitively.
fn region_mentions(region_text: Option<&str>, village_name: &str) -> bool {
    let village = village_name.trim().to_lowercase();
    if village.is_empty() {
        return false;
    }
    match region_text {
        Some(text) => text.to_lowercase().contains(&village),
        None => false,
    }
}
