//! Memory regimes and the cross-region compatibility matrix.
//!
//! Every region carries a [`Regime`] describing its access discipline. A
//! periscope contract crossing two regions is admissible only if the pair
//! is compatible under the requested [`PeriscopeDirection`].

use serde::{Deserialize, Serialize};

use braggi_error::{BraggiError, Result};

/// Access discipline of a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// First-in first-out: allocations are released oldest-first.
    Fifo,
    /// First-in last-out: allocations are released newest-first.
    Filo,
    /// Sequential: single-pass access in allocation order.
    Seq,
    /// Random: no ordering guarantee, compatible with everything.
    Rand,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fifo => "fifo",
            Self::Filo => "filo",
            Self::Seq => "seq",
            Self::Rand => "rand",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Regime {
    type Err = BraggiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fifo" => Ok(Self::Fifo),
            "filo" => Ok(Self::Filo),
            "seq" => Ok(Self::Seq),
            "rand" => Ok(Self::Rand),
            other => Err(BraggiError::OutOfRange {
                what: "regime".to_owned(),
                value: other.to_owned(),
            }),
        }
    }
}

/// Direction of a periscope reference relative to the source region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriscopeDirection {
    /// The target region's data flows into the source region.
    In,
    /// The source region's data flows out to the target region.
    Out,
}

impl std::fmt::Display for PeriscopeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::In => "in",
            Self::Out => "out",
        })
    }
}

/// Whether a cross-region reference from `source` to `target` is legal
/// under `direction`.
///
/// The matrix, in order of precedence:
/// - equal regimes are compatible;
/// - RAND on either side is compatible;
/// - SEQ is compatible only with SEQ or RAND;
/// - FIFO→FILO is compatible only when the direction is OUT;
/// - FILO→FIFO is compatible only when the direction is IN;
/// - everything else is incompatible.
pub fn regime_compatible(
    source: Regime,
    target: Regime,
    direction: PeriscopeDirection,
) -> bool {
    if source == target {
        return true;
    }
    if source == Regime::Rand || target == Regime::Rand {
        return true;
    }
    if source == Regime::Seq || target == Regime::Seq {
        return false;
    }
    match (source, target) {
        (Regime::Fifo, Regime::Filo) => direction == PeriscopeDirection::Out,
        (Regime::Filo, Regime::Fifo) => direction == PeriscopeDirection::In,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGIMES: [Regime; 4] = [Regime::Fifo, Regime::Filo, Regime::Seq, Regime::Rand];
    const DIRECTIONS: [PeriscopeDirection; 2] = [PeriscopeDirection::In, PeriscopeDirection::Out];

    #[test]
    fn equal_regimes_compatible() {
        for regime in REGIMES {
            for dir in DIRECTIONS {
                assert!(regime_compatible(regime, regime, dir), "{regime} {dir}");
            }
        }
    }

    #[test]
    fn rand_compatible_with_everything() {
        for regime in REGIMES {
            for dir in DIRECTIONS {
                assert!(regime_compatible(Regime::Rand, regime, dir));
                assert!(regime_compatible(regime, Regime::Rand, dir));
            }
        }
    }

    #[test]
    fn seq_only_with_seq_or_rand() {
        for dir in DIRECTIONS {
            assert!(!regime_compatible(Regime::Seq, Regime::Fifo, dir));
            assert!(!regime_compatible(Regime::Seq, Regime::Filo, dir));
            assert!(!regime_compatible(Regime::Fifo, Regime::Seq, dir));
            assert!(!regime_compatible(Regime::Filo, Regime::Seq, dir));
            assert!(regime_compatible(Regime::Seq, Regime::Seq, dir));
            assert!(regime_compatible(Regime::Seq, Regime::Rand, dir));
        }
    }

    #[test]
    fn fifo_filo_depends_on_direction() {
        assert!(regime_compatible(
            Regime::Fifo,
            Regime::Filo,
            PeriscopeDirection::Out
        ));
        assert!(!regime_compatible(
            Regime::Fifo,
            Regime::Filo,
            PeriscopeDirection::In
        ));
        assert!(regime_compatible(
            Regime::Filo,
            Regime::Fifo,
            PeriscopeDirection::In
        ));
        assert!(!regime_compatible(
            Regime::Filo,
            Regime::Fifo,
            PeriscopeDirection::Out
        ));
    }

    /// Symmetry under source/target swap holds exactly for the equal-regime
    /// and RAND cases; the FIFO/FILO pairs are asymmetric per direction.
    #[test]
    fn symmetry_matches_matrix() {
        for source in REGIMES {
            for target in REGIMES {
                for dir in DIRECTIONS {
                    let forward = regime_compatible(source, target, dir);
                    let swapped = regime_compatible(target, source, dir);
                    let always_symmetric = source == target
                        || source == Regime::Rand
                        || target == Regime::Rand
                        || source == Regime::Seq
                        || target == Regime::Seq;
                    if always_symmetric {
                        assert_eq!(forward, swapped, "{source}->{target} {dir}");
                    } else {
                        // The remaining pairs are FIFO/FILO, asymmetric by design.
                        assert_ne!(forward, swapped, "{source}->{target} {dir}");
                    }
                }
            }
        }
    }

    #[test]
    fn parse_round_trips() {
        for regime in REGIMES {
            let parsed: Regime = regime.to_string().parse().unwrap();
            assert_eq!(parsed, regime);
        }
        assert!("stack".parse::<Regime>().is_err());
    }
}
