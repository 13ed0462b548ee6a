//! Consistency validation - tolerance-bounded cross-checks over a derived
//! breakdown. Most of the checked quantities are themselves derived by
//! subtraction, so these are guards against catalog/methodology drift
//! rather than arithmetic: a violation means the identifier bindings no
//! longer describe the source, and the snapshot must not be committed.

use crate::aggregate::ScopeBreakdown;
use crate::catalog::{FuelKind, Sector};

/// Absolute slack allowed on energy sums, GWh. Absorbs source rounding and
/// the Btu conversion.
pub const ENERGY_TOLERANCE_GWH: f64 = 100.0;
/// Absolute slack allowed on CO2 sums, million metric tons.
pub const CO2_TOLERANCE_MMT: f64 = 0.01;

/// A hierarchical-sum invariant violated beyond tolerance. Fatal: names the
/// offending sector and quantity, and the in-progress snapshot is dropped.
#[derive(Debug)]
pub enum ValidationError {
    EnergySumMismatch {
        sector: Sector,
        electric: f64,
        primary: f64,
        total: f64,
    },
    Co2SumMismatch {
        sector: Sector,
        electric: f64,
        primary: f64,
        total: f64,
    },
    PieceEnergyMismatch {
        sector: Sector,
        piece_sum: f64,
        primary: f64,
    },
    PieceCo2Mismatch {
        sector: Sector,
        piece_sum: f64,
        primary: f64,
    },
    /// The residual piece went materially negative: the named pieces exceed
    /// primary, which happens when the wrong total series is bound (a net
    /// series instead of end-use) or a piece id is misassigned.
    NegativeResidual { sector: Sector, energy_gwh: f64 },
    /// A nonzero population-wide electric CO2 figure arrived with zero
    /// electric-sector energy to apportion it over.
    UnattributableElectricCo2 { co2_mmt: f64 },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EnergySumMismatch {
                sector,
                electric,
                primary,
                total,
            } => write!(
                f,
                "electric + primary energy does not sum to total in {}: {:.2} + {:.2} != {:.2} GWh",
                sector, electric, primary, total
            ),
            ValidationError::Co2SumMismatch {
                sector,
                electric,
                primary,
                total,
            } => write!(
                f,
                "electric + primary CO2 does not sum to total in {}: {:.4} + {:.4} != {:.4} MMT",
                sector, electric, primary, total
            ),
            ValidationError::PieceEnergyMismatch {
                sector,
                piece_sum,
                primary,
            } => write!(
                f,
                "fuel piece energies do not sum to primary in {}: {:.2} != {:.2} GWh",
                sector, piece_sum, primary
            ),
            ValidationError::PieceCo2Mismatch {
                sector,
                piece_sum,
                primary,
            } => write!(
                f,
                "fuel piece CO2 does not sum to primary in {}: {:.4} != {:.4} MMT",
                sector, piece_sum, primary
            ),
            ValidationError::NegativeResidual { sector, energy_gwh } => write!(
                f,
                "residual 'other' piece is negative in {}: {:.2} GWh",
                sector, energy_gwh
            ),
            ValidationError::UnattributableElectricCo2 { co2_mmt } => write!(
                f,
                "electric-sector CO2 of {:.4} MMT cannot be attributed: aggregate electric energy is zero",
                co2_mmt
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check every sector of a derived breakdown against the hierarchy
/// invariants. Returns the first violation found.
pub fn validate(breakdown: &ScopeBreakdown) -> Result<(), ValidationError> {
    for sector in Sector::ALL {
        let sb = breakdown.sector(sector);

        let energy_gap =
            sb.electric.energy_gwh + sb.primary.energy_gwh - sb.total.energy_gwh;
        if energy_gap.abs() > ENERGY_TOLERANCE_GWH {
            return Err(ValidationError::EnergySumMismatch {
                sector,
                electric: sb.electric.energy_gwh,
                primary: sb.primary.energy_gwh,
                total: sb.total.energy_gwh,
            });
        }

        let co2_gap = sb.electric.co2_mmt + sb.primary.co2_mmt - sb.total.co2_mmt;
        if co2_gap.abs() > CO2_TOLERANCE_MMT {
            return Err(ValidationError::Co2SumMismatch {
                sector,
                electric: sb.electric.co2_mmt,
                primary: sb.primary.co2_mmt,
                total: sb.total.co2_mmt,
            });
        }

        if sb.piece(FuelKind::Other).energy_gwh < -ENERGY_TOLERANCE_GWH {
            return Err(ValidationError::NegativeResidual {
                sector,
                energy_gwh: sb.piece(FuelKind::Other).energy_gwh,
            });
        }

        let mut piece_energy_sum = 0.0;
        let mut piece_co2_sum = 0.0;
        for (_, piece) in sb.pieces() {
            piece_energy_sum += piece.energy_gwh;
            piece_co2_sum += piece.co2_mmt;
        }
        if (piece_energy_sum - sb.primary.energy_gwh).abs() > ENERGY_TOLERANCE_GWH {
            return Err(ValidationError::PieceEnergyMismatch {
                sector,
                piece_sum: piece_energy_sum,
                primary: sb.primary.energy_gwh,
            });
        }
        if (piece_co2_sum - sb.primary.co2_mmt).abs() > CO2_TOLERANCE_MMT {
            return Err(ValidationError::PieceCo2Mismatch {
                sector,
                piece_sum: piece_co2_sum,
                primary: sb.primary.co2_mmt,
            });
        }
    }

    Ok(())
}
