//! Derivation engine - distributes normalized observations into the sector
//! hierarchy, derives primary energy by subtraction, resolves the residual
//! "other" piece, and attributes the population-wide electric-sector CO2
//! proportionally across sectors.
//!
//! Every call starts from a zeroed breakdown, so nothing leaks between
//! scopes or years and an expected identifier with no observation simply
//! stays at zero.

use std::collections::HashMap;

use serde::Serialize;

use crate::catalog::{Catalog, FuelKind, Sector};
use crate::ingest::{Co2Observation, EnergyObservation};
use crate::validate::{ValidationError, CO2_TOLERANCE_MMT};

/// A named component of primary energy with its derived values.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FuelPiece {
    pub energy_gwh: f64,
    pub co2_mmt: f64,
}

/// Energy/CO2 pair for one of the electric/primary/total subsectors.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SubsectorValues {
    pub energy_gwh: f64,
    pub co2_mmt: f64,
}

/// One sector's full hierarchy: the three subsectors plus the ordered fuel
/// pieces of primary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SectorBreakdown {
    pub electric: SubsectorValues,
    pub primary: SubsectorValues,
    pub total: SubsectorValues,
    pieces: [FuelPiece; 8],
}

impl SectorBreakdown {
    pub fn piece(&self, fuel: FuelKind) -> &FuelPiece {
        &self.pieces[fuel.index()]
    }

    pub(crate) fn piece_mut(&mut self, fuel: FuelKind) -> &mut FuelPiece {
        &mut self.pieces[fuel.index()]
    }

    /// Fuel pieces in presentation order, `Other` last.
    pub fn pieces(&self) -> impl Iterator<Item = (FuelKind, &FuelPiece)> {
        FuelKind::ALL.iter().map(move |f| (*f, self.piece(*f)))
    }
}

/// All four sectors for one derived scope.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScopeBreakdown {
    sectors: [SectorBreakdown; 4],
}

impl ScopeBreakdown {
    pub fn sector(&self, sector: Sector) -> &SectorBreakdown {
        &self.sectors[sector.index()]
    }

    pub(crate) fn sector_mut(&mut self, sector: Sector) -> &mut SectorBreakdown {
        &mut self.sectors[sector.index()]
    }

    pub fn sectors(&self) -> impl Iterator<Item = (Sector, &SectorBreakdown)> {
        Sector::ALL.iter().map(move |s| (*s, self.sector(*s)))
    }
}

/// Derive the full hierarchy for one scope from its normalized
/// observations.
///
/// Observations carrying identifiers the catalog does not bind are ignored
/// (forward-compatible with extra data in the response); identifiers with
/// no observation stay zero.
///
/// Fails only on the unattributable-emissions edge: a materially nonzero
/// population-wide electric CO2 figure with zero electric energy across all
/// sectors to split it over.
pub fn derive_breakdown(
    catalog: &Catalog,
    energy: &[EnergyObservation],
    co2: &[Co2Observation],
) -> Result<ScopeBreakdown, ValidationError> {
    let mut out = ScopeBreakdown::default();

    // Raw-identifier slot values, keyed by series id. Slot ids are unique
    // across the catalog, so one flat map covers all sectors.
    let mut slot_values: HashMap<&'static str, f64> = HashMap::new();
    for sector in Sector::ALL {
        let series = catalog.series(sector);
        for fuel in FuelKind::ALL {
            for id in series.piece_slots(fuel).ids() {
                slot_values.insert(id, 0.0);
            }
        }
    }

    // Energy distribution: subsector series first, then piece slots.
    for obs in energy {
        let mut matched = false;
        for sector in Sector::ALL {
            let series = catalog.series(sector);
            if obs.series_id == series.electric {
                out.sector_mut(sector).electric.energy_gwh = obs.gwh;
                matched = true;
            } else if obs.series_id == series.total {
                out.sector_mut(sector).total.energy_gwh = obs.gwh;
                matched = true;
            }
        }
        if !matched {
            if let Some(slot) = slot_values.get_mut(obs.series_id.as_str()) {
                *slot = obs.gwh;
            }
            // anything else is extra data; ignore
        }
    }

    // CO2 distribution. The (electric-generation, all-fuels) row is the one
    // population-wide figure and is held back for the proportional split.
    let mut electric_wide_co2 = 0.0;
    for obs in co2 {
        if obs.sector_key == catalog.co2_electric_sector
            && obs.fuel_key == catalog.co2_all_fuels
        {
            electric_wide_co2 = obs.mmt;
            continue;
        }

        for sector in Sector::ALL {
            if obs.sector_key != catalog.series(sector).co2_sector {
                continue;
            }
            let sb = out.sector_mut(sector);
            if obs.fuel_key == catalog.co2_all_fuels {
                sb.primary.co2_mmt = obs.mmt;
            } else if obs.fuel_key == catalog.co2_coal {
                sb.piece_mut(FuelKind::Coal).co2_mmt = obs.mmt;
            } else if obs.fuel_key == catalog.co2_natural_gas {
                sb.piece_mut(FuelKind::NaturalGas).co2_mmt = obs.mmt;
            } else if obs.fuel_key == catalog.co2_petroleum {
                sb.piece_mut(FuelKind::Petroleum).co2_mmt = obs.mmt;
            }
            break;
        }
    }

    // Per-sector derivation: primary by subtraction, pieces from their
    // slots, residual last once every named piece is resolved.
    for sector in Sector::ALL {
        let series = catalog.series(sector);
        let sb = out.sector_mut(sector);

        sb.primary.energy_gwh = sb.total.energy_gwh - sb.electric.energy_gwh;

        let mut residual_energy = sb.primary.energy_gwh;
        let mut tracked_co2 = 0.0;
        for fuel in FuelKind::ALL {
            if fuel == FuelKind::Other {
                continue;
            }
            let slots = series.piece_slots(fuel);
            let mut piece_energy = 0.0;
            for id in &slots.add {
                piece_energy += slot_values[id];
            }
            for id in &slots.subtract {
                piece_energy -= slot_values[id];
            }
            sb.piece_mut(fuel).energy_gwh = piece_energy;
            residual_energy -= piece_energy;
            tracked_co2 += sb.piece(fuel).co2_mmt;
        }
        sb.piece_mut(FuelKind::Other).energy_gwh = residual_energy;
        // Renewable pieces carry no combustion CO2; the residual closes the
        // piece sum against the sector-level primary value.
        sb.piece_mut(FuelKind::Other).co2_mmt = sb.primary.co2_mmt - tracked_co2;
    }

    // Proportional electric CO2 split over the just-derived energy shares.
    let electric_energy_sum: f64 = Sector::ALL
        .iter()
        .map(|s| out.sector(*s).electric.energy_gwh)
        .sum();

    if electric_energy_sum == 0.0 {
        if electric_wide_co2.abs() > CO2_TOLERANCE_MMT {
            return Err(ValidationError::UnattributableElectricCo2 {
                co2_mmt: electric_wide_co2,
            });
        }
        // nothing to apportion; every sector's electric CO2 stays zero
    } else {
        for sector in Sector::ALL {
            let sb = out.sector_mut(sector);
            let share = sb.electric.energy_gwh / electric_energy_sum;
            sb.electric.co2_mmt = electric_wide_co2 * share;
        }
    }

    for sector in Sector::ALL {
        let sb = out.sector_mut(sector);
        sb.total.co2_mmt = sb.electric.co2_mmt + sb.primary.co2_mmt;
    }

    Ok(out)
}
