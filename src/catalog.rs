//! Static series catalog - identifier bindings between the sector/fuel
//! hierarchy and the EIA SEDS energy series and CO2 emission aggregates.
//!
//! The upstream data indexes everything by free-form string keys. Here the
//! sectors and fuel pieces are closed enums, so a mistyped key is a compile
//! error instead of a silently-zero slice of the breakdown.

use serde::Serialize;

/// End-use sectors tracked by the breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Sector {
    Residential,
    Commercial,
    Industrial,
    Transportation,
}

impl Sector {
    pub const ALL: [Sector; 4] = [
        Sector::Residential,
        Sector::Commercial,
        Sector::Industrial,
        Sector::Transportation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Sector::Residential => "residential",
            Sector::Commercial => "commercial",
            Sector::Industrial => "industrial",
            Sector::Transportation => "transportation",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Named subdivisions of a sector's primary energy, in presentation order.
///
/// `Other` is the derived residual: it carries no series ids of its own and
/// absorbs whatever primary energy the named pieces do not account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FuelKind {
    Wind,
    Solar,
    Geothermal,
    Hydroelectric,
    Coal,
    NaturalGas,
    Petroleum,
    Other,
}

impl FuelKind {
    pub const ALL: [FuelKind; 8] = [
        FuelKind::Wind,
        FuelKind::Solar,
        FuelKind::Geothermal,
        FuelKind::Hydroelectric,
        FuelKind::Coal,
        FuelKind::NaturalGas,
        FuelKind::Petroleum,
        FuelKind::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FuelKind::Wind => "wind",
            FuelKind::Solar => "solar",
            FuelKind::Geothermal => "geothermal",
            FuelKind::Hydroelectric => "hydroelectric",
            FuelKind::Coal => "coal",
            FuelKind::NaturalGas => "natural gas",
            FuelKind::Petroleum => "petroleum",
            FuelKind::Other => "other",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for FuelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw-identifier slots contributing to one fuel piece. Added slot values
/// sum into the piece, subtracted slots come back out (natural gas drops
/// supplemental gaseous fuels per the SEDS glossary definition of primary).
#[derive(Debug, Clone, Default)]
pub struct PieceSlots {
    pub add: Vec<&'static str>,
    pub subtract: Vec<&'static str>,
}

impl PieceSlots {
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.add.iter().chain(self.subtract.iter()).copied()
    }
}

/// Per-sector identifier bindings. A `None` fuel id means that piece is
/// definitionally zero for the sector (e.g. residential wind).
#[derive(Debug, Clone)]
pub struct SectorSeries {
    /// Electricity consumed from the electric sector, post-loss.
    pub electric: &'static str,
    /// End-use total consumption. Must be the end-use series, not a "net"
    /// series: net totals already subtract electric-sector sales, so using
    /// them would double-apply the subtraction and overflow primary.
    pub total: &'static str,
    pub wind: Option<&'static str>,
    pub solar: Option<&'static str>,
    pub geothermal: Option<&'static str>,
    pub hydroelectric: Option<&'static str>,
    pub coal: Option<&'static str>,
    pub natural_gas: Option<&'static str>,
    /// Supplemental gaseous fuels, subtracted from the natural gas piece.
    pub supplemental_gas: Option<&'static str>,
    pub petroleum: Option<&'static str>,
    /// Sector key in the CO2 aggregates dataset.
    pub co2_sector: &'static str,
}

impl SectorSeries {
    /// Slot ids feeding one fuel piece. `Other` has no slots of its own.
    pub fn piece_slots(&self, fuel: FuelKind) -> PieceSlots {
        let single = |id: Option<&'static str>| PieceSlots {
            add: id.into_iter().collect(),
            subtract: Vec::new(),
        };

        match fuel {
            FuelKind::Wind => single(self.wind),
            FuelKind::Solar => single(self.solar),
            FuelKind::Geothermal => single(self.geothermal),
            FuelKind::Hydroelectric => single(self.hydroelectric),
            FuelKind::Coal => single(self.coal),
            FuelKind::NaturalGas => PieceSlots {
                add: self.natural_gas.into_iter().collect(),
                subtract: self.supplemental_gas.into_iter().collect(),
            },
            FuelKind::Petroleum => single(self.petroleum),
            FuelKind::Other => PieceSlots::default(),
        }
    }
}

/// Immutable identifier bindings for the whole pipeline. Constructed once
/// at startup and shared by reference; read access only.
#[derive(Debug, Clone)]
pub struct Catalog {
    sectors: [SectorSeries; 4],
    /// CO2 fuel key covering all fuels combined.
    pub co2_all_fuels: &'static str,
    /// CO2 sector key for electric power generation. Its emissions arrive
    /// as one population-wide figure and are attributed proportionally.
    pub co2_electric_sector: &'static str,
    pub co2_coal: &'static str,
    pub co2_natural_gas: &'static str,
    pub co2_petroleum: &'static str,
}

impl Catalog {
    /// Bindings for the EIA SEDS + CO2-aggregates datasets.
    ///
    /// Two quirks inherited from the published series: industrial
    /// electricity is `ESISB` ("excluding refinery use" - `ESICB` does not
    /// add up against the end-use total), and transportation natural gas is
    /// `NGASB` with no supplemental-fuel id to subtract.
    pub fn us_seds() -> Self {
        Catalog {
            sectors: [
                SectorSeries {
                    electric: "ESRCB",
                    total: "TNRCB",
                    wind: None,
                    solar: Some("SORCB"),
                    geothermal: Some("GERCB"),
                    hydroelectric: None,
                    coal: Some("CLRCB"),
                    natural_gas: Some("NGRCB"),
                    supplemental_gas: Some("SFRCB"),
                    petroleum: Some("PARCB"),
                    co2_sector: "RC",
                },
                SectorSeries {
                    electric: "ESCCB",
                    total: "TNCCB",
                    wind: Some("WYCCB"),
                    solar: Some("SOCCB"),
                    geothermal: Some("GECCB"),
                    hydroelectric: Some("HYCCB"),
                    coal: Some("CLCCB"),
                    natural_gas: Some("NGCCB"),
                    supplemental_gas: Some("SFCCB"),
                    petroleum: Some("PACCB"),
                    co2_sector: "CC",
                },
                SectorSeries {
                    electric: "ESISB",
                    total: "TNICB",
                    wind: Some("WYICB"),
                    solar: Some("SOICB"),
                    geothermal: Some("GEICB"),
                    hydroelectric: Some("HYICB"),
                    coal: Some("CLICB"),
                    natural_gas: Some("NGICB"),
                    supplemental_gas: Some("SFINB"),
                    petroleum: Some("PAICB"),
                    co2_sector: "IC",
                },
                SectorSeries {
                    electric: "ESACB",
                    total: "TNACB",
                    wind: None,
                    solar: None,
                    geothermal: None,
                    hydroelectric: None,
                    coal: Some("CLACB"),
                    natural_gas: Some("NGASB"),
                    supplemental_gas: None,
                    petroleum: Some("PAACB"),
                    co2_sector: "TC",
                },
            ],
            co2_all_fuels: "TO",
            co2_electric_sector: "EC",
            co2_coal: "CO",
            co2_natural_gas: "NG",
            co2_petroleum: "PE",
        }
    }

    pub fn series(&self, sector: Sector) -> &SectorSeries {
        &self.sectors[sector.index()]
    }

    /// Every energy series id a fetch must cover: electric and total per
    /// sector plus all bound fuel-piece slot ids.
    pub fn energy_series_ids(&self) -> Vec<&'static str> {
        let mut ids = Vec::new();
        for sector in Sector::ALL {
            let series = self.series(sector);
            ids.push(series.electric);
            ids.push(series.total);
            for fuel in FuelKind::ALL {
                ids.extend(series.piece_slots(fuel).ids());
            }
        }
        ids
    }

    /// CO2 sector keys a fetch must cover: the electric-generation key plus
    /// every sector's own key.
    pub fn co2_sector_keys(&self) -> Vec<&'static str> {
        let mut keys = vec![self.co2_electric_sector];
        keys.extend(Sector::ALL.iter().map(|s| self.series(*s).co2_sector));
        keys
    }

    /// CO2 fuel keys a fetch must cover.
    pub fn co2_fuel_keys(&self) -> Vec<&'static str> {
        vec![
            self.co2_all_fuels,
            self.co2_coal,
            self.co2_natural_gas,
            self.co2_petroleum,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_gas_slots_subtract_supplemental() {
        let catalog = Catalog::us_seds();
        let slots = catalog
            .series(Sector::Residential)
            .piece_slots(FuelKind::NaturalGas);
        assert_eq!(slots.add, vec!["NGRCB"]);
        assert_eq!(slots.subtract, vec!["SFRCB"]);
    }

    #[test]
    fn test_transportation_natural_gas_has_no_supplemental() {
        let catalog = Catalog::us_seds();
        let slots = catalog
            .series(Sector::Transportation)
            .piece_slots(FuelKind::NaturalGas);
        assert_eq!(slots.add, vec!["NGASB"]);
        assert!(slots.subtract.is_empty());
    }

    #[test]
    fn test_absent_fuel_id_yields_empty_slots() {
        let catalog = Catalog::us_seds();
        let slots = catalog
            .series(Sector::Residential)
            .piece_slots(FuelKind::Wind);
        assert!(slots.add.is_empty());
        assert!(slots.subtract.is_empty());
    }

    #[test]
    fn test_other_piece_never_has_slots() {
        let catalog = Catalog::us_seds();
        for sector in Sector::ALL {
            let slots = catalog.series(sector).piece_slots(FuelKind::Other);
            assert!(slots.add.is_empty());
            assert!(slots.subtract.is_empty());
        }
    }

    #[test]
    fn test_energy_series_ids_cover_subsectors_and_pieces() {
        let catalog = Catalog::us_seds();
        let ids = catalog.energy_series_ids();
        for expected in ["ESRCB", "TNRCB", "ESISB", "SFINB", "NGASB", "PAACB"] {
            assert!(ids.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_co2_keys() {
        let catalog = Catalog::us_seds();
        assert_eq!(
            catalog.co2_sector_keys(),
            vec!["EC", "RC", "CC", "IC", "TC"]
        );
        assert_eq!(catalog.co2_fuel_keys(), vec!["TO", "CO", "NG", "PE"]);
    }
}
