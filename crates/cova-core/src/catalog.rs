//! Default parameter catalog and region presets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::CatalogError;

/// Upper bound on simulated agents.
pub const MAX_POP: f64 = 10e3;
/// Upper bound on simulated days.
pub const MAX_DAYS: f64 = 90.0;

/// Metadata for one tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub best: f64,
    pub min: f64,
    pub max: f64,
    pub name: String,
    pub tip: String,
}

impl ParameterSpec {
    fn new(best: f64, min: f64, max: f64, name: &str, tip: &str) -> Self {
        Self {
            best,
            min,
            max,
            name: name.to_string(),
            tip: tip.to_string(),
        }
    }

    /// Whether `min <= best <= max`.
    pub fn is_consistent(&self) -> bool {
        self.min <= self.best && self.best <= self.max
    }
}

/// Parameter key → spec.
pub type ParameterGroup = BTreeMap<String, ParameterSpec>;

/// Named preset supplying alternate `best` values for the structural keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Region {
    #[default]
    Example,
    Seattle,
}

/// Per-region `best` overrides, one field per structural key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOverrides {
    pub scale: f64,
    pub n: f64,
    pub n_days: f64,
    pub n_infected: f64,
    pub interv_days: f64,
    pub interv_effs: f64,
}

impl RegionOverrides {
    fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("scale", self.scale),
            ("n", self.n),
            ("n_days", self.n_days),
            ("n_infected", self.n_infected),
            ("interv_days", self.interv_days),
            ("interv_effs", self.interv_effs),
        ]
    }
}

impl Region {
    pub const ALL: [Region; 2] = [Region::Example, Region::Seattle];

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Example => "Example",
            Region::Seattle => "Seattle",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Lookup that never fails: unknown or absent names resolve to `fallback`.
    pub fn resolve(name: Option<&str>, fallback: Region) -> Self {
        match name {
            None => fallback,
            Some(n) => Self::from_name(n).unwrap_or_else(|| {
                tracing::warn!(region = n, fallback = fallback.as_str(), "unknown region");
                fallback
            }),
        }
    }

    pub fn overrides(self) -> RegionOverrides {
        match self {
            Region::Example => RegionOverrides {
                scale: 1.0,
                n: 2000.0,
                n_days: 60.0,
                n_infected: 10.0,
                interv_days: 20.0,
                interv_effs: 0.5,
            },
            Region::Seattle => RegionOverrides {
                scale: 25.0,
                n: 10000.0,
                n_days: 45.0,
                n_infected: 4.0,
                interv_days: 20.0,
                interv_effs: 0.0,
            },
        }
    }
}

impl TryFrom<String> for Region {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::from_name(&name).ok_or_else(|| format!("unknown region \"{name}\""))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn base_sim_pars() -> ParameterGroup {
    let mut g = ParameterGroup::new();
    g.insert("scale".into(), ParameterSpec::new(1.0, 1.0, 1e6, "Population scale factor", "Multiplier for results (to approximate large populations)"));
    g.insert("n".into(), ParameterSpec::new(5000.0, 1.0, MAX_POP, "Population size", "Number of agents simulated in the model"));
    g.insert("n_infected".into(), ParameterSpec::new(10.0, 1.0, MAX_POP, "Initial infections", "Number of initial seed infections in the model"));
    g.insert("n_days".into(), ParameterSpec::new(90.0, 1.0, MAX_DAYS, "Number of days to simulate", "Number of days to run the simulation for"));
    g.insert("interv_days".into(), ParameterSpec::new(20.0, 0.0, MAX_DAYS, "Intervention start day", "Start day of the intervention (can be blank)"));
    g.insert("interv_effs".into(), ParameterSpec::new(0.9, 0.0, 1.0, "Intervention effectiveness", "Change in infection rate due to intervention"));
    g.insert("seed".into(), ParameterSpec::new(1.0, 1.0, 100.0, "Random seed", "Random number seed (leave blank for random results)"));
    g
}

fn base_epi_pars() -> ParameterGroup {
    let mut g = ParameterGroup::new();
    g.insert("beta".into(), ParameterSpec::new(0.015, 0.0, 0.2, "Beta (infectiousness)", "Probability of infection per contact per day"));
    g.insert("contacts".into(), ParameterSpec::new(20.0, 0.0, 50.0, "Number of contacts", "Average number of people each person is in contact with each day"));
    g.insert("serial".into(), ParameterSpec::new(4.0, 1.0, 30.0, "Serial interval (days)", "Average number of days between exposure and being infectious"));
    g.insert("incub".into(), ParameterSpec::new(5.0, 1.0, 30.0, "Incubation period (days)", "Average number of days between exposure and developing symptoms"));
    g.insert("dur".into(), ParameterSpec::new(8.0, 1.0, 30.0, "Infection duration (days)", "Average number of days between infection and recovery (viral shedding period)"));
    g.insert("timetodie".into(), ParameterSpec::new(22.0, 1.0, 60.0, "Time until death (days)", "Average number of days between infection and death"));
    g.insert("default_cfr".into(), ParameterSpec::new(0.02, 0.0, 1.0, "Case fatality rate", "Proportion of people who become infected who die"));
    g
}

/// Both parameter groups with region overrides applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub sim_pars: ParameterGroup,
    pub epi_pars: ParameterGroup,
}

impl Catalog {
    pub fn build(region: Region) -> Self {
        let mut sim_pars = base_sim_pars();
        for (key, best) in region.overrides().entries() {
            if let Some(spec) = sim_pars.get_mut(key) {
                spec.best = best;
            }
        }
        Self {
            sim_pars,
            epi_pars: base_epi_pars(),
        }
    }

    /// Flat view of both groups. Keys are disjoint across groups.
    pub fn merged(&self) -> ParameterGroup {
        let mut out = self.sim_pars.clone();
        out.extend(self.epi_pars.clone());
        out
    }

    /// `(min, max)` for a key in either group.
    pub fn bounds(&self, key: &str) -> Result<(f64, f64), CatalogError> {
        self.sim_pars
            .get(key)
            .or_else(|| self.epi_pars.get(key))
            .map(|spec| (spec.min, spec.max))
            .ok_or_else(|| CatalogError::UnknownKey {
                key: key.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterSpec)> {
        self.sim_pars.iter().chain(self.epi_pars.iter())
    }
}

/// Response shape of `get_defaults`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Defaults {
    Merged(ParameterGroup),
    Split(Catalog),
}

/// Catalog for `region`, either split into groups or flattened.
pub fn build_catalog(region: Region, merge: bool) -> Defaults {
    let catalog = Catalog::build(region);
    if merge {
        Defaults::Merged(catalog.merged())
    } else {
        Defaults::Split(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_region_keeps_best_within_bounds() {
        for region in Region::ALL {
            let catalog = Catalog::build(region);
            for (key, spec) in catalog.iter() {
                assert!(spec.is_consistent(), "{region}: {key} out of bounds: {spec:?}");
            }
        }
    }

    #[test]
    fn groups_are_disjoint() {
        let catalog = Catalog::build(Region::Example);
        for key in catalog.sim_pars.keys() {
            assert!(!catalog.epi_pars.contains_key(key), "duplicate key {key}");
        }
        assert_eq!(
            catalog.merged().len(),
            catalog.sim_pars.len() + catalog.epi_pars.len()
        );
    }

    #[test]
    fn region_overrides_structural_keys_only() {
        let example = Catalog::build(Region::Example);
        let seattle = Catalog::build(Region::Seattle);
        assert_eq!(example.sim_pars["n"].best, 2000.0);
        assert_eq!(seattle.sim_pars["n"].best, 10000.0);
        assert_eq!(seattle.sim_pars["scale"].best, 25.0);
        assert_eq!(example.epi_pars, seattle.epi_pars);
        assert_eq!(example.sim_pars["seed"], seattle.sim_pars["seed"]);
    }

    #[test]
    fn unknown_region_falls_back() {
        assert_eq!(Region::resolve(Some("Wuhan"), Region::Example), Region::Example);
        assert_eq!(Region::resolve(Some("seattle"), Region::Example), Region::Seattle);
        assert_eq!(Region::resolve(None, Region::Seattle), Region::Seattle);
    }

    #[test]
    fn merged_defaults_serialize_flat() {
        let value = serde_json::to_value(build_catalog(Region::Example, true)).unwrap();
        assert_eq!(value["n_infected"]["best"], 10.0);
        assert!(value.get("sim_pars").is_none());

        let split = serde_json::to_value(build_catalog(Region::Example, false)).unwrap();
        assert_eq!(split["epi_pars"]["beta"]["max"], 0.2);
    }

    #[test]
    fn bounds_reports_unknown_key() {
        let catalog = Catalog::build(Region::Example);
        assert_eq!(catalog.bounds("beta").unwrap(), (0.0, 0.2));
        assert_eq!(
            catalog.bounds("nope"),
            Err(CatalogError::UnknownKey { key: "nope".into() })
        );
    }
}
