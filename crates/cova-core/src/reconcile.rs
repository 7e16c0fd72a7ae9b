//! Merge caller overrides into the default catalog.
//!
//! Every supplied key is processed independently: a key that cannot be looked
//! up or converted is recorded in the [`ErrorLog`] and the remaining keys still
//! reconcile. Present values are clamped into `[min, max]` with a median of
//! three; absent values reconcile to `None` so the engine default applies.

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::errors::ErrorLog;
use crate::model::{OverrideGroup, SuppliedValue};

/// Reconciled key → value. `None` leaves the engine default in place.
pub type ReconciledParams = BTreeMap<String, Option<f64>>;

/// Median of three values; clamps `value` into `[lo, hi]` when `lo <= hi`.
pub fn median3(value: f64, lo: f64, hi: f64) -> f64 {
    value.min(lo).max(value.max(lo).min(hi))
}

/// Output of [`reconcile`]: the values to run with, the override groups
/// rewritten to those values, and any per-key failures.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub params: ReconciledParams,
    pub sim_pars: OverrideGroup,
    pub epi_pars: OverrideGroup,
    pub errors: ErrorLog,
}

pub fn reconcile(catalog: &Catalog, sim: OverrideGroup, epi: OverrideGroup) -> Reconciliation {
    let mut out = Reconciliation {
        sim_pars: sim,
        epi_pars: epi,
        ..Default::default()
    };

    // epi is applied second so it wins if a caller repeats a key across groups.
    reconcile_group(catalog, &mut out.sim_pars, &mut out.params, &mut out.errors);
    reconcile_group(catalog, &mut out.epi_pars, &mut out.params, &mut out.errors);

    tracing::debug!(
        keys = out.params.len(),
        failures = out.errors.len(),
        "parameters reconciled"
    );
    out
}

fn reconcile_group(
    catalog: &Catalog,
    group: &mut OverrideGroup,
    params: &mut ReconciledParams,
    errors: &mut ErrorLog,
) {
    for (key, entry) in group.iter_mut() {
        let value = match reconcile_one(catalog, key, entry.best.as_ref()) {
            Ok(v) => {
                params.insert(key.clone(), v);
                v
            }
            Err(msg) => {
                errors.conversion(key, msg);
                None
            }
        };
        entry.best = value.map(SuppliedValue::Number);
    }
}

fn reconcile_one(
    catalog: &Catalog,
    key: &str,
    supplied: Option<&SuppliedValue>,
) -> Result<Option<f64>, String> {
    let (lo, hi) = catalog.bounds(key).map_err(|e| e.to_string())?;
    let value = match supplied {
        Some(v) => v.to_number(key).map_err(|e| e.to_string())?,
        None => None,
    };
    Ok(value.map(|v| median3(v, lo, hi)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Region;
    use crate::model::OverrideEntry;
    use proptest::prelude::*;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::build(Region::Example)
    }

    fn group(entries: &[(&str, OverrideEntry)]) -> OverrideGroup {
        entries
            .iter()
            .map(|(k, e)| (k.to_string(), e.clone()))
            .collect()
    }

    #[test]
    fn values_inside_bounds_pass_through() {
        let r = reconcile(
            &catalog(),
            group(&[("n", OverrideEntry::with_best(1234.0))]),
            OverrideGroup::new(),
        );
        assert!(r.errors.is_empty());
        assert_eq!(r.params["n"], Some(1234.0));
        assert_eq!(r.sim_pars["n"].best_number(), Some(1234.0));
    }

    #[test]
    fn values_outside_bounds_are_clamped() {
        let r = reconcile(
            &catalog(),
            group(&[
                ("n", OverrideEntry::with_best(1e9)),
                ("interv_days", OverrideEntry::with_best(-5.0)),
            ]),
            group(&[("beta", OverrideEntry::with_best(0.9))]),
        );
        assert_eq!(r.params["n"], Some(crate::catalog::MAX_POP));
        assert_eq!(r.params["interv_days"], Some(0.0));
        assert_eq!(r.params["beta"], Some(0.2));
        assert_eq!(r.epi_pars["beta"].best_number(), Some(0.2));
    }

    #[test]
    fn blank_values_reconcile_to_none() {
        let blank: OverrideEntry = serde_json::from_value(json!({ "best": "" })).unwrap();
        let r = reconcile(&catalog(), group(&[("seed", blank)]), OverrideGroup::new());
        assert!(r.errors.is_empty());
        assert_eq!(r.params["seed"], None);
        assert!(r.sim_pars["seed"].best.is_none());
    }

    #[test]
    fn zero_is_kept_not_treated_as_blank() {
        let r = reconcile(
            &catalog(),
            group(&[("interv_effs", OverrideEntry::with_best(0.0))]),
            OverrideGroup::new(),
        );
        assert_eq!(r.params["interv_effs"], Some(0.0));
    }

    #[test]
    fn one_bad_key_does_not_stop_the_others() {
        let garbage: OverrideEntry = serde_json::from_value(json!({ "best": "lots" })).unwrap();
        let r = reconcile(
            &catalog(),
            group(&[
                ("bogus_key", OverrideEntry::with_best(3.0)),
                ("n", OverrideEntry::with_best(500.0)),
            ]),
            group(&[
                ("beta", garbage),
                ("contacts", OverrideEntry::with_best(99.0)),
            ]),
        );

        assert_eq!(r.errors.len(), 2);
        let err = r.errors.render();
        assert!(err.contains("bogus_key"), "{err}");
        assert!(err.contains("beta"), "{err}");

        assert_eq!(r.params["n"], Some(500.0));
        assert_eq!(r.params["contacts"], Some(50.0));
        assert!(!r.params.contains_key("bogus_key"));
        assert!(r.sim_pars["bogus_key"].best.is_none());
    }

    #[test]
    fn extra_entry_fields_survive() {
        let entry: OverrideEntry =
            serde_json::from_value(json!({ "best": 7, "name": "Initial infections" })).unwrap();
        let r = reconcile(&catalog(), group(&[("n_infected", entry)]), OverrideGroup::new());
        assert_eq!(r.sim_pars["n_infected"].extra["name"], "Initial infections");
    }

    proptest! {
        #[test]
        fn clamp_law(v in -1e7f64..1e7, a in -1e3f64..1e3, b in -1e3f64..1e3) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let expected = if v < lo { lo } else if v > hi { hi } else { v };
            prop_assert_eq!(median3(v, lo, hi), expected);
        }

        #[test]
        fn reconcile_is_idempotent(n in -1e5f64..1e5, beta in -1.0f64..1.0, seed in -10f64..500.0) {
            let cat = catalog();
            let first = reconcile(
                &cat,
                group(&[("n", OverrideEntry::with_best(n)), ("seed", OverrideEntry::with_best(seed))]),
                group(&[("beta", OverrideEntry::with_best(beta))]),
            );
            let second = reconcile(&cat, first.sim_pars.clone(), first.epi_pars.clone());
            prop_assert_eq!(&first.params, &second.params);
            prop_assert_eq!(&first.sim_pars, &second.sim_pars);
            prop_assert!(second.errors.is_empty());
        }
    }
}
