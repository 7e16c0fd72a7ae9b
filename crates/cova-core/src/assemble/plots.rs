//! Metric groups plotted for each run.

use serde::{Deserialize, Serialize};

/// One result series and its legend label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub key: String,
    pub label: String,
}

/// Series plotted together in one figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricGroup {
    pub title: String,
    pub series: Vec<SeriesSpec>,
}

impl MetricGroup {
    pub fn new(title: &str, series: &[(&str, &str)]) -> Self {
        Self {
            title: title.to_string(),
            series: series
                .iter()
                .map(|(key, label)| SeriesSpec {
                    key: key.to_string(),
                    label: label.to_string(),
                })
                .collect(),
        }
    }
}

pub fn default_plots() -> Vec<MetricGroup> {
    vec![
        MetricGroup::new(
            "Total counts",
            &[
                ("cum_exposed", "Cumulative infections"),
                ("cum_deaths", "Cumulative deaths"),
                ("cum_recoveries", "Cumulative recoveries"),
                ("cum_diagnosed", "Number diagnosed"),
            ],
        ),
        MetricGroup::new(
            "Daily counts",
            &[
                ("infections", "New infections"),
                ("deaths", "New deaths"),
                ("recoveries", "New recoveries"),
                ("tests", "Number of tests"),
                ("diagnoses", "New diagnoses"),
            ],
        ),
    ]
}
