//! Turn engine output into the response bundle: one figure per metric group,
//! the two export files, and summary statistics.
//!
//! Every step tolerates a missing or partial engine output. Problems are
//! recorded in the [`ErrorLog`] and the affected piece is left out.

pub mod figure;
pub mod files;
pub mod palette;
pub mod plots;

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::engine::{Engine, EngineOutput, SERIES_CUM_DEATHS, SERIES_CUM_INFECTIONS, SERIES_DAY};
use crate::errors::ErrorLog;
use crate::model::{FileBlob, GraphPayload, Summary};

pub use figure::Figure;
pub use plots::{default_plots, MetricGroup, SeriesSpec};

pub struct AssembleOptions<'a> {
    pub plots: &'a [MetricGroup],
    pub file_prefix: &'a str,
    /// Local time used to stamp export filenames.
    pub timestamp: NaiveDateTime,
}

/// Everything in a `RunResult` except the error string and echoed parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembled {
    pub graphs: Vec<GraphPayload>,
    pub files: BTreeMap<String, FileBlob>,
    pub summary: Summary,
}

pub fn assemble(
    engine: &dyn Engine,
    output: Option<&EngineOutput>,
    opts: &AssembleOptions<'_>,
    errors: &mut ErrorLog,
) -> Assembled {
    let Some(output) = output else {
        return Assembled::default();
    };
    Assembled {
        graphs: build_graphs(output, opts.plots, errors),
        files: build_files(engine, output, opts, errors),
        summary: summarize(output, errors),
    }
}

pub fn build_graphs(
    output: &EngineOutput,
    plots: &[MetricGroup],
    errors: &mut ErrorLog,
) -> Vec<GraphPayload> {
    let Some(days) = output.results.get(SERIES_DAY) else {
        errors.assembly(format!("result series \"{SERIES_DAY}\" missing; no graphs built"));
        return Vec::new();
    };

    let mut graphs = Vec::with_capacity(plots.len());
    for group in plots {
        let colors = palette::evenly_spaced(group.series.len());
        let mut fig = Figure::time_series(&group.title);
        for (spec, color) in group.series.iter().zip(colors) {
            match output.results.get(&spec.key) {
                Some(y) => fig.add_line(&spec.label, days, y, palette::css_rgb(color)),
                None => errors.assembly(format!(
                    "result series \"{}\" missing from \"{}\"",
                    spec.key, group.title
                )),
            }
        }
        match fig.to_json() {
            Ok(json) => graphs.push(GraphPayload {
                json,
                id: uuid::Uuid::new_v4().to_string(),
            }),
            Err(e) => errors.assembly(format!("figure \"{}\": {e}", group.title)),
        }
    }
    graphs
}

pub fn build_files(
    engine: &dyn Engine,
    output: &EngineOutput,
    opts: &AssembleOptions<'_>,
    errors: &mut ErrorLog,
) -> BTreeMap<String, FileBlob> {
    let stamp = files::datestamp(opts.timestamp);
    let mut out = BTreeMap::new();

    match engine.export_xlsx(output) {
        Ok(bytes) => {
            let name = format!("{}_{stamp}.xlsx", opts.file_prefix);
            out.insert("xlsx".to_string(), files::blob(name, files::XLSX_MIME, &bytes));
        }
        Err(e) => errors.assembly(e),
    }

    match engine.export_json(output) {
        Ok(text) => {
            let name = format!("{}_{stamp}.txt", opts.file_prefix);
            out.insert(
                "json".to_string(),
                files::blob(name, files::JSON_MIME, text.as_bytes()),
            );
        }
        Err(e) => errors.assembly(e),
    }

    out
}

pub fn summarize(output: &EngineOutput, errors: &mut ErrorLog) -> Summary {
    let mut last = |key: &str| match output.results.last(key) {
        Some(v) => v.round_ties_even() as i64,
        None => {
            errors.assembly(format!("result series \"{key}\" missing or empty"));
            0
        }
    };
    Summary {
        days: output.npts.saturating_sub(1) as u64,
        cases: last(SERIES_CUM_INFECTIONS),
        deaths: last(SERIES_CUM_DEATHS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, EngineResult, EngineVersion, ResultTable};
    use crate::errors::EngineError;
    use chrono::NaiveDate;

    struct Exports;

    impl Engine for Exports {
        fn version(&self) -> EngineResult<EngineVersion> {
            Err(EngineError::run("unused"))
        }

        fn run(&self, _config: &EngineConfig) -> EngineResult<EngineOutput> {
            Err(EngineError::run("unused"))
        }
    }

    fn output() -> EngineOutput {
        let mut results = ResultTable::new();
        results.insert("t", vec![0.0, 1.0, 2.0]);
        results.insert("cum_exposed", vec![10.0, 14.0, 20.5]);
        results.insert("cum_deaths", vec![0.0, 0.0, 1.4]);
        results.insert("infections", vec![10.0, 4.0, 6.5]);
        EngineOutput {
            npts: 3,
            results,
            spreadsheet: Some(b"PK".to_vec()),
            ..Default::default()
        }
    }

    fn opts(plots: &[MetricGroup]) -> AssembleOptions<'_> {
        AssembleOptions {
            plots,
            file_prefix: "COVASim_results",
            timestamp: NaiveDate::from_ymd_opt(2020, 3, 27)
                .unwrap()
                .and_hms_opt(9, 0, 1)
                .unwrap(),
        }
    }

    #[test]
    fn summary_reads_last_points() {
        let mut errors = ErrorLog::new();
        let s = summarize(&output(), &mut errors);
        assert_eq!(s, Summary { days: 2, cases: 20, deaths: 1 });
        assert!(errors.is_empty());
    }

    #[test]
    fn one_graph_per_group_with_unique_ids() {
        let plots = vec![
            MetricGroup::new("Totals", &[("cum_exposed", "Infections"), ("cum_deaths", "Deaths")]),
            MetricGroup::new("Daily", &[("infections", "New infections")]),
        ];
        let mut errors = ErrorLog::new();
        let graphs = build_graphs(&output(), &plots, &mut errors);

        assert!(errors.is_empty());
        assert_eq!(graphs.len(), 2);
        assert_ne!(graphs[0].id, graphs[1].id);

        let fig: serde_json::Value = serde_json::from_str(&graphs[0].json).unwrap();
        assert_eq!(fig["data"].as_array().unwrap().len(), 2);
        assert_ne!(fig["data"][0]["line"]["color"], fig["data"][1]["line"]["color"]);
        assert_eq!(fig["data"][1]["x"], serde_json::json!([0.0, 1.0, 2.0]));
    }

    #[test]
    fn missing_series_is_skipped_and_reported() {
        let plots = vec![MetricGroup::new("Totals", &[("cum_exposed", "Infections"), ("recoveries", "Recovered")])];
        let mut errors = ErrorLog::new();
        let graphs = build_graphs(&output(), &plots, &mut errors);

        assert_eq!(graphs.len(), 1);
        assert!(errors.render().contains("recoveries"));
        let fig: serde_json::Value = serde_json::from_str(&graphs[0].json).unwrap();
        assert_eq!(fig["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn files_are_timestamped_data_uris() {
        let mut errors = ErrorLog::new();
        let files = build_files(&Exports, &output(), &opts(&[]), &mut errors);

        assert!(errors.is_empty());
        assert_eq!(files["xlsx"].filename, "COVASim_results_2020-Mar-27_09.00.01.xlsx");
        assert_eq!(files["xlsx"].content, format!("data:{};base64,UEs=", files::XLSX_MIME));
        assert!(files["json"].content.starts_with("data:application/text;base64,"));
        assert!(files["json"].filename.ends_with(".txt"));
    }

    #[test]
    fn missing_spreadsheet_only_drops_that_file() {
        let mut out = output();
        out.spreadsheet = None;
        let mut errors = ErrorLog::new();
        let files = build_files(&Exports, &out, &opts(&[]), &mut errors);

        assert!(!files.contains_key("xlsx"));
        assert!(files.contains_key("json"));
        assert!(errors.render().contains("xlsx"));
    }

    #[test]
    fn absent_output_yields_empty_bundle() {
        let plots = default_plots();
        let mut errors = ErrorLog::new();
        let assembled = assemble(&Exports, None, &opts(&plots), &mut errors);

        assert_eq!(assembled, Assembled::default());
        assert_eq!(assembled.summary.days, 0);
        assert!(errors.is_empty());
    }
}
