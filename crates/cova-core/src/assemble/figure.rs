//! Time-series figures in a plotly-compatible JSON layout.
//!
//! Figures are data only; rendering happens on the client.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub mode: &'static str,
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: Title,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Title,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub autosize: bool,
}

impl Figure {
    pub fn time_series(title: &str) -> Self {
        Self {
            data: Vec::new(),
            layout: Layout {
                title: Title { text: title.into() },
                xaxis: Axis {
                    title: Title { text: "Day".into() },
                },
                yaxis: Axis {
                    title: Title {
                        text: "Count".into(),
                    },
                },
                autosize: true,
            },
        }
    }

    pub fn add_line(&mut self, name: &str, x: &[f64], y: &[f64], color: String) {
        self.data.push(Trace {
            kind: "scatter",
            mode: "lines",
            name: name.to_string(),
            x: x.to_vec(),
            y: y.to_vec(),
            line: Line { color },
        });
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_plotly_shape() {
        let mut fig = Figure::time_series("Total counts");
        fig.add_line("Deaths", &[0.0, 1.0], &[0.0, 2.0], "rgb(1,2,3)".into());

        let v: serde_json::Value = serde_json::from_str(&fig.to_json().unwrap()).unwrap();
        assert_eq!(v["layout"]["title"]["text"], "Total counts");
        assert_eq!(v["layout"]["xaxis"]["title"]["text"], "Day");
        assert_eq!(v["data"][0]["type"], "scatter");
        assert_eq!(v["data"][0]["line"]["color"], "rgb(1,2,3)");
        assert_eq!(v["data"][0]["y"][1], 2.0);
    }
}
