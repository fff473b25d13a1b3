use std::fmt::Write;

use crate::models::FieldValue;
use crate::presentation::{
    ChartSpec, DashboardView, MetricWidget, NoticeLevel, Panel, PreparedTable, ViewStatus,
};

/// Rows printed per table or chart before the rest is summarized.
const MAX_TABLE_ROWS: usize = 20;

/// Renders the dashboard as one markdown document, one section per view.
pub fn build_report(subject: Option<i64>, views: &[DashboardView]) -> String {
    let mut output = String::new();
    let subject_label = subject
        .map(|id| format!("user {id}"))
        .unwrap_or_else(|| "the first listed user".to_string());

    let _ = writeln!(output, "# Wearable Health Dashboard");
    let _ = writeln!(output, "Per-subject views generated for {subject_label}");

    for view in views {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", view.title);

        match &view.status {
            ViewStatus::Ready => {}
            ViewStatus::Empty { reason } => {
                let _ = writeln!(output, "_{reason}_");
                continue;
            }
            ViewStatus::Unavailable { reason } => {
                let _ = writeln!(output, "> Unavailable: {reason}");
                continue;
            }
        }

        for panel in &view.panels {
            let _ = writeln!(output);
            write_panel(&mut output, panel);
        }
    }

    output
}

fn write_panel(output: &mut String, panel: &Panel) {
    match panel {
        Panel::Metrics { title, widgets } => {
            let _ = writeln!(output, "### {title}");
            for widget in widgets {
                write_widget(output, widget);
            }
        }
        Panel::Chart(chart) => write_chart(output, chart),
        Panel::Table { title, table } => {
            let _ = writeln!(output, "### {title}");
            write_table(output, table);
        }
        Panel::Notice { level, message } => {
            let prefix = match level {
                NoticeLevel::Info => "Note",
                NoticeLevel::Warning => "Warning",
            };
            let _ = writeln!(output, "> {prefix}: {message}");
        }
    }
}

fn write_widget(output: &mut String, widget: &MetricWidget) {
    match &widget.help {
        Some(help) => {
            let _ = writeln!(output, "- {}: {} ({help})", widget.label, widget.value);
        }
        None => {
            let _ = writeln!(output, "- {}: {}", widget.label, widget.value);
        }
    }
}

fn write_chart(output: &mut String, chart: &ChartSpec) {
    let _ = writeln!(output, "### {}", chart.title);

    let channels = [
        ("x", &chart.x),
        ("y", &chart.y),
        ("theta", &chart.theta),
        ("color", &chart.color),
    ];
    let axes: Vec<String> = channels
        .into_iter()
        .filter_map(|(channel, encoding)| {
            encoding.as_ref().map(|encoding| {
                let mut described = format!("{channel} = `{}`", encoding.shorthand());
                if let Some(bins) = encoding.max_bins {
                    let _ = write!(described, " in up to {bins} bins");
                }
                described
            })
        })
        .collect();
    if !axes.is_empty() {
        let _ = writeln!(output, "_{:?} chart: {}_", chart.mark, axes.join(", "));
    }

    write_table(output, &chart.data);
}

fn write_table(output: &mut String, table: &PreparedTable) {
    if table.is_empty() {
        let _ = writeln!(output, "No rows.");
        return;
    }

    let names: Vec<&str> = table.columns.iter().map(|column| column.name.as_str()).collect();
    let _ = writeln!(output, "| {} |", names.join(" | "));
    let _ = writeln!(output, "|{}", " --- |".repeat(names.len()));

    let rows = table.row_count();
    for index in 0..rows.min(MAX_TABLE_ROWS) {
        let cells: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                column
                    .values
                    .get(index)
                    .map(|value| match value {
                        FieldValue::Float(number) => format!("{number:.2}"),
                        other => other.to_string(),
                    })
                    .unwrap_or_default()
            })
            .collect();
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }

    if rows > MAX_TABLE_ROWS {
        let _ = writeln!(output, "_{} more rows not shown_", rows - MAX_TABLE_ROWS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::{Encoding, Mark};

    #[test]
    fn renders_sections_and_states() {
        let views = vec![
            DashboardView::ready(
                "Fitbit Sleep Insights",
                vec![Panel::Metrics {
                    title: "Summary of User 7".to_string(),
                    widgets: vec![
                        MetricWidget::new("Best Sleep (mins)", "480").with_help("Date: 2016-04-13"),
                        MetricWidget::unavailable("Worst Sleep (mins)"),
                    ],
                }],
            ),
            DashboardView::empty("Fitbit Activity Overview", "No data available for user 7."),
            DashboardView::unavailable("WHOOP Sleep Insights", "no data loaded from `sleeps_rafi`"),
        ];

        let report = build_report(Some(7), &views);

        assert!(report.starts_with("# Wearable Health Dashboard"));
        assert!(report.contains("generated for user 7"));
        assert!(report.contains("- Best Sleep (mins): 480 (Date: 2016-04-13)"));
        assert!(report.contains("- Worst Sleep (mins): Not available"));
        assert!(report.contains("_No data available for user 7._"));
        assert!(report.contains("> Unavailable: no data loaded from `sleeps_rafi`"));
    }

    #[test]
    fn charts_render_as_capped_tables() {
        let data = PreparedTable::new()
            .with_column("Month", (1..=25).map(|m| format!("2023-{m:02}")))
            .with_column("HRV", (1..=25).map(|m| Some(m as f64 + 0.5)));
        let chart = ChartSpec::new("Average HRV Trend", Mark::Line, data)
            .x(Encoding::nominal("Month"))
            .y(Encoding::quantitative("HRV"));
        let views = vec![DashboardView::ready("Rafi's WHOOP Insights", vec![Panel::Chart(chart)])];

        let report = build_report(None, &views);

        assert!(report.contains("x = `Month:N`, y = `HRV:Q`"));
        assert!(report.contains("| Month | HRV |"));
        assert!(report.contains("| 2023-01 | 1.50 |"));
        assert!(report.contains("_5 more rows not shown_"));
        assert!(!report.contains("2023-21"));
    }

    #[test]
    fn notices_and_empty_tables() {
        let views = vec![DashboardView::ready(
            "WHOOP vs Fitbit Comparison Metrics",
            vec![
                Panel::warning("Sleep comparison needs both sleep sources."),
                Panel::info("`workouts_rafi` is empty."),
                Panel::Table {
                    title: "Row-Aligned Comparison".to_string(),
                    table: PreparedTable::new(),
                },
            ],
        )];

        let report = build_report(None, &views);

        assert!(report.contains("> Warning: Sleep comparison needs both sleep sources."));
        assert!(report.contains("> Note: `workouts_rafi` is empty."));
        assert!(report.contains("No rows."));
    }
}
