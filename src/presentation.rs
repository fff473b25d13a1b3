//! Prepared tables, declarative chart specs and metric widgets handed to the
//! rendering surface. Nothing here knows how they get drawn.

use serde::Serialize;

use crate::models::FieldValue;
use crate::stats::Aggregate;

pub const NOT_AVAILABLE: &str = "Not available";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    pub name: String,
    pub values: Vec<FieldValue>,
}

/// Column name to ordered values. All columns have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreparedTable {
    pub columns: Vec<TableColumn>,
}

impl PreparedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.columns.push(TableColumn {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |column| column.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|column| column.name == name)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::Integer(value as i64)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<Aggregate> for FieldValue {
    fn from(value: Aggregate) -> Self {
        FieldValue::from(value.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Line,
    Circle,
    Bar,
    Arc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Quantitative,
    Nominal,
    Temporal,
}

impl FieldType {
    /// Single-letter shorthand used in field references, e.g. `Date:T`.
    pub fn tag(self) -> char {
        match self {
            FieldType::Quantitative => 'Q',
            FieldType::Nominal => 'N',
            FieldType::Temporal => 'T',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Encoding {
    pub field: String,
    pub field_type: FieldType,
    pub title: Option<String>,
    /// Bin the field into at most this many buckets.
    pub max_bins: Option<u32>,
    /// Encode the row count instead of a field value.
    pub count: bool,
}

impl Encoding {
    pub fn new(field: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field: field.into(),
            field_type,
            title: None,
            max_bins: None,
            count: false,
        }
    }

    pub fn quantitative(field: impl Into<String>) -> Self {
        Self::new(field, FieldType::Quantitative)
    }

    pub fn nominal(field: impl Into<String>) -> Self {
        Self::new(field, FieldType::Nominal)
    }

    pub fn temporal(field: impl Into<String>) -> Self {
        Self::new(field, FieldType::Temporal)
    }

    pub fn count() -> Self {
        Self {
            count: true,
            ..Self::new("count()", FieldType::Quantitative)
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn binned(mut self, max_bins: u32) -> Self {
        self.max_bins = Some(max_bins);
        self
    }

    pub fn shorthand(&self) -> String {
        format!("{}:{}", self.field, self.field_type.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub mark: Mark,
    pub x: Option<Encoding>,
    pub y: Option<Encoding>,
    pub theta: Option<Encoding>,
    pub color: Option<Encoding>,
    pub size: Option<Encoding>,
    pub tooltip: Vec<String>,
    pub data: PreparedTable,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>, mark: Mark, data: PreparedTable) -> Self {
        Self {
            title: title.into(),
            mark,
            x: None,
            y: None,
            theta: None,
            color: None,
            size: None,
            tooltip: Vec::new(),
            data,
        }
    }

    pub fn x(mut self, encoding: Encoding) -> Self {
        self.x = Some(encoding);
        self
    }

    pub fn y(mut self, encoding: Encoding) -> Self {
        self.y = Some(encoding);
        self
    }

    pub fn theta(mut self, encoding: Encoding) -> Self {
        self.theta = Some(encoding);
        self
    }

    pub fn color(mut self, encoding: Encoding) -> Self {
        self.color = Some(encoding);
        self
    }

    pub fn size(mut self, encoding: Encoding) -> Self {
        self.size = Some(encoding);
        self
    }

    pub fn tooltip<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tooltip = fields.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricWidget {
    pub label: String,
    pub value: String,
    pub available: bool,
    pub help: Option<String>,
}

impl MetricWidget {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            available: true,
            help: None,
        }
    }

    /// Formats `aggregate`, or shows the not-available state when it has no data.
    pub fn from_aggregate(
        label: impl Into<String>,
        aggregate: Aggregate,
        format: impl Fn(f64) -> String,
    ) -> Self {
        match aggregate {
            Aggregate::Value(value) => Self::new(label, format(value)),
            Aggregate::NoData => Self::unavailable(label),
        }
    }

    pub fn unavailable(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: NOT_AVAILABLE.to_string(),
            available: false,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Panel {
    Metrics { title: String, widgets: Vec<MetricWidget> },
    Chart(ChartSpec),
    Table { title: String, table: PreparedTable },
    Notice { level: NoticeLevel, message: String },
}

impl Panel {
    pub fn info(message: impl Into<String>) -> Self {
        Panel::Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Panel::Notice {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ViewStatus {
    Ready,
    /// The filter matched nothing; render an empty state, not a zeroed chart.
    Empty { reason: String },
    /// The source this view depends on could not be used.
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub title: String,
    pub status: ViewStatus,
    pub panels: Vec<Panel>,
}

impl DashboardView {
    pub fn ready(title: impl Into<String>, panels: Vec<Panel>) -> Self {
        Self {
            title: title.into(),
            status: ViewStatus::Ready,
            panels,
        }
    }

    pub fn empty(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: ViewStatus::Empty {
                reason: reason.into(),
            },
            panels: Vec::new(),
        }
    }

    pub fn unavailable(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: ViewStatus::Unavailable {
                reason: reason.into(),
            },
            panels: Vec::new(),
        }
    }
}

/// `1234567.4` with 0 decimals -> `1,234,567`.
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (whole, fraction) = match formatted.split_once('.') {
        Some((whole, fraction)) => (whole.to_string(), Some(fraction.to_string())),
        None => (formatted, None),
    };

    let mut grouped = String::new();
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && grouped.chars().any(|c| c != '0' && c != ',') {
        "-"
    } else {
        ""
    };
    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(0.0, 0), "0");
        assert_eq!(format_thousands(999.0, 0), "999");
        assert_eq!(format_thousands(1000.0, 0), "1,000");
        assert_eq!(format_thousands(1234567.4, 0), "1,234,567");
        assert_eq!(format_thousands(7654.321, 1), "7,654.3");
        assert_eq!(format_thousands(-2500.0, 0), "-2,500");
    }

    #[test]
    fn no_data_widget_is_labelled_unavailable() {
        let format = |v: f64| format!("{v:.0}");
        let widget =
            MetricWidget::from_aggregate("Average Sleep (mins)", Aggregate::NoData, format);
        assert!(!widget.available);
        assert_eq!(widget.value, NOT_AVAILABLE);

        let widget =
            MetricWidget::from_aggregate("Average Sleep (mins)", Aggregate::Value(421.6), format);
        assert_eq!(widget.value, "422");
    }

    #[test]
    fn table_columns_keep_order() {
        let table = PreparedTable::new()
            .with_column("Source", ["Fitbit Users", "Rafi WHOOP"])
            .with_column("Energy", [Some(2304.0), None]);

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[0].name, "Source");
        assert_eq!(table.column("Energy").unwrap().values[1], FieldValue::Absent);
    }

    #[test]
    fn shorthand_uses_type_tag() {
        assert_eq!(Encoding::new("Date", FieldType::Temporal).shorthand(), "Date:T");
    }

    #[test]
    fn views_serialize_with_state_tag() {
        let view = DashboardView::empty("Fitbit Sleep Insights", "no sleep records for subject 42");
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"]["state"], "empty");
    }
}
