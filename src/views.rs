//! Dashboard views built from a loaded [`Dataset`].
//!
//! Each view only reads the tables it needs. A missing source turns that
//! one view into an unavailable state; a missing column turns the affected
//! panel into a notice.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::align;
use crate::dataset::{rows_for_subject, subject_ids, Dataset, SourceTable};
use crate::error::DashboardError;
use crate::metrics;
use crate::models::{
    ActivityRecord, FieldValue, PhysiologyRecord, SleepDayRecord, SourceSleepRecord,
};
use crate::periods::{self, BucketStrategy};
use crate::presentation::{
    format_thousands, ChartSpec, DashboardView, Encoding, Mark, MetricWidget, Panel,
    PreparedTable,
};
use crate::schema::{self, activity, physiology, sleep_day, source_sleep, workouts, SourceRecord};
use crate::stats::{self, Aggregate, Extremum};

pub const SOURCE_A: &str = "Fitbit Users";
pub const SOURCE_B: &str = "Rafi WHOOP";

const HISTOGRAM_BINS: u32 = 12;

/// Every view, in tab order.
pub fn build_dashboard(dataset: &Dataset, subject: Option<i64>) -> Vec<DashboardView> {
    let views = vec![
        overview(dataset),
        activity_view(dataset, subject),
        sleep_view(dataset, subject),
        physiology_view(dataset),
        source_sleep_view(dataset),
        comparison_view(dataset),
    ];
    for view in &views {
        debug!(title = %view.title, panels = view.panels.len(), "built view");
    }
    views
}

fn date_help(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => format!("Date: {date}"),
        None => "Date not available".to_string(),
    }
}

fn header<R: SourceRecord>(table: &SourceTable<R>, key: &'static str) -> String {
    schema::display_header(R::schema(), &table.columns, key)
}

fn with_unit(decimals: usize, unit: &'static str) -> impl Fn(f64) -> String + Copy {
    move |value| format!("{value:.decimals$}{unit}")
}

/// Builds the panel only when every column it reads resolved. Otherwise the
/// panel is replaced by a notice naming the first missing column.
fn guarded<R>(
    table: &SourceTable<R>,
    keys: &[&'static str],
    build: impl FnOnce() -> Panel,
) -> Panel {
    match keys.iter().find_map(|key| table.columns.require(*key).err()) {
        Some(err) => {
            debug!(collection = table.columns.collection(), "panel skipped: {err}");
            Panel::warning(err.to_string())
        }
        None => build(),
    }
}

/// Not-available widget, naming the missing column when that is the cause.
fn unavailable_widget<R>(table: &SourceTable<R>, label: &str, key: &'static str) -> MetricWidget {
    let widget = MetricWidget::unavailable(label);
    match table.columns.require(key) {
        Ok(()) => widget,
        Err(err) => widget.with_help(err.to_string()),
    }
}

/// Widget over one column of `rows`. A column the collection lacks is
/// reported on the widget instead of being aggregated as empty.
fn column_widget<R, A, V, F>(
    table: &SourceTable<R>,
    rows: &[R],
    label: &str,
    key: &'static str,
    aggregate: A,
    value: V,
    format: F,
) -> MetricWidget
where
    A: Fn(Vec<Option<f64>>) -> Aggregate,
    V: Fn(&R) -> Option<f64>,
    F: Fn(f64) -> String,
{
    if !table.columns.has(key) {
        return unavailable_widget(table, label, key);
    }
    let values = rows.iter().map(value).collect();
    MetricWidget::from_aggregate(label, aggregate(values), format)
}

/// Stable sort by date with undated rows last.
fn sorted_by_date<R, D>(rows: &[R], date: D) -> Vec<R>
where
    R: Clone,
    D: Fn(&R) -> Option<NaiveDate>,
{
    let mut sorted = rows.to_vec();
    sorted.sort_by_key(|row| (date(row).is_none(), date(row)));
    sorted
}

fn unavailable_source(title: &str, err: DashboardError) -> DashboardView {
    warn!(view = title, "source unusable, view unavailable: {err}");
    DashboardView::unavailable(title, format!("No data loaded: {err}."))
}

pub fn overview(dataset: &Dataset) -> DashboardView {
    fn describe<R>(table: &SourceTable<R>) -> (String, usize, String) {
        (
            table.columns.collection().to_string(),
            table.rows.len(),
            table.headers.join(", "),
        )
    }

    let summaries = [
        describe(&dataset.activity),
        describe(&dataset.sleep_day),
        describe(&dataset.physiology),
        describe(&dataset.source_sleep),
        describe(&dataset.workouts),
    ];

    let table = PreparedTable::new()
        .with_column("Collection", summaries.iter().map(|s| s.0.clone()))
        .with_column("Rows", summaries.iter().map(|s| s.1))
        .with_column("Columns", summaries.iter().map(|s| s.2.clone()));

    let mut panels = vec![Panel::Table {
        title: "Loaded Collections".to_string(),
        table,
    }];
    for (collection, rows, _) in &summaries {
        if *rows == 0 {
            panels.push(Panel::info(format!("`{collection}` is empty.")));
        }
    }

    DashboardView::ready("Overview", panels)
}

pub fn activity_view(dataset: &Dataset, subject: Option<i64>) -> DashboardView {
    const TITLE: &str = "Fitbit User Activity Insights";
    let table = &dataset.activity;
    if let Err(err) = table.require_rows() {
        return unavailable_source(TITLE, err);
    }

    let Some(subject) = subject.or_else(|| subject_ids(&table.rows).first().copied()) else {
        return DashboardView::empty(TITLE, "No subject ids in daily activity.");
    };
    let rows = rows_for_subject(&table.rows, subject);
    if rows.is_empty() {
        let reason = format!("No activity data available for user {subject}.");
        return DashboardView::empty(TITLE, reason);
    }

    let data = PreparedTable::new()
        .with_column("index", 0..rows.len())
        .with_column("Date", rows.iter().map(|r| r.date))
        .with_column("TotalSteps", rows.iter().map(|r| r.total_steps))
        .with_column("Calories", rows.iter().map(|r| r.calories));

    let mut panels = vec![
        guarded(table, &[activity::TOTAL_STEPS], || {
            Panel::Chart(
                ChartSpec::new("Fitbit Total Steps Over Time", Mark::Line, data.clone())
                    .x(Encoding::quantitative("index").titled("Day Index"))
                    .y(Encoding::quantitative("TotalSteps").titled("Total Steps"))
                    .tooltip(["index", "TotalSteps"]),
            )
        }),
        guarded(table, &[activity::CALORIES], || {
            Panel::Chart(
                ChartSpec::new("Fitbit Calories Burned Over Time", Mark::Line, data.clone())
                    .x(Encoding::quantitative("index").titled("Day Index"))
                    .y(Encoding::quantitative("Calories").titled("Calories Burned"))
                    .tooltip(["index", "Calories"]),
            )
        }),
    ];

    let thousands = |v: f64| format_thousands(v, 0);
    let mut widgets = vec![
        column_widget(
            table,
            &rows,
            "Total Steps",
            activity::TOTAL_STEPS,
            stats::sum,
            |r| r.total_steps,
            thousands,
        ),
        column_widget(
            table,
            &rows,
            "Total Calories Burned",
            activity::CALORIES,
            stats::sum,
            |r| r.calories,
            thousands,
        ),
        column_widget(
            table,
            &rows,
            "Avg Daily Steps",
            activity::TOTAL_STEPS,
            stats::mean,
            |r| r.total_steps,
            thousands,
        ),
        column_widget(
            table,
            &rows,
            "Avg Daily Calories",
            activity::CALORIES,
            stats::mean,
            |r| r.calories,
            thousands,
        ),
    ];

    let has_date = table.columns.has(activity::DATE);
    for (label, extremum) in [
        ("Best Day (Most Steps)", Extremum::Max),
        ("Worst Day (Fewest Steps)", Extremum::Min),
    ] {
        let widget = match stats::extremum_by(&rows, extremum, |r| r.total_steps) {
            Some((_, day)) => {
                MetricWidget::new(label, thousands(day.total_steps.unwrap_or_default()))
                    .with_help(date_help(day.date.filter(|_| has_date)))
            }
            None => unavailable_widget(table, label, activity::TOTAL_STEPS),
        };
        widgets.push(widget);
    }
    panels.push(Panel::Metrics {
        title: format!("Summary of User {subject}"),
        widgets,
    });

    panels.push(guarded(table, &[activity::TOTAL_STEPS, activity::CALORIES], || {
        Panel::Chart(
            ChartSpec::new("Steps vs Calories Correlation", Mark::Circle, data)
                .x(Encoding::quantitative("TotalSteps").titled("Total Steps"))
                .y(Encoding::quantitative("Calories").titled("Calories Burned"))
                .tooltip(["index", "TotalSteps", "Calories"]),
        )
    }));

    panels.push(intensity_panel(table, &rows));

    DashboardView::ready(TITLE, panels)
}

fn intensity_panel(table: &SourceTable<ActivityRecord>, rows: &[ActivityRecord]) -> Panel {
    if let Some(missing) = activity::INTENSITY.iter().find(|key| !table.columns.has(key)) {
        warn!(column = *missing, "intensity breakdown skipped");
        return Panel::warning(format!(
            "Intensity data missing. Found columns: {}",
            table.headers.join(", ")
        ));
    }

    let total = |value: fn(&ActivityRecord) -> Option<f64>| stats::sum(rows.iter().map(value));
    let totals = [
        ("High Intensity", total(|r| r.high_intensity_minutes)),
        ("Moderate Intensity", total(|r| r.moderate_intensity_minutes)),
        ("Low Intensity", total(|r| r.low_intensity_minutes)),
        ("Rest", total(|r| r.rest_minutes)),
    ];
    let data = PreparedTable::new()
        .with_column("Category", totals.iter().map(|(name, _)| *name))
        .with_column("Minutes", totals.iter().map(|(_, minutes)| *minutes));

    Panel::Chart(
        ChartSpec::new("Daily Activity Composition Intensity Breakdown", Mark::Arc, data)
            .theta(Encoding::quantitative("Minutes"))
            .color(Encoding::nominal("Category"))
            .tooltip(["Category", "Minutes"]),
    )
}

pub fn sleep_view(dataset: &Dataset, subject: Option<i64>) -> DashboardView {
    const TITLE: &str = "Fitbit Sleep Insights";
    let table = &dataset.sleep_day;
    if let Err(err) = table.require_rows() {
        return unavailable_source(TITLE, err);
    }

    let Some(subject) = subject.or_else(|| subject_ids(&table.rows).first().copied()) else {
        return DashboardView::empty(TITLE, "No subject ids in sleep records.");
    };
    let rows: Vec<SleepDayRecord> = rows_for_subject(&table.rows, subject);
    if rows.is_empty() {
        let reason = format!("No sleep data available for user {subject}.");
        return DashboardView::empty(TITLE, reason);
    }

    let data = PreparedTable::new()
        .with_column("Date", rows.iter().map(|r| r.date))
        .with_column("TotalMinutesAsleep", rows.iter().map(|r| r.minutes_asleep))
        .with_column("TotalTimeInBed", rows.iter().map(|r| r.minutes_in_bed))
        .with_column("SleepEfficiency", rows.iter().map(SleepDayRecord::efficiency));
    let dated_sleep = [sleep_day::DATE, sleep_day::MINUTES_ASLEEP];

    let mut panels = vec![guarded(table, &dated_sleep, || {
        Panel::Chart(
            ChartSpec::new("Sleep Duration Over Time", Mark::Line, data.clone())
                .x(Encoding::temporal("Date").titled("Date"))
                .y(Encoding::quantitative("TotalMinutesAsleep").titled("Minutes Asleep"))
                .tooltip(["Date", "TotalMinutesAsleep"]),
        )
    })];

    let mut widgets = vec![
        column_widget(
            table,
            &rows,
            "Average Sleep (mins)",
            sleep_day::MINUTES_ASLEEP,
            stats::mean,
            |r| r.minutes_asleep,
            with_unit(0, ""),
        ),
        column_widget(
            table,
            &rows,
            "Total Sleep (hrs)",
            sleep_day::MINUTES_ASLEEP,
            |values| stats::sum(values).map(metrics::minutes_to_hours),
            |r| r.minutes_asleep,
            with_unit(1, ""),
        ),
    ];
    for (label, extremum) in [
        ("Best Sleep (mins)", Extremum::Max),
        ("Worst Sleep (mins)", Extremum::Min),
    ] {
        widgets.push(match stats::extremum_by(&rows, extremum, |r| r.minutes_asleep) {
            Some((_, night)) => {
                let minutes = night.minutes_asleep.unwrap_or_default();
                MetricWidget::new(label, format!("{minutes:.0}")).with_help(date_help(night.date))
            }
            None => unavailable_widget(table, label, sleep_day::MINUTES_ASLEEP),
        });
    }
    panels.push(Panel::Metrics {
        title: format!("Summary of User {subject}"),
        widgets,
    });

    panels.push(guarded(table, &dated_sleep, || {
        let by_day_type = periods::day_type_means(&rows, |r| r.date, |r| r.minutes_asleep);
        let day_types = PreparedTable::new()
            .with_column("DayType", by_day_type.iter().map(|(day_type, _)| day_type.label()))
            .with_column("TotalMinutesAsleep", by_day_type.iter().map(|(_, mean)| *mean));
        Panel::Chart(
            ChartSpec::new("Weekday vs Weekend Sleep", Mark::Bar, day_types)
                .x(Encoding::nominal("DayType").titled("Day Type"))
                .y(Encoding::quantitative("TotalMinutesAsleep").titled("Avg Sleep (mins)"))
                .color(Encoding::nominal("DayType"))
                .tooltip(["DayType", "TotalMinutesAsleep"]),
        )
    }));

    let efficiency_columns = [
        sleep_day::DATE,
        sleep_day::MINUTES_ASLEEP,
        sleep_day::MINUTES_IN_BED,
    ];
    panels.push(guarded(table, &efficiency_columns, || {
        Panel::Chart(
            ChartSpec::new("Sleep Efficiency", Mark::Line, data.clone())
                .x(Encoding::temporal("Date").titled("Date"))
                .y(Encoding::quantitative("SleepEfficiency").titled("Sleep Efficiency (%)"))
                .tooltip([
                    "Date",
                    "TotalMinutesAsleep",
                    "TotalTimeInBed",
                    "SleepEfficiency",
                ]),
        )
    }));

    panels.push(guarded(table, &[sleep_day::MINUTES_ASLEEP], || {
        Panel::Chart(
            ChartSpec::new("Sleep Duration", Mark::Bar, data)
                .x(Encoding::quantitative("TotalMinutesAsleep")
                    .titled("Minutes Asleep")
                    .binned(HISTOGRAM_BINS))
                .y(Encoding::count().titled("Count of Records"))
                .tooltip(["count()"]),
        )
    }));

    DashboardView::ready(TITLE, panels)
}

/// Monthly mean of one physiology column, or a notice when it is missing.
fn monthly_panel<V>(
    table: &SourceTable<PhysiologyRecord>,
    title: &str,
    mark: Mark,
    key: &'static str,
    axis_title: &str,
    value: V,
) -> Panel
where
    V: Fn(&PhysiologyRecord) -> Option<f64>,
{
    guarded(table, &[physiology::DATE, key], || {
        let field = header(table, key);
        let buckets =
            periods::bucket_means(&table.rows, BucketStrategy::Monthly, |r| r.date, value);
        let data = PreparedTable::new()
            .with_column("Month", buckets.iter().map(|b| b.label.clone()))
            .with_column(field.clone(), buckets.iter().map(|b| b.mean));
        Panel::Chart(
            ChartSpec::new(title, mark, data)
                .x(Encoding::nominal("Month").titled("Month"))
                .y(Encoding::quantitative(field.clone()).titled(axis_title))
                .tooltip(["Month".to_string(), field]),
        )
    })
}

pub fn physiology_view(dataset: &Dataset) -> DashboardView {
    const TITLE: &str = "Rafi's WHOOP Insights";
    let table = &dataset.physiology;
    if let Err(err) = table.require_rows() {
        return unavailable_source(TITLE, err);
    }
    let rows = &table.rows;

    let mut widgets = vec![
        column_widget(
            table,
            rows,
            "Avg HRV",
            physiology::HRV,
            stats::mean,
            |r| r.hrv_ms,
            with_unit(1, " ms"),
        ),
        column_widget(
            table,
            rows,
            "Avg Resting HR",
            physiology::RESTING_HR,
            stats::mean,
            |r| r.resting_heart_rate_bpm,
            with_unit(1, " bpm"),
        ),
        column_widget(
            table,
            rows,
            "Avg Day Strain",
            physiology::DAY_STRAIN,
            stats::mean,
            |r| r.day_strain,
            with_unit(1, ""),
        ),
        column_widget(
            table,
            rows,
            "HRV Stability",
            physiology::HRV,
            stats::std_dev,
            |r| r.hrv_ms,
            with_unit(1, ""),
        )
        .with_help("Lower standard deviation = more consistent recovery"),
        column_widget(
            table,
            rows,
            "Best HRV Day",
            physiology::HRV,
            stats::max,
            |r| r.hrv_ms,
            with_unit(1, " ms"),
        ),
        column_widget(
            table,
            rows,
            "Best Resting HR",
            physiology::RESTING_HR,
            stats::min,
            |r| r.resting_heart_rate_bpm,
            with_unit(1, " bpm"),
        ),
        column_widget(
            table,
            rows,
            "Avg Energy Burned",
            physiology::ENERGY,
            stats::mean,
            |r| r.energy_burned_cal,
            with_unit(0, " cal"),
        ),
    ];
    // Skin temperature and blood oxygen are optional in exports.
    widgets.push(if table.columns.has(physiology::SKIN_TEMP) {
        column_widget(
            table,
            rows,
            "Avg Skin Temp",
            physiology::SKIN_TEMP,
            stats::mean,
            |r| r.skin_temp_celsius,
            with_unit(1, "°C"),
        )
    } else {
        MetricWidget::new("Avg Skin Temp", "N/A")
    });
    widgets.push(if table.columns.has(physiology::BLOOD_OXYGEN) {
        column_widget(
            table,
            rows,
            "Avg Blood Oxygen",
            physiology::BLOOD_OXYGEN,
            stats::mean,
            |r| r.blood_oxygen_pct,
            with_unit(1, "%"),
        )
    } else {
        MetricWidget::new("Avg Blood Oxygen", "N/A")
    });

    let mut panels = vec![Panel::Metrics {
        title: "WHOOP Recovery Summary".to_string(),
        widgets,
    }];

    panels.push(monthly_panel(
        table,
        "Average Heart Rate Variability (HRV) Trend",
        Mark::Line,
        physiology::HRV,
        "Avg HRV (ms)",
        |r| r.hrv_ms,
    ));
    panels.push(monthly_panel(
        table,
        "Average Resting Heart Rate (RHR) Trend",
        Mark::Line,
        physiology::RESTING_HR,
        "Avg Resting HR (bpm)",
        |r| r.resting_heart_rate_bpm,
    ));
    panels.push(monthly_panel(
        table,
        "Average WHOOP Strain",
        Mark::Bar,
        physiology::DAY_STRAIN,
        "Avg Strain Score",
        |r| r.day_strain,
    ));

    panels.push(guarded(table, &[physiology::DAY_STRAIN, physiology::ENERGY], || {
        let strain = header(table, physiology::DAY_STRAIN);
        let energy = header(table, physiology::ENERGY);
        let scatter = PreparedTable::new()
            .with_column("Date", rows.iter().map(|r| r.date))
            .with_column(strain.clone(), rows.iter().map(|r| r.day_strain))
            .with_column(energy.clone(), rows.iter().map(|r| r.energy_burned_cal));
        Panel::Chart(
            ChartSpec::new("Strain vs Energy Burned", Mark::Circle, scatter)
                .x(Encoding::quantitative(strain.clone()).titled("Day Strain"))
                .y(Encoding::quantitative(energy.clone()).titled("Energy Burned (cal)"))
                .tooltip(["Date".to_string(), strain, energy]),
        )
    }));

    panels.push(workout_panel(dataset));

    DashboardView::ready(TITLE, panels)
}

fn workout_panel(dataset: &Dataset) -> Panel {
    let table = &dataset.workouts;
    if let Err(err) = table.require_rows() {
        return Panel::warning(format!("No workouts loaded: {err}."));
    }

    let columns = [
        workouts::ACTIVITY_NAME,
        workouts::DURATION,
        workouts::STRAIN,
        workouts::ENERGY,
    ];
    guarded(table, &columns, || {
        let name = header(table, workouts::ACTIVITY_NAME);
        let duration = header(table, workouts::DURATION);
        let strain = header(table, workouts::STRAIN);
        let energy = header(table, workouts::ENERGY);

        let rows = &table.rows;
        let data = PreparedTable::new()
            .with_column("Date", rows.iter().map(|r| r.date))
            .with_column(name.clone(), rows.iter().map(|r| r.activity_name.clone()))
            .with_column(duration.clone(), rows.iter().map(|r| r.duration_minutes))
            .with_column(strain.clone(), rows.iter().map(|r| r.activity_strain))
            .with_column(energy.clone(), rows.iter().map(|r| r.energy_burned_cal));

        Panel::Chart(
            ChartSpec::new("Strain vs Activity", Mark::Circle, data)
                .x(Encoding::quantitative(duration.clone()).titled("Workout Duration (min)"))
                .y(Encoding::quantitative(strain.clone()).titled("Strain Score"))
                .size(Encoding::quantitative(energy.clone()))
                .color(Encoding::nominal(name.clone()))
                .tooltip(["Date".to_string(), name, duration, strain, energy]),
        )
    })
}

pub fn source_sleep_view(dataset: &Dataset) -> DashboardView {
    const TITLE: &str = "WHOOP Sleep Insights";
    let table = &dataset.source_sleep;
    if let Err(err) = table.require_rows() {
        return unavailable_source(TITLE, err);
    }

    let rows = sorted_by_date(&table.rows, |r| r.date);

    let mut widgets = vec![
        column_widget(
            table,
            &rows,
            "Avg Sleep Needed (hrs)",
            source_sleep::SLEEP_NEED,
            stats::mean,
            |r| r.sleep_need_minutes,
            |v| format!("{:.1}", metrics::minutes_to_hours(v)),
        ),
        column_widget(
            table,
            &rows,
            "Avg Sleep Performance",
            source_sleep::PERFORMANCE,
            stats::mean,
            |r| r.performance_pct,
            with_unit(0, "%"),
        ),
    ];
    for (label, extremum) in [("Best Night", Extremum::Max), ("Worst Night", Extremum::Min)] {
        widgets.push(match stats::extremum_by(&rows, extremum, |r| r.performance_pct) {
            Some((_, night)) => {
                let performance = FieldValue::from(night.performance_pct);
                MetricWidget::new(label, format!("{performance}%"))
                    .with_help(date_help(night.date))
            }
            None => unavailable_widget(table, label, source_sleep::PERFORMANCE),
        });
    }
    let mut panels = vec![Panel::Metrics {
        title: "Sleep Summary Metrics".to_string(),
        widgets,
    }];

    let stage_columns = [
        source_sleep::DATE,
        source_sleep::LIGHT,
        source_sleep::DEEP,
        source_sleep::REM,
    ];
    panels.push(guarded(table, &stage_columns, || {
        let buckets = periods::bucket_means(
            &rows,
            BucketStrategy::FixedHalfYear,
            |r| r.date,
            SourceSleepRecord::total_sleep_minutes,
        );
        let data = PreparedTable::new()
            .with_column("HalfYear", buckets.iter().map(|b| b.label.clone()))
            .with_column("SleepDuration", buckets.iter().map(|b| b.mean));
        Panel::Chart(
            ChartSpec::new("Sleep Duration", Mark::Bar, data)
                .x(Encoding::nominal("HalfYear").titled("6 Month Period"))
                .y(Encoding::quantitative("SleepDuration").titled("Avg Sleep Duration (min)"))
                .tooltip(["HalfYear", "SleepDuration"]),
        )
    }));

    panels.push(guarded(table, &[source_sleep::DATE, source_sleep::PERFORMANCE], || {
        let performance = header(table, source_sleep::PERFORMANCE);
        let segments = periods::bucket_means(
            &rows,
            BucketStrategy::RollingSixMonth,
            |r| r.date,
            |r| r.performance_pct,
        );
        let data = PreparedTable::new()
            .with_column("SegmentLabel", segments.iter().map(|b| b.label.clone()))
            .with_column(performance.clone(), segments.iter().map(|b| b.mean));
        Panel::Chart(
            ChartSpec::new("Sleep Performance", Mark::Bar, data)
                .x(Encoding::nominal("SegmentLabel").titled("6 Month Period"))
                .y(Encoding::quantitative(performance.clone()).titled("Avg Sleep Performance (%)"))
                .tooltip(["SegmentLabel".to_string(), performance]),
        )
    }));

    panels.push(guarded(table, &[source_sleep::SLEEP_NEED], || {
        let need = header(table, source_sleep::SLEEP_NEED);
        let histogram = PreparedTable::new()
            .with_column(need.clone(), rows.iter().map(|r| r.sleep_need_minutes));
        Panel::Chart(
            ChartSpec::new("Distribution of Sleep Duration", Mark::Bar, histogram)
                .x(Encoding::quantitative(need)
                    .titled("Sleep Duration (min)")
                    .binned(HISTOGRAM_BINS))
                .y(Encoding::count().titled("Count of Nights"))
                .tooltip(["count()"]),
        )
    }));

    DashboardView::ready(TITLE, panels)
}

fn source_bar(title: &str, field: &str, axis_title: &str, values: [Aggregate; 2]) -> Panel {
    let data = PreparedTable::new()
        .with_column("Source", [SOURCE_A, SOURCE_B])
        .with_column(field, values);
    Panel::Chart(
        ChartSpec::new(title, Mark::Bar, data)
            .x(Encoding::nominal("Source").titled("Data Source"))
            .y(Encoding::quantitative(field).titled(axis_title))
            .color(Encoding::nominal("Source"))
            .tooltip(["Source".to_string(), field.to_string()]),
    )
}

/// Row-position pairing of the two sources. Dates play no part here.
pub fn positional_comparison(dataset: &Dataset) -> PreparedTable {
    let pairs = align::positional_join(&dataset.activity.rows, &dataset.physiology.rows);
    PreparedTable::new()
        .with_column("Fitbit Calories", pairs.iter().map(|(a, _)| a.calories))
        .with_column("WHOOP Energy Burn", pairs.iter().map(|(_, b)| b.energy_burned_cal))
        .with_column("Fitbit Steps", pairs.iter().map(|(a, _)| a.total_steps))
        .with_column("WHOOP Day Strain", pairs.iter().map(|(_, b)| b.day_strain))
}

/// Per-date mean source A calories, each paired with the nearest-dated
/// source B energy reading.
pub fn nearest_energy_comparison(dataset: &Dataset) -> crate::error::Result<PreparedTable> {
    let calories: Vec<(NaiveDate, Aggregate)> =
        periods::daily_means(&dataset.activity.rows, |r| r.date, |r| r.calories);
    let energy: Vec<(NaiveDate, Option<f64>)> =
        sorted_by_date(&dataset.physiology.rows, |r| r.date)
            .into_iter()
            .filter_map(|r| r.date.map(|date| (date, r.energy_burned_cal)))
            .collect();

    let joined = align::nearest_date_join(&calories, &energy)?;
    Ok(PreparedTable::new()
        .with_column("Date", joined.iter().map(|m| Some(m.date)))
        .with_column("Calories", joined.iter().map(|m| m.left))
        .with_column("WHOOP Date", joined.iter().map(|m| m.matched_date))
        .with_column("WHOOP Energy", joined.iter().map(|m| m.right.flatten())))
}

pub fn comparison_view(dataset: &Dataset) -> DashboardView {
    const TITLE: &str = "WHOOP vs Fitbit Comparison Metrics";
    let mut panels = Vec::new();

    let energy_ready = !dataset.activity.is_empty() && !dataset.physiology.is_empty();
    let sleep_ready = !dataset.sleep_day.is_empty() && !dataset.source_sleep.is_empty();

    if energy_ready {
        panels.push(Panel::Table {
            title: "Row-Aligned Comparison".to_string(),
            table: positional_comparison(dataset),
        });
        match nearest_energy_comparison(dataset) {
            Ok(table) => panels.push(Panel::Table {
                title: "Daily Calories vs Nearest WHOOP Energy".to_string(),
                table,
            }),
            Err(err) => panels.push(Panel::warning(format!("Date alignment failed: {err}"))),
        }
        panels.push(source_bar(
            "Average Daily Calories Burned",
            "Energy",
            "Average Daily Energy (Calories)",
            [
                stats::mean(dataset.activity.rows.iter().map(|r| r.calories)),
                stats::mean(dataset.physiology.rows.iter().map(|r| r.energy_burned_cal)),
            ],
        ));
    } else {
        panels.push(Panel::warning(
            "Energy comparison needs both daily activity and physiology data.",
        ));
    }

    if sleep_ready {
        let whoop_sleep = &dataset.source_sleep.rows;
        panels.push(source_bar(
            "Sleep Quality Duration",
            "SleepMinutes",
            "Average Sleep Duration (min)",
            [
                stats::mean(dataset.sleep_day.rows.iter().map(|r| r.minutes_asleep)),
                stats::mean(whoop_sleep.iter().map(SourceSleepRecord::total_sleep_minutes)),
            ],
        ));
        panels.push(source_bar(
            "Sleep Quality Comparison",
            "Value",
            "Average Sleep Quality (%)",
            [
                stats::mean(dataset.sleep_day.rows.iter().map(SleepDayRecord::efficiency)),
                stats::mean(whoop_sleep.iter().map(|r| r.performance_pct)),
            ],
        ));
    } else {
        panels.push(Panel::warning("Sleep comparison needs sleep data from both sources."));
    }

    if !energy_ready && !sleep_ready {
        warn!(view = TITLE, "no source pair available; view unavailable");
        return DashboardView::unavailable(TITLE, "Neither source pair has data to compare.");
    }

    DashboardView::ready(TITLE, panels)
}
