//! Renders the unified table as a standalone HTML page holding one SVG line
//! chart, one trace per market. The page references no external assets: the
//! chart is drawn here and the small legend script is inlined.

use crate::constants::{
    CHART_HEIGHT, CHART_TICK_ANGLE, CHART_TITLE, CHART_WIDTH, CHART_Y_LABEL, DARK24,
};
use crate::error::Result;
use crate::types::UnifiedTable;
use askama::Template;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// Legend click toggles a market's trace.
const CHART_SCRIPT: &str = include_str!("../assets/chart.js");

const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 230.0;
const MARGIN_TOP: f64 = 80.0;
const MARGIN_BOTTOM: f64 = 120.0;
const MAX_X_TICKS: usize = 12;
const Y_TICK_TARGET: f64 = 6.0;
const LEGEND_ROW_HEIGHT: f64 = 18.0;

/// Linear map from a data interval onto a pixel interval
#[derive(Debug, Clone, Copy)]
struct Scale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl Scale {
    /// A degenerate domain is widened so its single value lands mid-range
    fn new(lo: f64, hi: f64, range: (f64, f64)) -> Self {
        let domain = if hi > lo { (lo, hi) } else { (lo - 0.5, lo + 0.5) };
        Self { domain, range }
    }

    fn map(&self, value: f64) -> f64 {
        let t = (value - self.domain.0) / (self.domain.1 - self.domain.0);
        self.range.0 + t * (self.range.1 - self.range.0)
    }
}

struct Tick {
    pos: String,
    label: String,
}

struct Marker {
    cx: String,
    cy: String,
    tooltip: String,
}

struct TraceView {
    name: String,
    color: &'static str,
    points: String,
    markers: Vec<Marker>,
    legend_y: String,
}

struct PlotArea {
    left: String,
    top: String,
    right: String,
    bottom: String,
    width: String,
    height: String,
}

struct LegendView {
    title_y: String,
    x: String,
    swatch_end: String,
    text_x: String,
}

#[derive(Template)]
#[template(path = "chart.html")]
struct ChartPage {
    title: &'static str,
    y_label: &'static str,
    width: u32,
    height: u32,
    tick_angle: i32,
    title_x: String,
    y_label_x: String,
    y_label_y: String,
    y_tick_x: String,
    x_tick_y: String,
    plot: PlotArea,
    x_ticks: Vec<Tick>,
    y_ticks: Vec<Tick>,
    traces: Vec<TraceView>,
    legend: LegendView,
    script: &'static str,
}

fn px(value: f64) -> String {
    format!("{value:.1}")
}

/// `.0%` axis label
fn percent_label(value: f64) -> String {
    format!("{:.0}%", (value * 100.0).round() + 0.0)
}

fn percent_detail(value: f64) -> String {
    format!("{:.1}%", value * 100.0 + 0.0)
}

fn day_number(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce())
}

/// Round tick spacing (1, 2 or 5 times a power of ten) giving roughly
/// `target` intervals over `span`.
fn nice_step(span: f64, target: f64) -> f64 {
    let raw = span / target;
    let magnitude = 10f64.powf(raw.log10().floor());
    let nice = match raw / magnitude {
        r if r <= 1.0 => 1.0,
        r if r <= 2.0 => 2.0,
        r if r <= 5.0 => 5.0,
        _ => 10.0,
    };
    nice * magnitude
}

/// Axis bounds snapped outward to the tick grid, plus the tick values
fn value_ticks(lo: f64, hi: f64) -> (f64, f64, Vec<f64>) {
    let (lo, hi) = if hi > lo {
        (lo, hi)
    } else {
        let pad = if lo != 0.0 { lo.abs() * 0.1 } else { 0.01 };
        (lo - pad, hi + pad)
    };
    let step = nice_step(hi - lo, Y_TICK_TARGET);
    let start = (lo / step).floor() * step;
    let end = (hi / step).ceil() * step;
    let intervals = ((end - start) / step).round() as usize;
    let ticks = (0..=intervals).map(|i| start + step * i as f64).collect();
    (start, end, ticks)
}

impl ChartPage {
    fn layout(table: &UnifiedTable) -> Self {
        let width = f64::from(CHART_WIDTH);
        let height = f64::from(CHART_HEIGHT);
        let (left, right) = (MARGIN_LEFT, width - MARGIN_RIGHT);
        let (top, bottom) = (MARGIN_TOP, height - MARGIN_BOTTOM);

        let dates: BTreeSet<NaiveDate> = table.rows().iter().map(|r| r.record.date).collect();
        let x_scale = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => {
                Scale::new(day_number(*first), day_number(*last), (left, right))
            }
            _ => Scale::new(0.0, 1.0, (left, right)),
        };

        let values = table.rows().iter().map(|r| r.record.annual_volatility);
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let (lo, hi) = if lo.is_finite() { (lo, hi) } else { (0.0, 1.0) };
        let (y_lo, y_hi, y_values) = value_ticks(lo, hi);
        let y_scale = Scale::new(y_lo, y_hi, (bottom, top));

        let stride = dates.len().div_ceil(MAX_X_TICKS).max(1);
        let x_ticks = dates
            .iter()
            .step_by(stride)
            .map(|date| Tick {
                pos: px(x_scale.map(day_number(*date))),
                label: date.format("%Y-%m-%d").to_string(),
            })
            .collect();
        let y_ticks = y_values
            .into_iter()
            .map(|v| Tick {
                pos: px(y_scale.map(v)),
                label: percent_label(v),
            })
            .collect();

        let legend_x = right + 30.0;
        let traces = table
            .markets()
            .into_iter()
            .enumerate()
            .map(|(i, market)| {
                let coords: Vec<(f64, f64)> = table
                    .series(market)
                    .map(|r| {
                        let x = x_scale.map(day_number(r.record.date));
                        (x, y_scale.map(r.record.annual_volatility))
                    })
                    .collect();
                let markers = table
                    .series(market)
                    .zip(&coords)
                    .map(|(r, (x, y))| Marker {
                        cx: px(*x),
                        cy: px(*y),
                        tooltip: format!(
                            "{market}\ndate: {}\nAnnual Volatility: {}\nChange since first: {}",
                            r.record.date.format("%Y-%m-%d"),
                            percent_detail(r.record.annual_volatility),
                            percent_detail(r.pct_change)
                        ),
                    })
                    .collect();
                TraceView {
                    name: market.to_string(),
                    color: DARK24[i % DARK24.len()],
                    points: coords
                        .iter()
                        .map(|(x, y)| format!("{},{}", px(*x), px(*y)))
                        .collect::<Vec<_>>()
                        .join(" "),
                    markers,
                    legend_y: px(top + 22.0 + LEGEND_ROW_HEIGHT * i as f64),
                }
            })
            .collect();

        Self {
            title: CHART_TITLE,
            y_label: CHART_Y_LABEL,
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
            tick_angle: CHART_TICK_ANGLE,
            title_x: px(width / 2.0),
            y_label_x: px(24.0),
            y_label_y: px((top + bottom) / 2.0),
            y_tick_x: px(left - 8.0),
            x_tick_y: px(bottom + 14.0),
            plot: PlotArea {
                left: px(left),
                top: px(top),
                right: px(right),
                bottom: px(bottom),
                width: px(right - left),
                height: px(bottom - top),
            },
            x_ticks,
            y_ticks,
            traces,
            legend: LegendView {
                title_y: px(top),
                x: px(legend_x),
                swatch_end: px(legend_x + 24.0),
                text_x: px(legend_x + 30.0),
            },
            script: CHART_SCRIPT,
        }
    }
}

/// Render the full HTML document.
pub fn render_chart(table: &UnifiedTable) -> Result<String> {
    Ok(ChartPage::layout(table).render()?)
}

/// Render the chart and write it to `path`, creating parent directories.
pub fn write_chart(table: &UnifiedTable, path: &Path) -> Result<()> {
    let html = render_chart(table)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &html)?;
    info!("Wrote chart ({} bytes) to {}", html.len(), path.display());
    Ok(())
}
