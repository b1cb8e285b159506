//! Funding forecast.
//!
//! The yearly funding series is fitted with additive Holt-Winters
//! exponential smoothing (level and trend, plus an additive seasonal term
//! when a season length is configured). Smoothing constants come from a
//! fixed grid search minimizing the one-step-ahead squared error, so the
//! same series always yields the same model.
//!
//! Prediction intervals use the closed-form variance of the additive
//! model, `σ² (1 + Σ_{j<h} c_j²)`, which never shrinks as the horizon grows.

use super::aggregator::{to_f64, yearly, Tally};
use super::temporal::YearRange;
use super::RunContext;
use crate::models::Dataset;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::{debug, warn};

/// Forecast years summed in the five-year headline figure.
const HEADLINE_YEARS: usize = 5;

/// Fewest observations a model is fitted on.
const MIN_POINTS: usize = 3;

const MIN_BACKTEST_TRAINING: usize = 10;
const MIN_BACKTEST_ACTUALS: usize = 3;

/// Smoothing constants tried for each parameter: 0.05, 0.10, ... 0.95.
fn grid() -> impl Iterator<Item = f64> {
    (1..=19).map(|step| step as f64 / 20.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Smoothing {
    alpha: f64,
    beta: f64,
    gamma: f64,
}

/// State after running the recursions over a whole series.
#[derive(Debug, Clone)]
struct Smoothed {
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    sse: f64,
    scored: usize,
}

fn smooth(series: &[f64], params: Smoothing, season: Option<usize>) -> Smoothed {
    let (mut level, mut trend, mut seasonals, first, scored_from) = match season {
        Some(m) => {
            let head = series[..m].iter().sum::<f64>() / m as f64;
            let next = series[m..2 * m].iter().sum::<f64>() / m as f64;
            let seasonals: Vec<f64> = series[..m].iter().map(|y| y - head).collect();
            (head, (next - head) / m as f64, seasonals, m, m)
        }
        // The first step reproduces y1 exactly, so scoring starts at t = 2.
        None => (series[0], series[1] - series[0], Vec::new(), 1, 2),
    };

    let mut sse = 0.0;
    let mut scored = 0;
    for (t, &y) in series.iter().enumerate().skip(first) {
        let slot = season.map(|m| t % m);
        let seasonal = slot.map_or(0.0, |i| seasonals[i]);

        if t >= scored_from {
            let error = y - (level + trend + seasonal);
            sse += error * error;
            scored += 1;
        }

        let previous = level;
        level = params.alpha * (y - seasonal) + (1.0 - params.alpha) * (level + trend);
        trend = params.beta * (level - previous) + (1.0 - params.beta) * trend;
        if let Some(i) = slot {
            seasonals[i] = params.gamma * (y - level) + (1.0 - params.gamma) * seasonal;
        }
    }

    Smoothed {
        level,
        trend,
        seasonals,
        sse,
        scored,
    }
}

/// A fitted additive Holt-Winters model.
#[derive(Debug, Clone)]
pub struct HoltWinters {
    params: Smoothing,
    season: Option<usize>,
    state: Smoothed,
    points: usize,
}

impl HoltWinters {
    /// Fit on `series` by grid search. `None` when the series is too short.
    ///
    /// A season needs at least two full cycles; shorter series, or a
    /// season length below two, fall back to the non-seasonal model.
    pub fn fit(series: &[f64], season_length: Option<usize>) -> Option<Self> {
        if series.len() < MIN_POINTS {
            return None;
        }
        let season = season_length.filter(|m| *m >= 2 && series.len() >= 2 * m);
        let gammas: Vec<f64> = match season {
            Some(_) => grid().collect(),
            None => vec![0.0],
        };

        let mut best: Option<(Smoothing, Smoothed)> = None;
        for alpha in grid() {
            for beta in grid() {
                for &gamma in &gammas {
                    let params = Smoothing { alpha, beta, gamma };
                    let pass = smooth(series, params, season);
                    // Strict comparison keeps the first of equally good fits.
                    if best.as_ref().map_or(true, |(_, b)| pass.sse < b.sse) {
                        best = Some((params, pass));
                    }
                }
            }
        }

        let (params, state) = best?;
        Some(Self {
            params,
            season,
            state,
            points: series.len(),
        })
    }

    /// Point forecast `h` steps past the last observation.
    pub fn predict(&self, h: usize) -> f64 {
        let seasonal = match self.season {
            Some(m) => self.state.seasonals[(self.points - 1 + h) % m],
            None => 0.0,
        };
        self.state.level + h as f64 * self.state.trend + seasonal
    }

    /// Standard deviation of the one-step errors.
    pub fn sigma(&self) -> f64 {
        if self.state.scored == 0 {
            0.0
        } else {
            (self.state.sse / self.state.scored as f64).sqrt()
        }
    }

    /// Growth of the forecast standard error at horizon `h` relative to one step.
    pub fn spread(&self, h: usize) -> f64 {
        let Smoothing { alpha, beta, gamma } = self.params;
        let sum: f64 = (1..h)
            .map(|j| {
                let seasonal = match self.season {
                    Some(m) if j % m == 0 => gamma,
                    _ => 0.0,
                };
                let c = alpha * (1.0 + j as f64 * beta) + seasonal;
                c * c
            })
            .sum();
        (1.0 + sum).sqrt()
    }

    fn summary(&self) -> ModelSummary {
        ModelSummary {
            alpha: self.params.alpha,
            beta: self.params.beta,
            gamma: self.season.map(|_| self.params.gamma),
            season_length: self.season,
            sigma: self.sigma(),
            training_points: self.points,
        }
    }
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Yearly funding over `years` with excluded and missing interior years
/// linearly interpolated. Leading and trailing gaps are dropped.
fn training_series(
    totals: &BTreeMap<i32, Tally>,
    years: RangeInclusive<i32>,
    excluded: &[i32],
) -> Vec<(i32, f64)> {
    if years.start() > years.end() {
        return Vec::new();
    }
    let known: Vec<(i32, f64)> = totals
        .range(years)
        .filter(|(year, _)| !excluded.contains(year))
        .map(|(year, tally)| (*year, to_f64(tally.funding)))
        .collect();

    let mut series = Vec::new();
    for pair in known.windows(2) {
        let ((from, start), (to, end)) = (pair[0], pair[1]);
        for year in from..to {
            let t = (year - from) as f64 / (to - from) as f64;
            series.push((year, start + t * (end - start)));
        }
    }
    if let Some(last) = known.last() {
        series.push(*last);
    }
    series
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: Option<f64>,
    pub season_length: Option<usize>,
    pub sigma: f64,
    pub training_points: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub predicted_funding: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Funding of projects on record that start in this year.
    pub approved_funding: Option<f64>,
    pub approved_projects: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestYear {
    pub year: i32,
    pub predicted: f64,
    pub actual: f64,
    pub error_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Backtest {
    pub backtest_years: Vec<BacktestYear>,
    pub average_error_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastSummary {
    pub total_predicted_funding_next_5_years: f64,
    pub total_approved_funding_future: f64,
    /// Predicted over approved funding across the horizon.
    pub forecast_vs_approved_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastDocument {
    pub current_year: i32,
    pub last_closed_year: i32,
    pub forecast_horizon_years: usize,
    pub historical_range: Option<YearRange>,
    pub excluded_years: Vec<i32>,
    pub model: Option<ModelSummary>,
    pub forecast: Vec<ForecastPoint>,
    pub backtest: Option<Backtest>,
    pub summary: ForecastSummary,
}

/// Refit with the trailing years held out and score them.
fn backtest(totals: &BTreeMap<i32, Tally>, ctx: &RunContext) -> Option<Backtest> {
    let config = &ctx.config.forecast;
    let last_closed = ctx.last_closed_year();
    let cutoff = last_closed - config.backtest_years as i32;
    if config.backtest_years == 0 || cutoff < config.training_start_year {
        debug!("Skipping backtest: no training years before {}", cutoff + 1);
        return None;
    }

    let training = training_series(
        totals,
        config.training_start_year..=cutoff,
        &config.excluded_years,
    );
    let actuals: Vec<(i32, f64)> = totals
        .range(cutoff + 1..=last_closed)
        .map(|(year, tally)| (*year, to_f64(tally.funding)))
        .collect();
    if training.len() < MIN_BACKTEST_TRAINING || actuals.len() < MIN_BACKTEST_ACTUALS {
        debug!(
            "Skipping backtest: {} training years, {} held-out years",
            training.len(),
            actuals.len()
        );
        return None;
    }

    let values: Vec<f64> = training.iter().map(|(_, value)| *value).collect();
    let model = HoltWinters::fit(&values, config.season_length)?;
    let (last_trained, _) = *training.last()?;

    let backtest_years: Vec<BacktestYear> = actuals
        .into_iter()
        .map(|(year, actual)| {
            let predicted = model.predict((year - last_trained) as usize);
            let error_pct = if actual > 0.0 {
                (predicted - actual).abs() / actual * 100.0
            } else {
                0.0
            };
            BacktestYear {
                year,
                predicted,
                actual,
                error_pct,
            }
        })
        .collect();

    let average_error_pct =
        backtest_years.iter().map(|y| y.error_pct).sum::<f64>() / backtest_years.len() as f64;
    Some(Backtest {
        backtest_years,
        average_error_pct,
    })
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> ForecastDocument {
    let config = &ctx.config.forecast;
    let last_closed = ctx.last_closed_year();
    let totals = yearly(dataset.records());

    let series = training_series(
        &totals,
        config.training_start_year..=last_closed,
        &config.excluded_years,
    );
    let values: Vec<f64> = series.iter().map(|(_, value)| *value).collect();
    let model = HoltWinters::fit(&values, config.season_length);
    match (&model, config.season_length) {
        (None, _) => warn!(
            "Only {} training years between {} and {}; the forecast is empty",
            values.len(),
            config.training_start_year,
            last_closed
        ),
        (Some(model), Some(m)) if model.season.is_none() => warn!(
            "Season length {} needs {} training years, found {}; fitting without a season",
            m,
            2 * m,
            values.len()
        ),
        _ => {}
    }

    // Outside (0, 1) the quantile is undefined.
    let level = config.interval_level.clamp(0.01, 0.99);
    let z = inverse_normal_cdf((1.0 + level) / 2.0);

    let mut forecast = Vec::new();
    if let (Some(model), Some((last_observed, _))) = (&model, series.last()) {
        debug!(
            "Fitted forecast model on {} years: alpha={} beta={} gamma={}",
            values.len(),
            model.params.alpha,
            model.params.beta,
            model.params.gamma
        );
        for offset in 1..=config.horizon_years as i32 {
            let year = last_closed + offset;
            let h = (year - last_observed) as usize;
            let predicted = model.predict(h);
            let margin = z * model.sigma() * model.spread(h);
            let approved = totals.get(&year);
            // Funding is never negative.
            forecast.push(ForecastPoint {
                year,
                predicted_funding: predicted.max(0.0),
                lower_bound: (predicted - margin).max(0.0),
                upper_bound: (predicted + margin).max(0.0),
                approved_funding: approved.map(Tally::total_funding),
                approved_projects: approved.map(|tally| tally.projects),
            });
        }
    }

    let predicted_total: f64 = forecast.iter().map(|p| p.predicted_funding).sum();
    let approved_total: f64 = forecast.iter().filter_map(|p| p.approved_funding).sum();
    let summary = ForecastSummary {
        total_predicted_funding_next_5_years: forecast
            .iter()
            .take(HEADLINE_YEARS)
            .map(|p| p.predicted_funding)
            .sum(),
        total_approved_funding_future: approved_total,
        forecast_vs_approved_ratio: (approved_total > 0.0).then(|| predicted_total / approved_total),
    };

    ForecastDocument {
        current_year: ctx.reference_year(),
        last_closed_year: last_closed,
        forecast_horizon_years: config.horizon_years,
        historical_range: match (series.first(), series.last()) {
            (Some((start, _)), Some((end, _))) => Some(YearRange {
                start: *start,
                end: *end,
            }),
            _ => None,
        },
        excluded_years: config.excluded_years.clone(),
        model: model.as_ref().map(HoltWinters::summary),
        forecast,
        backtest: backtest(&totals, ctx),
        summary,
    }
}
