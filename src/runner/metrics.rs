//! Performance metrics over a per-bar return series.

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-12;

/// Summary statistics of one strategy execution.
///
/// All figures are computed on returns net of trading costs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Compounded return over the window
    #[serde(with = "float_text")]
    pub total_return: f64,
    /// Annualized mean over sample standard deviation
    #[serde(with = "float_text")]
    pub sharpe: f64,
    /// Deepest peak-to-trough loss, zero or negative
    #[serde(with = "float_text")]
    pub max_drawdown: f64,
    /// Average absolute position change per bar, as reported by the strategy
    #[serde(with = "float_text")]
    pub turnover: f64,
    /// Share of bars with a positive return
    #[serde(with = "float_text")]
    pub hit_rate: f64,
    /// Gross gains over gross losses, infinite when nothing was lost
    #[serde(with = "float_text")]
    pub profit_factor: f64,
}

impl Metrics {
    /// Compute metrics from gross per-bar returns.
    ///
    /// Costs are charged as `turnover * costs_bps / 1e4` per bar before any
    /// statistic is taken.
    pub fn compute(returns: &[f64], turnover: f64, costs_bps: f64, periods_per_year: f64) -> Self {
        let drag = turnover * costs_bps / 1e4;
        let net: Vec<f64> = returns.iter().map(|r| r - drag).collect();

        Self {
            total_return: total_return(&net),
            sharpe: sharpe(&net, periods_per_year),
            max_drawdown: max_drawdown(&net),
            turnover,
            hit_rate: hit_rate(&net),
            profit_factor: profit_factor(&net),
        }
    }

    /// Every field as (name, value), in declaration order
    pub fn fields(&self) -> [(&'static str, f64); 6] {
        [
            ("total_return", self.total_return),
            ("sharpe", self.sharpe),
            ("max_drawdown", self.max_drawdown),
            ("turnover", self.turnover),
            ("hit_rate", self.hit_rate),
            ("profit_factor", self.profit_factor),
        ]
    }
}

/// Non-finite floats as "nan", "inf" or "-inf", since JSON has no literal for them.
mod float_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Num(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Wire::deserialize(deserializer)? {
            Wire::Num(v) => Ok(v),
            Wire::Text(s) => match s.as_str() {
                "nan" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!("not a float: {}", other))),
            },
        }
    }
}

pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

pub fn sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
    let n = returns.len();
    if n == 0 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    let var = if n > 1 {
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    mean / (var.sqrt() + EPS) * periods_per_year.sqrt()
}

pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for r in returns {
        equity *= 1.0 + r;
        peak = peak.max(equity);
        worst = worst.min(equity / peak - 1.0);
    }
    worst
}

pub fn hit_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
}

pub fn profit_factor(returns: &[f64]) -> f64 {
    let gains: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| -r).sum();
    if losses > 0.0 {
        gains / losses
    } else if gains > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}
