//! Monte Carlo sampling of eruption physical parameters
//!
//! Every parameter is drawn `n` times from a fixed statistical law and reduced
//! to point estimates. Draws happen parameter by parameter in declaration
//! order, so a seeded source always yields the same estimates.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use rand_distr::{Beta, Distribution, Gamma, Normal, Triangular};
use serde::{Deserialize, Serialize};

use crate::{invalid, EjectaError, Result};

/// Default number of draws per parameter
pub const DEFAULT_SAMPLE_COUNT: usize = 1_000;

/// Reference mass discharge rate the launch speeds are calibrated against [kg/s]
pub const REFERENCE_MASS_DISCHARGE_RATE: f64 = 1.5e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterName {
    MixtureDensity,
    MassDischargeRate,
    MagmaTemperature,
    VolatileContent,
    GasConstant,
    Cva,
    Cvg,
    Cvs,
}

impl ParameterName {
    pub fn label(self) -> &'static str {
        match self {
            ParameterName::MixtureDensity => "Initial Mixture Density (kg/m^3)",
            ParameterName::MassDischargeRate => "Mass Discharge Rate (kg/s)",
            ParameterName::MagmaTemperature => "Magma Temperature (K)",
            ParameterName::VolatileContent => "Volatile Content (%)",
            ParameterName::GasConstant => "Gas Constant",
            ParameterName::Cva => "Cva",
            ParameterName::Cvg => "Cvg",
            ParameterName::Cvs => "Cvs",
        }
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Statistical law of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "law")]
pub enum ParameterLaw {
    Normal { mean: f64, std_dev: f64 },
    /// Beta(alpha, beta) stretched onto `[0, scale]`
    ScaledBeta { alpha: f64, beta: f64, scale: f64 },
    Triangular { min: f64, mode: f64, max: f64 },
    Gamma { shape: f64, scale: f64 },
}

impl ParameterLaw {
    /// Draw `n` values
    pub fn draw<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        let values = match *self {
            ParameterLaw::Normal { mean, std_dev } => {
                let dist = Normal::new(mean, std_dev).map_err(distribution_error)?;
                (0..n).map(|_| dist.sample(rng)).collect()
            }
            ParameterLaw::ScaledBeta { alpha, beta, scale } => {
                let dist = Beta::new(alpha, beta).map_err(distribution_error)?;
                (0..n).map(|_| dist.sample(rng) * scale).collect()
            }
            ParameterLaw::Triangular { min, mode, max } => {
                let dist = Triangular::new(min, max, mode).map_err(distribution_error)?;
                (0..n).map(|_| dist.sample(rng)).collect()
            }
            ParameterLaw::Gamma { shape, scale } => {
                let dist = Gamma::new(shape, scale).map_err(distribution_error)?;
                (0..n).map(|_| dist.sample(rng)).collect()
            }
        };
        Ok(values)
    }

    /// Analytical mean of the law
    pub fn expected_mean(&self) -> f64 {
        match *self {
            ParameterLaw::Normal { mean, .. } => mean,
            ParameterLaw::ScaledBeta { alpha, beta, scale } => scale * alpha / (alpha + beta),
            ParameterLaw::Triangular { min, mode, max } => (min + mode + max) / 3.0,
            ParameterLaw::Gamma { shape, scale } => shape * scale,
        }
    }
}

fn distribution_error(error: impl fmt::Display) -> EjectaError {
    EjectaError::Distribution(error.to_string())
}

/// Which point estimates to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    MeanOnly,
    #[default]
    MeanAndStdDev,
}

/// Point estimate of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterEstimate {
    pub mean: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

/// Sampled eruption conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EruptionParameterSample {
    /// Draws per parameter
    pub n: usize,
    pub estimates: BTreeMap<ParameterName, ParameterEstimate>,
}

impl EruptionParameterSample {
    pub fn mean(&self, name: ParameterName) -> Option<f64> {
        self.estimates.get(&name).map(|e| e.mean)
    }

    pub fn std_dev(&self, name: ParameterName) -> Option<f64> {
        self.estimates.get(&name).and_then(|e| e.std_dev)
    }

    /// Ratio of the sampled mass discharge rate to the reference rate
    pub fn discharge_ratio(&self) -> f64 {
        self.mean(ParameterName::MassDischargeRate)
            .map(|rate| rate / REFERENCE_MASS_DISCHARGE_RATE)
            .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
            .unwrap_or(1.0)
    }
}

/// Draws eruption parameters from their declared laws
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSampler {
    laws: Vec<(ParameterName, ParameterLaw)>,
    reduction: Reduction,
}

impl ParameterSampler {
    pub fn new(laws: Vec<(ParameterName, ParameterLaw)>, reduction: Reduction) -> Self {
        Self { laws, reduction }
    }

    /// Laws of the reference eruption
    pub fn eruption(reduction: Reduction) -> Self {
        let laws = vec![
            (
                ParameterName::MixtureDensity,
                ParameterLaw::Normal {
                    mean: 5.74,
                    std_dev: 0.5,
                },
            ),
            (
                ParameterName::MassDischargeRate,
                ParameterLaw::Normal {
                    mean: REFERENCE_MASS_DISCHARGE_RATE,
                    std_dev: 1e5,
                },
            ),
            (
                ParameterName::MagmaTemperature,
                ParameterLaw::Normal {
                    mean: 1273.15,
                    std_dev: 50.0,
                },
            ),
            (
                ParameterName::VolatileContent,
                ParameterLaw::ScaledBeta {
                    alpha: 3.0,
                    beta: 2.0,
                    scale: 100.0,
                },
            ),
            (
                ParameterName::GasConstant,
                ParameterLaw::Normal {
                    mean: 462.0,
                    std_dev: 50.0,
                },
            ),
            (
                ParameterName::Cva,
                ParameterLaw::Triangular {
                    min: 680.0,
                    mode: 710.0,
                    max: 740.0,
                },
            ),
            (
                ParameterName::Cvg,
                ParameterLaw::Gamma {
                    shape: 2.0,
                    scale: 0.5,
                },
            ),
            (
                ParameterName::Cvs,
                ParameterLaw::Normal {
                    mean: 1100.0,
                    std_dev: 100.0,
                },
            ),
        ];
        Self::new(laws, reduction)
    }

    pub fn laws(&self) -> &[(ParameterName, ParameterLaw)] {
        &self.laws
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    /// Draw `n` values per parameter and reduce them to point estimates
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<EruptionParameterSample> {
        if n == 0 {
            return Err(invalid("sample count must be greater than zero"));
        }

        let mut estimates = BTreeMap::new();
        for (name, law) in &self.laws {
            let values = law.draw(n, rng)?;
            let mean = mean(&values);
            let std_dev = match self.reduction {
                Reduction::MeanOnly => None,
                Reduction::MeanAndStdDev => Some(std_dev(&values, mean)),
            };
            estimates.insert(*name, ParameterEstimate { mean, std_dev });
        }

        Ok(EruptionParameterSample { n, estimates })
    }
}

impl Default for ParameterSampler {
    fn default() -> Self {
        Self::eruption(Reduction::default())
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`)
pub(crate) fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / values.len() as f64).sqrt()
}
