//! Per-station electricity price series.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Normal distribution parameters for generated prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceParams {
    pub charge_mean: f64,
    pub charge_std: f64,
    pub discharge_mean: f64,
    pub discharge_std: f64,
}

impl Default for PriceParams {
    fn default() -> Self {
        Self {
            charge_mean: -0.05,
            charge_std: 0.05,
            discharge_mean: 0.1,
            discharge_std: 0.05,
        }
    }
}

/// Charge and discharge prices indexed by `(station, step)`.
///
/// Charge prices are non-positive (a cost per kWh charged), discharge prices
/// are non-negative (revenue per kWh discharged). Both matrices are fixed
/// for the duration of an episode. Deserialized series go through the same
/// shape checks as [`PriceSeries::from_matrices`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PriceMatrices")]
pub struct PriceSeries {
    charge: Vec<Vec<f64>>,
    discharge: Vec<Vec<f64>>,
}

/// Unchecked wire form of [`PriceSeries`].
#[derive(Deserialize)]
struct PriceMatrices {
    charge: Vec<Vec<f64>>,
    discharge: Vec<Vec<f64>>,
}

impl TryFrom<PriceMatrices> for PriceSeries {
    type Error = ConfigError;

    fn try_from(m: PriceMatrices) -> Result<Self, Self::Error> {
        Self::from_matrices(m.charge, m.discharge)
    }
}

impl PriceSeries {
    /// Draws both matrices from normal distributions and folds them onto
    /// their sign: `-|x|` for charge prices, `|x|` for discharge prices.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a standard deviation is negative or not finite.
    pub fn generate<R: Rng>(
        n_stations: usize,
        length: usize,
        params: &PriceParams,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        let charge_dist = Normal::new(params.charge_mean, params.charge_std).map_err(|e| {
            ConfigError::new("prices.charge_std", format!("invalid distribution: {e}"))
        })?;
        let discharge_dist =
            Normal::new(params.discharge_mean, params.discharge_std).map_err(|e| {
                ConfigError::new("prices.discharge_std", format!("invalid distribution: {e}"))
            })?;

        let charge = (0..n_stations)
            .map(|_| {
                (0..length)
                    .map(|_| -charge_dist.sample(rng).abs())
                    .collect()
            })
            .collect();
        let discharge = (0..n_stations)
            .map(|_| {
                (0..length)
                    .map(|_| discharge_dist.sample(rng).abs())
                    .collect()
            })
            .collect();

        Ok(Self { charge, discharge })
    }

    /// Builds a series from explicit matrices.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the matrices differ in shape or rows differ in length.
    pub fn from_matrices(
        charge: Vec<Vec<f64>>,
        discharge: Vec<Vec<f64>>,
    ) -> Result<Self, ConfigError> {
        if charge.len() != discharge.len() {
            return Err(ConfigError::new(
                "prices",
                format!(
                    "charge prices cover {} stations, discharge prices {}",
                    charge.len(),
                    discharge.len()
                ),
            ));
        }
        let ragged = charge
            .iter()
            .chain(&discharge)
            .any(|row| row.len() != charge.first().map_or(0, Vec::len));
        if ragged {
            return Err(ConfigError::new(
                "prices",
                "every price row must have the same length".to_string(),
            ));
        }
        Ok(Self { charge, discharge })
    }

    /// Charge price for `station` at `step`.
    pub fn charge(&self, station: usize, step: usize) -> f64 {
        self.charge[station][step]
    }

    /// Discharge price for `station` at `step`.
    pub fn discharge(&self, station: usize, step: usize) -> f64 {
        self.discharge[station][step]
    }

    /// Number of stations covered.
    pub fn n_stations(&self) -> usize {
        self.charge.len()
    }

    /// Number of steps covered per station.
    pub fn length(&self) -> usize {
        self.charge.first().map_or(0, Vec::len)
    }

    pub fn charge_matrix(&self) -> &[Vec<f64>] {
        &self.charge
    }

    pub fn discharge_matrix(&self) -> &[Vec<f64>] {
        &self.discharge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn generated_prices_have_shape_and_sign() {
        let mut rng = StdRng::seed_from_u64(7);
        let prices = PriceSeries::generate(3, 50, &PriceParams::default(), &mut rng)
            .expect("default params are valid");
        assert_eq!(prices.n_stations(), 3);
        assert_eq!(prices.length(), 50);
        for s in 0..3 {
            for t in 0..50 {
                assert!(prices.charge(s, t) <= 0.0);
                assert!(prices.discharge(s, t) >= 0.0);
            }
        }
    }

    #[test]
    fn generation_is_deterministic_for_seed() {
        let a = PriceSeries::generate(
            2,
            10,
            &PriceParams::default(),
            &mut StdRng::seed_from_u64(1),
        );
        let b = PriceSeries::generate(
            2,
            10,
            &PriceParams::default(),
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(a.ok(), b.ok());
    }

    #[test]
    fn negative_std_is_rejected() {
        let params = PriceParams {
            charge_std: -1.0,
            ..PriceParams::default()
        };
        let err = PriceSeries::generate(1, 1, &params, &mut StdRng::seed_from_u64(0));
        assert!(err.is_err_and(|e| e.field == "prices.charge_std"));
    }

    #[test]
    fn mismatched_matrices_are_rejected() {
        let err = PriceSeries::from_matrices(vec![vec![-0.1; 3]], vec![]);
        assert!(err.is_err());
        let err = PriceSeries::from_matrices(vec![vec![-0.1; 3]], vec![vec![0.1; 2]]);
        assert!(err.is_err());
        let ok = PriceSeries::from_matrices(vec![vec![-0.1; 3]], vec![vec![0.1; 3]]);
        assert_eq!(ok.map(|p| p.length()).ok(), Some(3));
    }

    #[test]
    fn ragged_rows_fail_to_deserialize() {
        let short_row = r#"{"charge":[[0,0],[0,0]],"discharge":[[0,0],[0]]}"#;
        assert!(serde_json::from_str::<PriceSeries>(short_row).is_err());

        let missing_row = r#"{"charge":[[-0.1],[-0.1]],"discharge":[[0.1]]}"#;
        assert!(serde_json::from_str::<PriceSeries>(missing_row).is_err());

        let ok = r#"{"charge":[[-0.1,-0.2]],"discharge":[[0.1,0.2]]}"#;
        let prices = serde_json::from_str::<PriceSeries>(ok).unwrap();
        assert_eq!(prices.discharge(0, 1), 0.2);
    }
}
