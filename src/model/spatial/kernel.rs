//! Spatial movement kernels.
//!
//! Each kernel maps a source location to an unnormalised attraction vector
//! over destinations; destination choice is a categorical draw over that
//! vector. Self-moves are excluded (zero distance maps to zero). The variant
//! set is fixed at configuration time.

use crate::model::spatial::location::DistanceMatrix;

#[derive(Debug, Clone)]
pub enum MovementKernel {
    /// Gravity model: kappa * N_i^alpha * N_j^beta / d_ij^gamma.
    Wesolowski {
        kappa: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
    },
    /// Wesolowski divided by (1 + tau_i + tau_j), tau a normalised travel
    /// surface.
    WesolowskiSurface {
        kappa: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
        travel: Vec<f64>,
    },
    /// N_i^tau * (1 + d_ij/rho)^(-alpha), kernel precomputed.
    Marshall { tau: f64, alpha: f64, rho: f64 },
    /// Marshall-style with a travel surface and an intra-capital penalty.
    BurkinaFaso {
        tau: f64,
        alpha: f64,
        rho: f64,
        penalty: f64,
        travel: Vec<f64>,
        in_capital: Vec<bool>,
    },
    /// (d_ij + r_g0)^(-beta_r) * exp(-d_ij / kappa).
    Barabasi { r_g0: f64, beta_r: f64, kappa: f64 },
}

pub struct MovementModel {
    kernel: MovementKernel,
    distances: DistanceMatrix,
}

impl MovementModel {
    #[must_use]
    pub fn new(kernel: MovementKernel, distances: DistanceMatrix) -> Self {
        Self { kernel, distances }
    }

    #[must_use]
    pub fn kernel(&self) -> &MovementKernel {
        &self.kernel
    }

    /// Unnormalised attraction from `from` to every destination.
    #[must_use]
    pub fn relative_out_movement(&self, from: usize, residents: &[usize]) -> Vec<f64> {
        let n = residents.len();
        let mut out = vec![0.0; n];
        for to in 0..n {
            let distance = self.distances.distance(from, to);
            if distance == 0.0 {
                continue;
            }
            out[to] = match &self.kernel {
                MovementKernel::Wesolowski {
                    kappa,
                    alpha,
                    beta,
                    gamma,
                } => {
                    kappa * (residents[from] as f64).powf(*alpha)
                        * (residents[to] as f64).powf(*beta)
                        / distance.powf(*gamma)
                }
                MovementKernel::WesolowskiSurface {
                    kappa,
                    alpha,
                    beta,
                    gamma,
                    travel,
                } => {
                    let gravity = kappa * (residents[from] as f64).powf(*alpha)
                        * (residents[to] as f64).powf(*beta)
                        / distance.powf(*gamma);
                    gravity / (1.0 + travel[from] + travel[to])
                }
                MovementKernel::Marshall { tau, alpha, rho } => {
                    (residents[from] as f64).powf(*tau)
                        * (1.0 + distance / rho).powf(-*alpha)
                }
                MovementKernel::BurkinaFaso {
                    tau,
                    alpha,
                    rho,
                    penalty,
                    travel,
                    in_capital,
                } => {
                    let mut probability = (residents[from] as f64).powf(*tau)
                        * (1.0 + distance / rho).powf(-*alpha);
                    probability /= 1.0 + travel[from] + travel[to];
                    if in_capital[from] && in_capital[to] {
                        probability /= penalty;
                    }
                    probability
                }
                MovementKernel::Barabasi { r_g0, beta_r, kappa } => {
                    (distance + r_g0).powf(-*beta_r) * (-distance / kappa).exp()
                }
            };
        }
        out
    }
}

/// Normalise a raw travel-time surface into [0, 1] by its maximum.
#[must_use]
pub fn normalise_travel_surface(raw: Vec<f64>) -> Vec<f64> {
    let max = raw.iter().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return raw;
    }
    raw.into_iter().map(|v| v / max).collect()
}
