//! Tree-structured Parzen Estimator sampler.
//!
//! Start-up trials sample uniformly. After that, completed trials are split
//! into a good group (lowest loss) and the rest. Per parameter, each group is
//! modelled as a mixture of truncated Gaussians (one per observation, plus a
//! wide prior), and the candidate maximizing `log l(x) - log g(x)` wins.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use backlab_core::strategy::ParamSet;

use super::space::{SearchParam, SearchSpace};

/// Sampler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TpeConfig {
    /// Uniform trials before the model kicks in.
    pub n_startup: usize,
    /// Fraction of completed trials in the good group.
    pub gamma: f64,
    /// Upper bound on the good group size.
    pub max_good: usize,
    /// Candidates drawn from the good mixture per parameter.
    pub n_candidates: usize,
    /// Weight of the prior component in each mixture.
    pub prior_weight: f64,
}

impl Default for TpeConfig {
    fn default() -> Self {
        Self {
            n_startup: 10,
            gamma: 0.10,
            max_good: 25,
            n_candidates: 24,
            prior_weight: 1.0,
        }
    }
}

impl TpeConfig {
    /// Good group size for `n` completed trials: ceil(gamma * n), in [1, max_good].
    pub fn n_good(&self, n: usize) -> usize {
        ((self.gamma * n as f64).ceil() as usize).clamp(1, self.max_good.max(1))
    }
}

/// A completed observation: sampled values in space order and its loss.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub values: Vec<f64>,
    pub loss: f64,
}

/// Seeded TPE sampler.
#[derive(Debug, Clone)]
pub struct TpeSampler {
    config: TpeConfig,
    rng: StdRng,
}

impl TpeSampler {
    pub fn new(config: TpeConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &TpeConfig {
        &self.config
    }

    /// One value per parameter, uniform over its sampling bounds.
    pub fn sample_uniform(&mut self, space: &SearchSpace) -> ParamSet {
        space
            .params
            .iter()
            .map(|p| {
                let (lo, hi) = p.sampling_bounds();
                let raw = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
                (p.name.clone(), p.to_value(raw))
            })
            .collect()
    }

    /// Suggest the next point from completed observations.
    ///
    /// Falls back to uniform sampling while there are fewer than two observations.
    pub fn suggest(&mut self, space: &SearchSpace, history: &[Observation]) -> ParamSet {
        if history.len() < 2 {
            return self.sample_uniform(space);
        }

        let mut order: Vec<usize> = (0..history.len()).collect();
        // Stable: equal losses keep trial order.
        order.sort_by(|&a, &b| history[a].loss.total_cmp(&history[b].loss));
        let n_good = self.config.n_good(history.len()).min(history.len() - 1);
        let (good, bad) = order.split_at(n_good);

        space
            .params
            .iter()
            .enumerate()
            .map(|(j, param)| {
                let pick = |idx: &[usize]| idx.iter().map(|&i| history[i].values[j]).collect::<Vec<_>>();
                let raw = self.suggest_param(param, &pick(good), &pick(bad));
                (param.name.clone(), param.to_value(raw))
            })
            .collect()
    }

    fn suggest_param(&mut self, param: &SearchParam, good: &[f64], bad: &[f64]) -> f64 {
        let (lo, hi) = param.sampling_bounds();
        if hi <= lo {
            return lo;
        }
        let l = ParzenMixture::fit(good, lo, hi, self.config.prior_weight);
        let g = ParzenMixture::fit(bad, lo, hi, self.config.prior_weight);

        let mut best = l.sample(&mut self.rng);
        let mut best_score = l.log_pdf(best) - g.log_pdf(best);
        for _ in 1..self.config.n_candidates.max(1) {
            let x = l.sample(&mut self.rng);
            let score = l.log_pdf(x) - g.log_pdf(x);
            if score > best_score {
                best = x;
                best_score = score;
            }
        }
        best
    }
}

/// Mixture of Gaussians truncated to [lo, hi].
#[derive(Debug, Clone)]
struct ParzenMixture {
    lo: f64,
    hi: f64,
    mus: Vec<f64>,
    sigmas: Vec<f64>,
    weights: Vec<f64>,
    /// Per-component normalization: probability mass inside [lo, hi].
    masses: Vec<f64>,
}

impl ParzenMixture {
    /// One component per observation plus a prior centred on the range with
    /// sigma equal to its width. Bandwidths follow the distance to the
    /// nearest neighbours, clipped to a sane band.
    fn fit(obs: &[f64], lo: f64, hi: f64, prior_weight: f64) -> Self {
        let width = hi - lo;
        let prior_mu = 0.5 * (lo + hi);

        let mut mus: Vec<f64> = obs.iter().map(|v| v.clamp(lo, hi)).collect();
        mus.push(prior_mu);
        let mut idx: Vec<usize> = (0..mus.len()).collect();
        idx.sort_by(|&a, &b| mus[a].total_cmp(&mus[b]));

        let min_sigma = width / (100.0_f64).min(1.0 + mus.len() as f64);
        let mut sigmas = vec![width; mus.len()];
        for (rank, &i) in idx.iter().enumerate() {
            let left = if rank == 0 { mus[i] - lo } else { mus[i] - mus[idx[rank - 1]] };
            let right = if rank + 1 == idx.len() {
                hi - mus[i]
            } else {
                mus[idx[rank + 1]] - mus[i]
            };
            sigmas[i] = left.max(right).clamp(min_sigma, width);
        }
        let prior_idx = mus.len() - 1;
        sigmas[prior_idx] = width;

        let mut weights = vec![1.0; mus.len()];
        weights[prior_idx] = prior_weight;
        let total: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= total;
        }

        let masses = mus
            .iter()
            .zip(&sigmas)
            .map(|(&mu, &s)| (normal_cdf((hi - mu) / s) - normal_cdf((lo - mu) / s)).max(1e-12))
            .collect();

        Self {
            lo,
            hi,
            mus,
            sigmas,
            weights,
            masses,
        }
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        let mut u: f64 = rng.gen();
        let mut k = self.weights.len() - 1;
        for (i, w) in self.weights.iter().enumerate() {
            if u < *w {
                k = i;
                break;
            }
            u -= w;
        }
        let (mu, sigma) = (self.mus[k], self.sigmas[k]);
        // Rejection sampling; the component always has mass inside the range.
        for _ in 0..64 {
            let z: f64 = rng.sample(StandardNormal);
            let x = mu + sigma * z;
            if x >= self.lo && x <= self.hi {
                return x;
            }
        }
        rng.gen_range(self.lo..=self.hi)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let density: f64 = (0..self.mus.len())
            .map(|k| {
                let z = (x - self.mus[k]) / self.sigmas[k];
                self.weights[k] * (-0.5 * z * z).exp()
                    / (self.sigmas[k] * SQRT_2PI * self.masses[k])
            })
            .sum();
        density.max(f64::MIN_POSITIVE).ln()
    }
}

const SQRT_2PI: f64 = 2.506_628_274_631_000_7;

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz & Stegun 7.1.26, max error 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use backlab_core::strategy::{ParamKind, ParamValue};

    use crate::optimize::space::RangeSource;

    fn space() -> SearchSpace {
        SearchSpace {
            params: vec![
                SearchParam {
                    name: "n".into(),
                    kind: ParamKind::Int,
                    low: 5.0,
                    high: 20.0,
                    source: RangeSource::Derived,
                },
                SearchParam {
                    name: "x".into(),
                    kind: ParamKind::Float,
                    low: -1.0,
                    high: 1.0,
                    source: RangeSource::User,
                },
            ],
        }
    }

    fn values(set: &ParamSet) -> Vec<f64> {
        vec![set.get_f64("n").unwrap(), set.get_f64("x").unwrap()]
    }

    #[test]
    fn uniform_samples_within_bounds() {
        let s = space();
        let mut sampler = TpeSampler::new(TpeConfig::default(), Some(7));
        for _ in 0..500 {
            let p = sampler.sample_uniform(&s);
            assert!(matches!(p.get("n"), Some(ParamValue::Int(v)) if (5..=20).contains(&v)));
            let x = p.get_f64("x").unwrap();
            assert!((-1.0..=1.0).contains(&x));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let s = space();
        let mut a = TpeSampler::new(TpeConfig::default(), Some(42));
        let mut b = TpeSampler::new(TpeConfig::default(), Some(42));
        for _ in 0..20 {
            assert_eq!(a.sample_uniform(&s), b.sample_uniform(&s));
        }
    }

    #[test]
    fn endpoints_reachable_for_ints() {
        let s = space();
        let mut sampler = TpeSampler::new(TpeConfig::default(), Some(1));
        let seen: Vec<i64> = (0..2000)
            .filter_map(|_| sampler.sample_uniform(&s).get_i64("n"))
            .collect();
        assert!(seen.contains(&5));
        assert!(seen.contains(&20));
    }

    #[test]
    fn model_concentrates_near_good_region() {
        let s = space();
        let mut sampler = TpeSampler::new(TpeConfig::default(), Some(3));
        // Loss is distance of x from 0.8.
        let mut history = Vec::new();
        for _ in 0..30 {
            let p = sampler.sample_uniform(&s);
            let v = values(&p);
            history.push(Observation {
                loss: (v[1] - 0.8).abs(),
                values: v,
            });
        }
        let suggested: Vec<f64> = (0..40)
            .map(|_| sampler.suggest(&s, &history).get_f64("x").unwrap())
            .collect();
        let mean = suggested.iter().sum::<f64>() / suggested.len() as f64;
        assert!(mean > 0.3, "suggestions should lean toward 0.8, mean {mean}");
        assert!(suggested.iter().all(|x| (-1.0..=1.0).contains(x)));
    }

    #[test]
    fn good_group_size() {
        let cfg = TpeConfig::default();
        assert_eq!(cfg.n_good(1), 1);
        assert_eq!(cfg.n_good(10), 1);
        assert_eq!(cfg.n_good(11), 2);
        assert_eq!(cfg.n_good(1000), 25);
    }

    #[test]
    fn degenerate_int_range() {
        let s = SearchSpace {
            params: vec![SearchParam {
                name: "n".into(),
                kind: ParamKind::Int,
                low: 4.0,
                high: 4.0,
                source: RangeSource::User,
            }],
        };
        let mut sampler = TpeSampler::new(TpeConfig::default(), Some(0));
        let history = vec![
            Observation { values: vec![4.0], loss: 1.0 },
            Observation { values: vec![4.0], loss: 2.0 },
        ];
        assert_eq!(sampler.suggest(&s, &history).get("n"), Some(ParamValue::Int(4)));
    }

    #[test]
    fn erf_matches_known_values() {
        assert!(erf(0.0).abs() < 1e-7);
        assert!((erf(1.0) - 0.842_700_79).abs() < 1e-6);
        assert!((erf(-1.0) + 0.842_700_79).abs() < 1e-6);
    }

    #[test]
    fn mixture_draws_stay_truncated_and_centred() {
        let mixture = ParzenMixture::fit(&[2.0, 2.2, 1.8], 0.0, 10.0, 0.0);
        let mut rng = StdRng::seed_from_u64(11);
        let draws: Vec<f64> = (0..2000).map(|_| mixture.sample(&mut rng)).collect();
        assert!(draws.iter().all(|x| (0.0..=10.0).contains(x)));
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert!(mean > 1.5 && mean < 4.0, "mean {mean}");
    }

    #[test]
    fn mixture_draws_repeat_under_seed() {
        let mixture = ParzenMixture::fit(&[3.0, 7.0], 0.0, 10.0, 1.0);
        let mut a = StdRng::seed_from_u64(5);
        let mut b = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            assert_eq!(mixture.sample(&mut a), mixture.sample(&mut b));
        }
    }
}
