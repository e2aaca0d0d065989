//! Trial bookkeeping for one search.

use serde::{Deserialize, Serialize};

use backlab_core::strategy::ParamSet;

use crate::fitness::Objective;
use crate::metrics::Summary;

use super::sampler::Observation;
use super::space::SearchSpace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialState {
    Complete,
    /// Raised an error or produced a non-finite objective. Never considered for best.
    Failed,
}

/// One evaluated parameter assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub number: usize,
    pub params: ParamSet,
    pub state: TrialState,
    pub value: Option<f64>,
    pub error: Option<String>,
    #[serde(skip)]
    pub summary: Option<Summary>,
}

impl Trial {
    pub fn is_complete(&self) -> bool {
        self.state == TrialState::Complete
    }
}

/// Outcome of evaluating one trial.
pub type TrialOutcome = Result<(f64, Summary), String>;

/// Ordered trial log.
#[derive(Debug, Clone)]
pub struct Study {
    objective: Objective,
    trials: Vec<Trial>,
}

impl Study {
    pub fn new(objective: Objective) -> Self {
        Self {
            objective,
            trials: Vec::new(),
        }
    }

    /// Record a trial result. Trials are numbered in the order they are told.
    pub fn tell(&mut self, params: ParamSet, outcome: TrialOutcome) -> &Trial {
        let number = self.trials.len();
        let trial = match outcome {
            Ok((value, summary)) if value.is_finite() => Trial {
                number,
                params,
                state: TrialState::Complete,
                value: Some(value),
                error: None,
                summary: Some(summary),
            },
            Ok((value, _)) => Trial {
                number,
                params,
                state: TrialState::Failed,
                value: None,
                error: Some(format!("objective is not finite: {value}")),
                summary: None,
            },
            Err(error) => Trial {
                number,
                params,
                state: TrialState::Failed,
                value: None,
                error: Some(error),
                summary: None,
            },
        };
        self.trials.push(trial);
        &self.trials[number]
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.trials.iter().filter(|t| !t.is_complete()).count()
    }

    /// Best completed trial. The earliest one wins ties.
    pub fn best_trial(&self) -> Option<&Trial> {
        let mut best: Option<&Trial> = None;
        for trial in self.trials.iter().filter(|t| t.is_complete()) {
            let (Some(value), current) = (trial.value, best.and_then(|b| b.value)) else {
                continue;
            };
            match current {
                Some(cur) if !self.objective.is_better(value, cur) => {}
                _ => best = Some(trial),
            }
        }
        best
    }

    /// Completed trials as sampler observations, values in space order.
    pub fn observations(&self, space: &SearchSpace) -> Vec<Observation> {
        self.trials
            .iter()
            .filter_map(|t| {
                let value = t.value?;
                let values = space
                    .params
                    .iter()
                    .map(|p| t.params.get_f64(&p.name))
                    .collect::<Option<Vec<_>>>()?;
                Some(Observation {
                    values,
                    loss: self.objective.loss(value),
                })
            })
            .collect()
    }
}
