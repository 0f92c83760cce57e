//! Derivative-free pose refinement.
//!
//! The objective is only available as a black box, so the gradient is
//! estimated by forward differences. The same `alpha` is used as the
//! difference step and as the descent step size.

use crate::{
    constants::{DEFAULT_ALPHA, DEFAULT_CONVERGENCE_THRESHOLD, DEFAULT_MAX_ITERATIONS, POSE_DIMENSIONS},
    pose::Pose,
    Error, Result,
};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Why the descent loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Squared gradient norm fell to the threshold
    Converged,
    /// Iteration cap reached; normal, not an error
    IterationLimit,
    /// Cancellation flag observed at an iteration boundary
    Cancelled,
    /// Objective returned a non-finite value; last finite iterate kept
    NonFinite,
}

/// Outcome of a descent run
#[derive(Debug, Clone, PartialEq)]
pub struct Minimization {
    /// Final parameter vector
    pub parameters: Vec<f64>,
    /// Objective at `parameters`
    pub value: f64,
    /// Completed descent steps
    pub iterations: usize,
    /// Squared norm of the last gradient estimate
    pub gradient_norm_squared: f64,
    pub termination: Termination,
}

/// Refined pose together with run statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseRefinement {
    pub pose: Pose,
    pub error: f64,
    pub iterations: usize,
    pub termination: Termination,
}

/// Coordinate-wise forward-difference gradient descent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientDescent {
    /// Difference step and descent step size
    pub alpha: f64,
    /// Stop once the squared gradient norm is at or below this value
    pub convergence_threshold: f64,
    /// Upper bound on descent steps
    pub max_iterations: usize,
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl GradientDescent {
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a non-positive step, a negative
    /// threshold or a zero iteration cap
    pub fn new(alpha: f64, convergence_threshold: f64, max_iterations: usize) -> Result<Self> {
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(Error::InvalidInput(format!("Step size must be positive, got {alpha}")));
        }
        if !(convergence_threshold.is_finite() && convergence_threshold >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "Convergence threshold must be non-negative, got {convergence_threshold}"
            )));
        }
        if max_iterations == 0 {
            return Err(Error::InvalidInput("Iteration cap must be at least 1".to_string()));
        }
        Ok(Self {
            alpha,
            convergence_threshold,
            max_iterations,
        })
    }

    /// Minimize `objective` starting from `initial`
    ///
    /// Each iteration evaluates the objective `1 + n` times, then updates all
    /// coordinates simultaneously. `cancel` is polled before every iteration;
    /// when set, the current iterate is returned.
    pub fn minimize<F>(&self, initial: &[f64], mut objective: F, cancel: Option<&AtomicBool>) -> Minimization
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = initial.len();
        let mut x = initial.to_vec();
        let mut previous = x.clone();
        let mut probe = x.clone();
        let mut gradient = vec![0.0; n];
        let mut iterations = 0;
        let mut s = f64::INFINITY;
        let mut last_value = f64::INFINITY;

        let termination = loop {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                break Termination::Cancelled;
            }

            let f0 = objective(&x);
            if !f0.is_finite() {
                x.copy_from_slice(&previous);
                break Termination::NonFinite;
            }
            last_value = f0;

            let mut finite = true;
            for i in 0..n {
                probe.copy_from_slice(&x);
                probe[i] += self.alpha;
                let fi = objective(&probe);
                if !fi.is_finite() {
                    finite = false;
                    break;
                }
                gradient[i] = (fi - f0) / self.alpha;
            }
            if !finite {
                break Termination::NonFinite;
            }

            previous.copy_from_slice(&x);
            for (xi, gi) in x.iter_mut().zip(gradient.iter()) {
                *xi -= self.alpha * gi;
            }
            s = gradient.iter().map(|g| g * g).sum();
            iterations += 1;
            trace!("iteration {iterations}: f={f0:.6e}, |g|²={s:.6e}");

            if s <= self.convergence_threshold {
                break Termination::Converged;
            }
            if iterations >= self.max_iterations {
                break Termination::IterationLimit;
            }
        };

        let value = match termination {
            Termination::NonFinite => {
                warn!("Objective became non-finite after {iterations} iterations; keeping last finite iterate");
                last_value
            }
            _ => objective(&x),
        };
        debug!("Descent finished: {termination:?} after {iterations} iterations, f={value:.6e}, |g|²={s:.6e}");

        Minimization {
            parameters: x,
            value,
            iterations,
            gradient_norm_squared: s,
            termination,
        }
    }

    /// Refine a pose against a scalar objective
    #[must_use]
    pub fn refine<F>(&self, initial: &Pose, objective: F) -> Pose
    where
        F: FnMut(&Pose) -> f64,
    {
        self.refine_with_cancel(initial, objective, None).pose
    }

    /// Refine a pose, observing a cooperative cancellation flag
    pub fn refine_with_cancel<F>(&self, initial: &Pose, mut objective: F, cancel: Option<&AtomicBool>) -> PoseRefinement
    where
        F: FnMut(&Pose) -> f64,
    {
        let to_pose = |params: &[f64]| {
            let mut p = [0.0; POSE_DIMENSIONS];
            p.copy_from_slice(params);
            initial.with_parameters(&p)
        };
        let result = self.minimize(&initial.to_parameters(), |params| objective(&to_pose(params)), cancel);
        PoseRefinement {
            pose: to_pose(&result.parameters),
            error: result.value,
            iterations: result.iterations,
            termination: result.termination,
        }
    }
}
