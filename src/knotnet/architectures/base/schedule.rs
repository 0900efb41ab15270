//! Learning-rate schedules for the shared training contract.
//!
//! Every variant trains with Adam at a base rate of 0.001. MLP/CNN/GAT
//! decay that rate exponentially once per epoch; the two transformer
//! variants use the Noam warm-up-then-inverse-square-root schedule stepped
//! once per batch. The trainer feeds the current rate into
//! `Optimizer::step` each iteration, so the schedule lives outside the
//! optimizer state.

use super::config::ConfigError;

/// Base Adam learning rate shared by every variant.
pub const BASE_LEARNING_RATE: f64 = 1e-3;

/// Per-epoch decay factor for the exponential schedule.
pub const EXPONENTIAL_GAMMA: f64 = 0.95;

/// Which schedule a model variant trains under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LrSchedule {
    /// Multiply the learning rate by `gamma` at the end of every epoch.
    Exponential { gamma: f64 },
    /// `lr = base * d_model^-0.5 * min(step^-0.5, step * warmup_steps^-1.5)`
    /// with a 1-based step count, advanced once per batch.
    Noam { d_model: usize, warmup_steps: usize },
}

/// When the schedule advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleInterval {
    Epoch,
    Step,
}

impl LrSchedule {
    pub fn interval(&self) -> ScheduleInterval {
        match self {
            LrSchedule::Exponential { .. } => ScheduleInterval::Epoch,
            LrSchedule::Noam { .. } => ScheduleInterval::Step,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            LrSchedule::Exponential { .. } => Ok(()),
            LrSchedule::Noam {
                d_model,
                warmup_steps,
            } => {
                if d_model == 0 {
                    return Err(ConfigError::ZeroDim { name: "d_model" });
                }
                if warmup_steps == 0 {
                    return Err(ConfigError::InvalidWarmupSteps { warmup_steps });
                }
                Ok(())
            }
        }
    }
}

/// Mutable schedule position: the step/epoch counters plus the declarative
/// schedule they drive.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    schedule: LrSchedule,
    base_lr: f64,
    step: usize,
    epoch: usize,
}

impl ScheduleState {
    pub fn new(schedule: LrSchedule, base_lr: f64) -> Result<Self, ConfigError> {
        schedule.validate()?;
        Ok(Self {
            schedule,
            base_lr,
            step: 0,
            epoch: 0,
        })
    }

    /// Learning rate at the current schedule position. Before the first
    /// batch the Noam schedule reports its step-1 rate.
    pub fn current_lr(&self) -> f64 {
        match self.schedule {
            LrSchedule::Exponential { gamma } => {
                self.base_lr * gamma.powi(self.epoch as i32)
            }
            LrSchedule::Noam {
                d_model,
                warmup_steps,
            } => {
                let step = self.step.max(1) as f64;
                let scale = (d_model as f64).powf(-0.5)
                    * f64::min(step.powf(-0.5), step * (warmup_steps as f64).powf(-1.5));
                self.base_lr * scale
            }
        }
    }

    /// Advance per-batch schedules and return the rate to use for this
    /// optimizer step.
    pub fn on_step(&mut self) -> f64 {
        if self.schedule.interval() == ScheduleInterval::Step {
            self.step += 1;
        }
        self.current_lr()
    }

    /// Advance per-epoch schedules.
    pub fn on_epoch_end(&mut self) {
        if self.schedule.interval() == ScheduleInterval::Epoch {
            self.epoch += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_decays_per_epoch() {
        let mut state =
            ScheduleState::new(LrSchedule::Exponential { gamma: EXPONENTIAL_GAMMA }, 1e-3)
                .unwrap();
        assert!((state.current_lr() - 1e-3).abs() < 1e-12);
        for k in 1..=5usize {
            state.on_epoch_end();
            let expected = 1e-3 * 0.95f64.powi(k as i32);
            assert!((state.current_lr() - expected).abs() < 1e-12);
        }
        // Per-batch steps do not advance an epoch schedule.
        let before = state.current_lr();
        state.on_step();
        assert_eq!(state.current_lr(), before);
    }

    #[test]
    fn noam_warms_up_then_decays() {
        let mut state = ScheduleState::new(
            LrSchedule::Noam {
                d_model: 64,
                warmup_steps: 10,
            },
            1e-3,
        )
        .unwrap();
        let mut rates = Vec::new();
        for _ in 0..30 {
            rates.push(state.on_step());
        }
        // Strictly increasing through warm-up, strictly decreasing after.
        for i in 1..10 {
            assert!(rates[i] > rates[i - 1], "warm-up not increasing at {}", i);
        }
        for i in 11..30 {
            assert!(rates[i] < rates[i - 1], "decay not decreasing at {}", i);
        }
        // Inverse-square-root decay beyond warm-up.
        let expected = 1e-3 * (64f64).powf(-0.5) * (20f64).powf(-0.5);
        assert!((rates[19] - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_warmup_rejected() {
        let err = ScheduleState::new(
            LrSchedule::Noam {
                d_model: 64,
                warmup_steps: 0,
            },
            1e-3,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidWarmupSteps { warmup_steps: 0 });
    }
}
