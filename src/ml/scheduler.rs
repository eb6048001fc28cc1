// ============================================================
// Layer 5 — Plateau Learning-Rate Scheduler
// ============================================================
// Halves the learning rate once the validation loss has not
// improved for more than `patience` epochs.
//
//   improved  ⇔  loss < best · (1 − threshold)     (relative, mode "min")
//   bad_epochs > patience  →  lr = max(lr · factor, min_lr)
//
// A reduction smaller than `eps` is ignored. After a reduction
// the scheduler waits `cooldown` epochs before counting again.
//
// Burn's built-in schedulers are step-driven and know nothing
// about the monitored metric, so this one is stepped by hand
// from the epoch loop.

use burn::config::Config;

#[derive(Config, Debug)]
pub struct PlateauSchedulerConfig {
    /// Starting learning rate
    pub initial_lr: f64,
    #[config(default = 0.5)]
    pub factor: f64,
    #[config(default = 7)]
    pub patience: usize,
    #[config(default = 1e-4)]
    pub threshold: f64,
    #[config(default = 0)]
    pub cooldown: usize,
    #[config(default = 0.0)]
    pub min_lr: f64,
    #[config(default = 1e-8)]
    pub eps: f64,
}

impl PlateauSchedulerConfig {
    pub fn init(&self) -> PlateauScheduler {
        PlateauScheduler {
            lr:         self.initial_lr,
            best:       f64::INFINITY,
            bad_epochs: 0,
            cooldown:   0,
            config:     self.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    lr:         f64,
    best:       f64,
    bad_epochs: usize,
    cooldown:   usize,
    config:     PlateauSchedulerConfig,
}

impl PlateauScheduler {
    /// Learning rate for the next epoch
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Feed one epoch's validation loss; returns the (possibly reduced) lr.
    pub fn step(&mut self, metric: f64) -> f64 {
        if self.is_better(metric) {
            self.best       = metric;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.cooldown > 0 {
            self.cooldown  -= 1;
            self.bad_epochs = 0;
        }

        if self.bad_epochs > self.config.patience {
            let reduced = (self.lr * self.config.factor).max(self.config.min_lr);
            if self.lr - reduced > self.config.eps {
                tracing::info!("Reducing learning rate {:.3e} → {:.3e}", self.lr, reduced);
                self.lr = reduced;
            }
            self.cooldown   = self.config.cooldown;
            self.bad_epochs = 0;
        }

        self.lr
    }

    fn is_better(&self, metric: f64) -> bool {
        metric < self.best * (1.0 - self.config.threshold)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improving_loss_keeps_lr() {
        let mut s = PlateauSchedulerConfig::new(1e-3).init();
        for i in 0..20 {
            assert_eq!(s.step(10.0 - i as f64), 1e-3);
        }
    }

    #[test]
    fn test_halves_after_patience_exceeded() {
        let mut s = PlateauSchedulerConfig::new(1e-3).init();
        s.step(1.0);
        // 7 bad epochs are tolerated, the 8th triggers the reduction
        for _ in 0..7 {
            assert_eq!(s.step(1.0), 1e-3);
        }
        assert_eq!(s.step(1.0), 5e-4);

        // counter restarts after a reduction
        for _ in 0..7 {
            assert_eq!(s.step(1.0), 5e-4);
        }
        assert_eq!(s.step(1.0), 2.5e-4);
    }

    #[test]
    fn test_relative_threshold() {
        let mut s = PlateauSchedulerConfig::new(1.0).with_patience(0).init();
        s.step(1.0);
        // 1e-6 relative improvement is below the 1e-4 threshold
        assert_eq!(s.step(1.0 - 1e-6), 0.5);
        // a clear improvement resets the count
        assert_eq!(s.step(0.5), 0.5);
    }

    #[test]
    fn test_min_lr_and_eps() {
        let mut s = PlateauSchedulerConfig::new(1e-3)
            .with_patience(0)
            .with_min_lr(8e-4)
            .init();
        s.step(1.0);
        assert_eq!(s.step(2.0), 8e-4);

        let mut s = PlateauSchedulerConfig::new(1e-8).with_patience(0).init();
        s.step(1.0);
        // reduction of 5e-9 is below eps, lr stays put
        assert_eq!(s.step(2.0), 1e-8);
    }

    #[test]
    fn test_cooldown_suspends_counting() {
        let mut s = PlateauSchedulerConfig::new(1.0)
            .with_patience(0)
            .with_cooldown(2)
            .init();
        s.step(1.0);
        assert_eq!(s.step(2.0), 0.5);
        assert_eq!(s.step(2.0), 0.5);
        assert_eq!(s.step(2.0), 0.5);
        assert_eq!(s.step(2.0), 0.25);
    }
}
