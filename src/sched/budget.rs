// src/sched/budget.rs

//! Per-session resource budgets and live usage counters.
//!
//! One [`Budget`] instance exists per scheduling session. It is never
//! persisted; its state only leaves the process through audit events.

use serde::Serialize;

/// Token, cost and parallelism limits plus live counters.
///
/// `None` for a limit means unlimited. After every admission decision the
/// counters satisfy `used_tokens <= token_budget`,
/// `used_cost <= cost_budget_usd` and `running_count <= parallelism_budget`.
#[derive(Debug, Clone, Default)]
pub struct Budget {
    pub token_budget: Option<u64>,
    pub cost_budget_usd: Option<f64>,
    pub parallelism_budget: Option<usize>,
    used_tokens: u64,
    used_cost: f64,
    running_count: usize,
}

impl Budget {
    pub fn new(
        token_budget: Option<u64>,
        cost_budget_usd: Option<f64>,
        parallelism_budget: Option<usize>,
    ) -> Self {
        Self {
            token_budget,
            cost_budget_usd,
            parallelism_budget,
            ..Self::default()
        }
    }

    /// Check whether a task with the given estimates fits, in budget order:
    /// tokens, then cost, then parallelism.
    ///
    /// Returns a machine-readable rejection reason, or `None` if it fits.
    /// Rejection is a normal outcome, not an error: the task stays eligible
    /// for later ticks.
    pub fn check(&self, need_tokens: u64, need_cost: f64) -> Option<String> {
        if let Some(limit) = self.token_budget
            && self.used_tokens + need_tokens > limit
        {
            return Some(format!(
                "token_budget_exceeded (used={}, need={}, limit={})",
                self.used_tokens, need_tokens, limit
            ));
        }

        if let Some(limit) = self.cost_budget_usd
            && self.used_cost + need_cost > limit
        {
            return Some(format!(
                "cost_budget_exceeded (used={}, need={}, limit={})",
                self.used_cost, need_cost, limit
            ));
        }

        if let Some(limit) = self.parallelism_budget
            && self.running_count + 1 > limit
        {
            return Some(format!(
                "parallelism_budget_exceeded (running={}, limit={})",
                self.running_count, limit
            ));
        }

        None
    }

    /// Charge an admitted task. Called exactly once per admission, at
    /// admission time (optimistic; usage is not re-measured later).
    pub fn record_usage(&mut self, tokens: u64, cost: f64) {
        self.used_tokens += tokens;
        self.used_cost += cost;
        self.running_count += 1;
    }

    /// Free one parallelism slot when a task finishes. Token and cost usage
    /// are never refunded.
    pub fn release_slot(&mut self) {
        self.running_count = self.running_count.saturating_sub(1);
    }

    pub fn running_count(&self) -> usize {
        self.running_count
    }

    /// Read-only snapshot for audits and external reporting.
    pub fn status(&self) -> BudgetStatus {
        BudgetStatus {
            token_budget: self.token_budget,
            used_tokens: self.used_tokens,
            cost_budget_usd: self.cost_budget_usd,
            used_cost: self.used_cost,
            parallelism_budget: self.parallelism_budget,
            running_count: self.running_count,
        }
    }
}

/// Serialisable snapshot of a [`Budget`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub token_budget: Option<u64>,
    pub used_tokens: u64,
    pub cost_budget_usd: Option<f64>,
    pub used_cost: f64,
    pub parallelism_budget: Option<usize>,
    pub running_count: usize,
}
