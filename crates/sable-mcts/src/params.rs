/// Selection parameters. Immutable during search, shareable across threads.
///
/// The kernel only ever reads this record; every toggle is set up front by
/// the caller.
#[derive(Clone, Debug)]
pub struct SearchParams {
    /// Base exploration constant (PUCT).
    pub cpuct: f32,
    /// Denominator of the log-growth term.
    pub cpuct_base: f32,
    /// Weight of the log-growth term.
    pub cpuct_factor: f32,

    /// First-play urgency penalty below the root.
    pub fpu_reduction: f32,
    /// First-play urgency penalty at the root.
    pub fpu_reduction_at_root: f32,

    /// Virtual-loss magnitude applied per in-flight visit.
    pub virtual_loss: f32,

    /// Root policy sharpening strength. 0 disables decay.
    pub policy_decay_factor: f32,
    /// Exponent on the root visit count inside the decay schedule.
    pub policy_decay_exponent: f32,

    /// Fraction of each root child's value replaced by its recent running
    /// value. 0 disables the blend.
    pub frac_weight_use_running_q: f32,

    /// Scale priors of high-uncertainty children up and low-uncertainty
    /// children down, preserving the effective exploration magnitude.
    pub enable_uncertainty_boosting: bool,
    /// Minimum visit count before an uncertainty estimate is trusted.
    pub min_n_estimate: u32,

    /// Collapse exploration once a forced mate is known among children.
    pub checkmate_certainty_propagation: bool,
    /// Keep a sliver of exploration in that case so shorter mates can still
    /// be found. When false the node restricts itself to expanded children.
    pub checkmate_allow_minimal_exploration: bool,

    /// Enable the secondary descent stream.
    pub flow_dual_selectors: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            cpuct: 1.745,
            cpuct_base: 38739.0,
            cpuct_factor: 3.894,
            fpu_reduction: 0.33,
            fpu_reduction_at_root: 0.1,
            virtual_loss: 1.0,
            policy_decay_factor: 0.0,
            policy_decay_exponent: 0.6,
            frac_weight_use_running_q: 0.0,
            enable_uncertainty_boosting: false,
            min_n_estimate: 10,
            checkmate_certainty_propagation: true,
            checkmate_allow_minimal_exploration: true,
            flow_dual_selectors: false,
        }
    }
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cpuct(mut self, cpuct: f32) -> Self {
        self.cpuct = cpuct;
        self
    }

    pub fn with_cpuct_growth(mut self, base: f32, factor: f32) -> Self {
        self.cpuct_base = base;
        self.cpuct_factor = factor;
        self
    }

    pub fn with_fpu_reduction(mut self, below_root: f32, at_root: f32) -> Self {
        self.fpu_reduction = below_root;
        self.fpu_reduction_at_root = at_root;
        self
    }

    pub fn with_virtual_loss(mut self, vloss: f32) -> Self {
        self.virtual_loss = vloss;
        self
    }

    pub fn with_policy_decay(mut self, factor: f32, exponent: f32) -> Self {
        self.policy_decay_factor = factor;
        self.policy_decay_exponent = exponent;
        self
    }

    pub fn with_running_q_fraction(mut self, frac: f32) -> Self {
        self.frac_weight_use_running_q = frac;
        self
    }

    pub fn with_uncertainty_boosting(mut self, enabled: bool) -> Self {
        self.enable_uncertainty_boosting = enabled;
        self
    }

    pub fn with_dual_selectors(mut self, enabled: bool) -> Self {
        self.flow_dual_selectors = enabled;
        self
    }

    /// Flat exploration, no feature toggles. Keeps selection tests readable:
    /// the score reduces to Q plus `cpuct * p * sqrt(N) / (1 + n)`.
    #[cfg(test)]
    pub(crate) fn plain(cpuct: f32) -> Self {
        Self {
            cpuct,
            cpuct_factor: 0.0,
            fpu_reduction: 0.0,
            fpu_reduction_at_root: 0.0,
            policy_decay_factor: 0.0,
            frac_weight_use_running_q: 0.0,
            enable_uncertainty_boosting: false,
            ..Self::default()
        }
    }
}
