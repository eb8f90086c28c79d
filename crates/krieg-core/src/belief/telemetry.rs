use super::HypothesisSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeliefMetrics {
    pub hypotheses: usize,
    pub top_weight: f64,
    /// Shannon entropy (nats) of the weight distribution.
    pub entropy: f64,
}

impl BeliefMetrics {
    pub fn from_beliefs<S>(beliefs: &HypothesisSet<S>) -> Self {
        let total = beliefs.total_weight();
        let mut entropy = 0.0;
        let mut top_weight: f64 = 0.0;
        if total > 0.0 {
            for hypothesis in beliefs.iter() {
                let p = hypothesis.weight() / total;
                top_weight = top_weight.max(p);
                if p > 0.0 {
                    entropy -= p * p.ln();
                }
            }
        }

        Self {
            hypotheses: beliefs.len(),
            top_weight,
            entropy,
        }
    }
}
