use serde::Serialize;

/// Debt-to-income ratio above which the bulk loader flags a client as high risk.
pub const HIGH_DEBT_TO_INCOME_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    High,
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Low => "Low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "High" => Some(RiskLevel::High),
            "Low" => Some(RiskLevel::Low),
            _ => None,
        }
    }
}

/// Label policy: the model outcome decides the level.
pub fn risk_level_from_default(default_risk: u8) -> RiskLevel {
    if default_risk == 1 {
        RiskLevel::High
    } else {
        RiskLevel::Low
    }
}

/// Threshold policy: the debt load decides the level, regardless of outcome.
pub fn risk_level_from_debt_ratio(debt_to_income_ratio: f64) -> RiskLevel {
    if debt_to_income_ratio > HIGH_DEBT_TO_INCOME_THRESHOLD {
        RiskLevel::High
    } else {
        RiskLevel::Low
    }
}

/// Which policy a bulk import applies when writing `Risk_Level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevelPolicy {
    DefaultLabel,
    DebtRatio,
}

impl RiskLevelPolicy {
    pub fn apply(&self, default_risk: u8, debt_to_income_ratio: f64) -> RiskLevel {
        match self {
            RiskLevelPolicy::DefaultLabel => risk_level_from_default(default_risk),
            RiskLevelPolicy::DebtRatio => risk_level_from_debt_ratio(debt_to_income_ratio),
        }
    }
}

/// Three-band classification of a continuous risk score in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskTier {
    High,
    Moderate,
    Low,
}

pub fn risk_tier_from_score(score: f64) -> RiskTier {
    if score > 0.7 {
        RiskTier::High
    } else if score > 0.4 {
        RiskTier::Moderate
    } else {
        RiskTier::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_policy_follows_default_flag() {
        assert_eq!(risk_level_from_default(1), RiskLevel::High);
        assert_eq!(risk_level_from_default(0), RiskLevel::Low);
    }

    #[test]
    fn threshold_policy_is_strictly_greater_than_five() {
        assert_eq!(risk_level_from_debt_ratio(5.0), RiskLevel::Low);
        assert_eq!(risk_level_from_debt_ratio(5.01), RiskLevel::High);
    }

    #[test]
    fn policies_disagree_on_heavily_indebted_non_defaulter() {
        assert_eq!(RiskLevelPolicy::DefaultLabel.apply(0, 8.0), RiskLevel::Low);
        assert_eq!(RiskLevelPolicy::DebtRatio.apply(0, 8.0), RiskLevel::High);
    }

    #[test]
    fn tiers_use_exclusive_bounds() {
        assert_eq!(risk_tier_from_score(0.71), RiskTier::High);
        assert_eq!(risk_tier_from_score(0.7), RiskTier::Moderate);
        assert_eq!(risk_tier_from_score(0.4), RiskTier::Low);
        assert_eq!(risk_tier_from_score(0.0), RiskTier::Low);
    }

    #[test]
    fn level_round_trips_through_text() {
        assert_eq!(RiskLevel::parse(RiskLevel::High.as_str()), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse("Élevé"), None);
    }
}
