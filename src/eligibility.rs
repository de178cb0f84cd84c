//! Eligibility rule engine
//!
//! Rules-based scoring of a borrower snapshot against a product's criteria.
//! Deterministic: no clock, no I/O. Missing attributes fail their rule.

use crate::models::{
    BorrowerProfile, Eligibility, EligibilityCriteria, EligibilityDetails, EmploymentType,
    LoanProduct,
};
use tracing::debug;

/// Points awarded per satisfied rule.
pub const POINTS_PER_RULE: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Age,
    Income,
    CreditScore,
    Employment,
    ExistingLoans,
}

/// Trait for a single eligibility rule
pub trait EligibilityRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> RuleKind;

    fn check(&self, profile: &BorrowerProfile, criteria: &EligibilityCriteria) -> bool;
}

pub struct AgeRule;

impl EligibilityRule for AgeRule {
    fn name(&self) -> &'static str {
        "age_within_range"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Age
    }

    fn check(&self, profile: &BorrowerProfile, criteria: &EligibilityCriteria) -> bool {
        profile
            .age
            .map(|age| age >= criteria.min_age && age <= criteria.max_age)
            .unwrap_or(false)
    }
}

pub struct IncomeRule;

impl EligibilityRule for IncomeRule {
    fn name(&self) -> &'static str {
        "minimum_monthly_income"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Income
    }

    fn check(&self, profile: &BorrowerProfile, criteria: &EligibilityCriteria) -> bool {
        profile
            .monthly_income
            .map(|income| income.is_finite() && income >= criteria.min_income)
            .unwrap_or(false)
    }
}

pub struct CreditScoreRule;

impl EligibilityRule for CreditScoreRule {
    fn name(&self) -> &'static str {
        "minimum_credit_score"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::CreditScore
    }

    fn check(&self, profile: &BorrowerProfile, criteria: &EligibilityCriteria) -> bool {
        profile
            .credit_score
            .map(|score| score >= criteria.min_credit_score)
            .unwrap_or(false)
    }
}

pub struct EmploymentRule;

impl EligibilityRule for EmploymentRule {
    fn name(&self) -> &'static str {
        "accepted_employment"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Employment
    }

    fn check(&self, profile: &BorrowerProfile, criteria: &EligibilityCriteria) -> bool {
        match profile.employment {
            None => false,
            Some(employment) if criteria.accepted_employment.is_empty() => {
                employment != EmploymentType::Unemployed
            }
            Some(employment) => criteria.accepted_employment.contains(&employment),
        }
    }
}

pub struct ExistingLoansRule;

impl EligibilityRule for ExistingLoansRule {
    fn name(&self) -> &'static str {
        "existing_loans_cap"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::ExistingLoans
    }

    fn check(&self, profile: &BorrowerProfile, criteria: &EligibilityCriteria) -> bool {
        profile
            .existing_loans
            .map(|count| count <= criteria.max_existing_loans)
            .unwrap_or(false)
    }
}

/// Evaluator that applies the standard rules
pub struct EligibilityEvaluator {
    rules: Vec<Box<dyn EligibilityRule>>,
}

impl EligibilityEvaluator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(AgeRule),
                Box::new(IncomeRule),
                Box::new(CreditScoreRule),
                Box::new(EmploymentRule),
                Box::new(ExistingLoansRule),
            ],
        }
    }

    /// Score `profile` against `product`. Identical inputs always give identical output.
    pub fn evaluate(&self, profile: &BorrowerProfile, product: &LoanProduct) -> Eligibility {
        let criteria = &product.criteria;
        let mut details = EligibilityDetails::default();

        for rule in &self.rules {
            let passed = rule.check(profile, criteria);
            match rule.kind() {
                RuleKind::Age => details.age_eligible = passed,
                RuleKind::Income => details.income_eligible = passed,
                RuleKind::CreditScore => details.credit_score_eligible = passed,
                RuleKind::Employment => details.employment_eligible = passed,
                RuleKind::ExistingLoans => details.existing_loans_eligible = passed,
            }
            debug!(rule = rule.name(), passed, "Eligibility rule evaluated");
        }

        Eligibility {
            score: details.passed_count() * POINTS_PER_RULE,
            details,
        }
    }
}

impl Default for EligibilityEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

//
// ================= Tests =================
//
