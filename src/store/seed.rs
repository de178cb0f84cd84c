//! Demo catalog for local runs and tests

use super::InMemoryStore;
use crate::models::{
    Borrower, BorrowerProfile, EligibilityCriteria, EmploymentType, LocalizedText, LoanProduct,
    Range,
};
use uuid::Uuid;

pub const PERSONAL_LOAN_ID: Uuid = Uuid::from_u128(0x6a1f_0c2e_0000_4000_8000_0000_0000_0001);
pub const HOME_LOAN_ID: Uuid = Uuid::from_u128(0x6a1f_0c2e_0000_4000_8000_0000_0000_0002);
pub const VEHICLE_LOAN_ID: Uuid = Uuid::from_u128(0x6a1f_0c2e_0000_4000_8000_0000_0000_0003);
pub const DEMO_BORROWER_ID: Uuid = Uuid::from_u128(0x6a1f_0c2e_0000_4000_8000_0000_0000_0100);

fn identity_proof() -> LocalizedText {
    LocalizedText::new("Identity Proof", "पहचान प्रमाण", "அடையாளச் சான்று")
}

fn address_proof() -> LocalizedText {
    LocalizedText::new("Address Proof", "पते का प्रमाण", "முகவரிச் சான்று")
}

fn income_proof() -> LocalizedText {
    LocalizedText::new("Income Proof", "आय प्रमाण", "வருமானச் சான்று")
}

pub fn demo_products() -> Vec<LoanProduct> {
    vec![
        LoanProduct {
            id: PERSONAL_LOAN_ID,
            loan_type: "personal".to_string(),
            name: LocalizedText::new("Personal Loan", "व्यक्तिगत ऋण", "தனிநபர் கடன்"),
            description: LocalizedText::english("Unsecured loan for personal needs"),
            amount: Range::new(50_000.0, 1_000_000.0),
            interest_rate: Range::new(10.5, 16.0),
            tenure_months: Range::new(12, 60),
            criteria: EligibilityCriteria {
                min_age: 21,
                max_age: 60,
                min_income: 25_000.0,
                min_credit_score: 700,
                accepted_employment: vec![EmploymentType::Salaried, EmploymentType::SelfEmployed],
                max_existing_loans: 2,
            },
            required_documents: vec![identity_proof(), address_proof(), income_proof()],
            is_active: true,
        },
        LoanProduct {
            id: HOME_LOAN_ID,
            loan_type: "home".to_string(),
            name: LocalizedText::new("Home Loan", "गृह ऋण", "வீட்டுக் கடன்"),
            description: LocalizedText::english("Purchase or construction of a residential property"),
            amount: Range::new(500_000.0, 10_000_000.0),
            interest_rate: Range::new(8.4, 9.8),
            tenure_months: Range::new(60, 360),
            criteria: EligibilityCriteria {
                min_age: 23,
                max_age: 65,
                min_income: 40_000.0,
                min_credit_score: 720,
                accepted_employment: vec![],
                max_existing_loans: 1,
            },
            required_documents: vec![
                identity_proof(),
                address_proof(),
                income_proof(),
                LocalizedText::english("Property Documents"),
            ],
            is_active: true,
        },
        LoanProduct {
            id: VEHICLE_LOAN_ID,
            loan_type: "vehicle".to_string(),
            name: LocalizedText::new("Vehicle Loan", "वाहन ऋण", "வாகனக் கடன்"),
            description: LocalizedText::english("Two and four wheeler financing"),
            amount: Range::new(50_000.0, 1_500_000.0),
            interest_rate: Range::new(8.5, 12.0),
            tenure_months: Range::new(12, 84),
            criteria: EligibilityCriteria {
                min_age: 21,
                max_age: 65,
                min_income: 20_000.0,
                min_credit_score: 650,
                accepted_employment: vec![],
                max_existing_loans: 2,
            },
            required_documents: vec![identity_proof(), income_proof()],
            is_active: true,
        },
    ]
}

pub fn demo_borrower() -> Borrower {
    Borrower {
        id: DEMO_BORROWER_ID,
        name: "Arun Kumar".to_string(),
        email: "arun.kumar@example.com".to_string(),
        phone: Some("+91 98765 43210".to_string()),
        profile: BorrowerProfile {
            age: Some(32),
            monthly_income: Some(50_000.0),
            credit_score: Some(745),
            employment: Some(EmploymentType::Salaried),
            existing_loans: Some(1),
        },
    }
}

impl InMemoryStore {
    /// Store preloaded with the demo products and borrower.
    pub async fn with_demo_catalog() -> Self {
        let store = Self::new();
        for product in demo_products() {
            store.add_product(product).await;
        }
        store.add_borrower(demo_borrower()).await;
        store
    }
}
