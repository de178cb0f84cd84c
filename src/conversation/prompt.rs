//! Advisor system prompt

use crate::models::{Language, LoanProduct};
use crate::tags::{EligibilityTag, ResultTag, ResultTagCodec};

/// Intent shown to the model before any turn has been handled.
const INITIAL_STAGE: &str = "greeting_stage";

/// One catalog entry as the model sees it. Names and documents stay in English.
pub fn catalog_entry(product: &LoanProduct) -> String {
    let criteria = &product.criteria;
    let documents = product
        .required_documents
        .iter()
        .map(|d| d.en.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "- Name: {name}\n  ID: {id}\n  Type: {loan_type}\n  Description: {description}\n  Amount: ₹{amount_min} - ₹{amount_max}\n  Interest: {rate_min}% - {rate_max}%\n  Tenure: {tenure_min} - {tenure_max} months\n  Eligibility: Min Age {min_age}, Max Age {max_age}, Min Income ₹{min_income}, Min Credit Score {min_credit}, Max Existing Loans {max_loans}.\n  Documents Required: {documents}",
        name = product.name.en,
        id = product.id,
        loan_type = product.loan_type,
        description = product.description.en,
        amount_min = product.amount.min,
        amount_max = product.amount.max,
        rate_min = product.interest_rate.min,
        rate_max = product.interest_rate.max,
        tenure_min = product.tenure_months.min,
        tenure_max = product.tenure_months.max,
        min_age = criteria.min_age,
        max_age = criteria.max_age,
        min_income = criteria.min_income,
        min_credit = criteria.min_credit_score,
        max_loans = criteria.max_existing_loans,
        documents = if documents.is_empty() { "None listed".to_string() } else { documents },
    )
}

pub fn system_prompt(
    language: Language,
    products: &[LoanProduct],
    current_intent: Option<&str>,
) -> String {
    let catalog = if products.is_empty() {
        "(no active loan products)".to_string()
    } else {
        products
            .iter()
            .map(catalog_entry)
            .collect::<Vec<_>>()
            .join("\n")
    };

    let eligible = ResultTagCodec::encode(&ResultTag::Eligibility(EligibilityTag::eligible(
        "LOAN_ID",
    )));
    let ineligible = ResultTagCodec::encode(&ResultTag::Eligibility(EligibilityTag::ineligible(
        "REASON",
    )));

    format!(
        r#"You are a helpful and professional Loan Advisor for "LoanAdvisor".
Interface Language: {language}.

CRITICAL SCRIPT RULE:
- If the user writes in Tamil script (e.g., வணக்கம்), YOU MUST RESPOND IN TAMIL SCRIPT.
- If the user writes in Hindi script (e.g., नमस्ते), YOU MUST RESPOND IN HINDI SCRIPT.
- If the user writes in English, respond in English.

GENERAL RULES:
1. ALWAYS use English for technical terms: Loan IDs, Statuses, Document names (Identity Proof, Address Proof), and specific loan names (Personal Loan, Vehicle Loan).
2. Match the user's tone and complexity.
3. Respond in the language/script used by the user in their most recent message.

GOAL: Collect details concisely and check eligibility.

FLOW:
1. If user hasn't picked a loan: Ask them to pick one from the list below.
2. Once picked: Ask for (Age, Monthly Income, CIBIL Score) in ONE message.
3. Once provided: Calculate eligibility and output verdict.

RULES:
- KEEP CONVERSATIONS SHORT. Max 2-3 exchanges to reach a verdict.
- DO NOT give long financial advice unless asked.

CRITICAL TAGS (MUST INCLUDE):
- If ELIGIBLE: {eligible}
  (Replace LOAN_ID with the ID of the chosen product below)
- If NOT ELIGIBLE: {ineligible}

Available Loan Products:
{catalog}

Current Context Status: {stage}"#,
        language = language.code(),
        eligible = eligible,
        ineligible = ineligible,
        catalog = catalog,
        stage = current_intent.unwrap_or(INITIAL_STAGE),
    )
}

pub fn translation_prompt(target: Language) -> String {
    let script = match target {
        Language::Ta => "Use Tamil script.",
        Language::Hi => "Use Hindi (Devanagari) script.",
        Language::En => "Use English.",
    };

    format!(
        "Translate the following text into {}. Return ONLY the translated text without any explanations, quotes, or additional notes. {}",
        target.code(),
        script
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EligibilityCriteria, LocalizedText, Range};
    use uuid::Uuid;

    fn product() -> LoanProduct {
        LoanProduct {
            id: Uuid::nil(),
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
                accepted_employment: vec![],
                max_existing_loans: 2,
            },
            required_documents: vec![
                LocalizedText::new("Identity Proof", "पहचान प्रमाण", "அடையாளச் சான்று"),
                LocalizedText::english("Address Proof"),
            ],
            is_active: true,
        }
    }

    #[test]
    fn test_catalog_keeps_english_names() {
        let entry = catalog_entry(&product());
        assert!(entry.contains("Name: Personal Loan"));
        assert!(entry.contains("ID: 00000000-0000-0000-0000-000000000000"));
        assert!(entry.contains("Documents Required: Identity Proof, Address Proof"));
        assert!(!entry.contains("व्यक्तिगत"));
    }

    #[test]
    fn test_system_prompt_carries_tag_protocol_and_stage() {
        let prompt = system_prompt(Language::Ta, &[product()], None);
        assert!(prompt.contains("Interface Language: ta."));
        assert!(prompt.contains("[[ELIGIBILITY_RESULT:eligible:LOAN_ID]]"));
        assert!(prompt.contains("[[ELIGIBILITY_RESULT:ineligible:REASON]]"));
        assert!(prompt.ends_with("Current Context Status: greeting_stage"));

        let later = system_prompt(Language::En, &[], Some("ai_handled"));
        assert!(later.contains("(no active loan products)"));
        assert!(later.ends_with("Current Context Status: ai_handled"));
    }
}
