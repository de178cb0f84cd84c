//! Keyword fallback used when the reasoner cannot answer

use crate::models::{Language, LocalizedText};

pub const GREETING_INTENT: &str = "greeting";
pub const LOAN_INFO_INTENT: &str = "loan_info";

pub const UNAVAILABLE_REPLY: &str =
    "I'm having trouble connecting to my AI brain at the moment. Please try again in a minute.";

const GREETING_KEYWORDS: &[&str] = &[
    "hello", "hi", "namaste", "vanakkam", "hey", "नमस्ते", "வணக்கம்",
];

/// Too short to match as a prefix: "hi" would fire on "hire" and "his".
const WHOLE_WORD_KEYWORDS: &[&str] = &["hi", "hey"];

const LOAN_KEYWORDS: &[&str] = &[
    "loan", "credit", "borrow", "money", "ऋण", "कर्ज", "கடன்", "பணம்",
];

/// A canned answer and the intent it moves the conversation to.
#[derive(Debug, Clone, PartialEq)]
pub struct CannedReply {
    pub intent: &'static str,
    pub text: String,
}

fn greeting_text() -> LocalizedText {
    LocalizedText::new(
        "Welcome to Loan Advisor! How can I help you today?",
        "लोन एडवाइज़र में आपका स्वागत है! मैं आज आपकी कैसे मदद कर सकता हूँ?",
        "லோன் அட்வைசருக்கு வரவேற்கிறோம்! இன்று நான் உங்களுக்கு எப்படி உதவ முடியும்?",
    )
}

fn loan_info_text() -> LocalizedText {
    LocalizedText::new(
        "I can check your loan eligibility in a few quick steps. We offer Personal, Home, Education, Business and Vehicle loans.",
        "मैं कुछ आसान चरणों में आपकी loan eligibility जांच सकता हूँ। हम Personal, Home, Education, Business और Vehicle loans देते हैं।",
        "சில எளிய படிகளில் உங்கள் loan eligibility-ஐ சரிபார்க்க முடியும். நாங்கள் Personal, Home, Education, Business மற்றும் Vehicle loans வழங்குகிறோம்.",
    )
}

/// Latin keywords match the start of a word, so "loans" and "borrowing"
/// count. Short tokens must match a whole word. Indic keywords match
/// anywhere, since they are usually followed by inflection.
fn mentions(input: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| {
        if !keyword.is_ascii() {
            return input.contains(keyword);
        }

        let whole_word = WHOLE_WORD_KEYWORDS.contains(keyword);
        input
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| {
                if whole_word {
                    word == *keyword
                } else {
                    word.starts_with(keyword)
                }
            })
    })
}

/// Greeting wins over loan info when both match.
pub fn canned_reply(text: &str, language: Language) -> Option<CannedReply> {
    let input = text.to_lowercase();

    if mentions(&input, GREETING_KEYWORDS) {
        return Some(CannedReply {
            intent: GREETING_INTENT,
            text: greeting_text().get(language).to_string(),
        });
    }

    if mentions(&input, LOAN_KEYWORDS) {
        return Some(CannedReply {
            intent: LOAN_INFO_INTENT,
            text: loan_info_text().get(language).to_string(),
        });
    }

    None
}
