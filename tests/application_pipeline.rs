//! End-to-end pipeline scenarios
//!
//! Chat verdict → application → documents → analysis → review, driven with
//! the in-memory store, a scripted reasoner and a recording notifier.

use async_trait::async_trait;
use loan_advisor::{
    audit,
    conversation::{ConversationEngine, ConversationTurn, ReplySource, GREETING_INTENT},
    lifecycle::{Actor, ApplicationService},
    models::{
        ApplicationRecord, ApplicationStatus, Borrower, DocumentDescriptor, DocumentVerdict,
        Language, LoanProduct,
    },
    notify::{NotificationEvent, Notifier},
    reasoner::{Reasoner, ScriptedReasoner, UnconfiguredReasoner},
    store::{
        seed::{DEMO_BORROWER_ID, PERSONAL_LOAN_ID},
        InMemoryStore,
    },
    tags::EligibilityStatus,
    Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(NotificationEvent, Uuid, String)>>,
}

impl RecordingNotifier {
    async fn wait_for(&self, expected: usize) -> Vec<(NotificationEvent, Uuid, String)> {
        for _ in 0..50 {
            let sent = self.sent.lock().await.clone();
            if sent.len() >= expected {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        event: NotificationEvent,
        application: &ApplicationRecord,
        borrower: &Borrower,
        _product: &LoanProduct,
    ) -> Result<()> {
        self.sent
            .lock()
            .await
            .push((event, application.id, borrower.name.clone()));
        Ok(())
    }
}

struct Pipeline {
    engine: ConversationEngine,
    service: ApplicationService,
    notifier: Arc<RecordingNotifier>,
}

async fn pipeline(reasoner: Arc<dyn Reasoner>) -> Pipeline {
    let store = Arc::new(InMemoryStore::with_demo_catalog().await);
    let notifier = Arc::new(RecordingNotifier::default());

    Pipeline {
        engine: ConversationEngine::new(reasoner.clone(), store.clone()),
        service: ApplicationService::new(store.clone(), store, reasoner, notifier.clone()),
        notifier,
    }
}

// ============================================================================
// Scenario 1: eligible verdict in chat ends in a disbursed loan
// ============================================================================

#[tokio::test]
async fn scenario_chat_verdict_to_disbursement() {
    // ========== Given ==========
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        Ok(format!(
            "Great news, you are eligible for the Personal Loan! [[ELIGIBILITY_RESULT:eligible:{}]]",
            PERSONAL_LOAN_ID
        )),
        Ok(r#"```json
{
  "calculations": "M = 500000 / 50000 = 10x",
  "logic_verification": "10x sits in the low risk band",
  "verdict": "genuine",
  "risk_score": 2,
  "details": "Income comfortably supports the request."
}
```"#
            .to_string()),
    ]));
    let p = pipeline(reasoner.clone()).await;

    // ========== When ==========
    let reply = p
        .engine
        .respond(ConversationTurn::new(
            "Personal loan please. I am 32, earn 50000 a month, CIBIL 745",
            Language::En,
        ))
        .await;

    // ========== Then ==========
    assert_eq!(reply.source, ReplySource::Reasoner);
    assert!(!reply.decoded.display.contains("[["));
    let tag = reply.decoded.eligibility.present().expect("eligibility tag");
    assert_eq!(tag.status, EligibilityStatus::Eligible);
    let product_id = tag.product_id().expect("product id");
    assert_eq!(product_id, PERSONAL_LOAN_ID);

    // ========== When: borrower applies ==========
    let record = assert_ok!(
        p.service
            .open_from_offer(
                DEMO_BORROWER_ID,
                product_id,
                500_000.0,
                36,
                Some("Home renovation".to_string()),
            )
            .await
    );
    assert_eq!(record.status, ApplicationStatus::Submitted);
    assert_eq!(record.eligibility.map(|e| e.score), Some(100));

    assert_ok!(
        p.service
            .attach_document(record.id, DocumentDescriptor::new("Income Proof", "payslip-march.pdf"))
            .await
    );

    // ========== Then: analysis is stored ==========
    let report = assert_ok!(p.service.analyze_documents(record.id).await);
    assert_eq!(report.verdict, DocumentVerdict::Genuine);
    assert!(report.structured);

    let analyzed = assert_ok!(p.service.get(record.id).await);
    assert!(analyzed.document_analysis.is_analyzed());
    assert!(analyzed
        .document_analysis
        .details()
        .unwrap_or_default()
        .starts_with("CALCULATIONS: M = 500000 / 50000 = 10x"));

    let requests = reasoner.requests().await;
    let analysis_request = &requests[1];
    assert_eq!(analysis_request.temperature, 0.0);
    assert!(analysis_request.user.contains("10.00x"));

    // ========== When: agent reviews ==========
    let agent = Actor::agent(Uuid::new_v4(), "Kavya");
    let approved = assert_ok!(
        p.service
            .approve(record.id, &agent, Some("Documents verified".to_string()))
            .await
    );

    // ========== Then ==========
    assert_eq!(approved.status, ApplicationStatus::Approved);
    assert_eq!(approved.approved_amount, Some(500_000.0));

    let sent = p.notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, NotificationEvent::Approved);
    assert_eq!(sent[0].1, record.id);
    assert_eq!(sent[0].2, "Arun Kumar");

    let admin = Actor::admin(Uuid::new_v4(), "Meena");
    let disbursed = assert_ok!(p.service.disburse(record.id, &admin, None).await);
    assert_eq!(disbursed.status, ApplicationStatus::Disbursed);

    let history = assert_ok!(p.service.audit().history(record.id).await);
    let latest = history.last().expect("audit entry");
    assert_eq!(latest.to, ApplicationStatus::Disbursed);
    assert!(audit::verify(latest, &disbursed));
}

// ============================================================================
// Scenario 2: no reasoner configured
// ============================================================================

#[tokio::test]
async fn scenario_offline_reasoner() {
    // ========== Given ==========
    let p = pipeline(Arc::new(UnconfiguredReasoner)).await;

    // ========== When ==========
    let reply = p
        .engine
        .respond(ConversationTurn::new("hello", Language::En))
        .await;

    // ========== Then: chat degrades, never fails ==========
    assert_eq!(reply.source, ReplySource::Fallback);
    assert_eq!(reply.context.current_intent.as_deref(), Some(GREETING_INTENT));

    // ========== Then: analysis is surfaced as unavailable ==========
    let record = assert_ok!(
        p.service
            .open_from_offer(DEMO_BORROWER_ID, PERSONAL_LOAN_ID, 500_000.0, 36, None)
            .await
    );
    assert_ok!(
        p.service
            .attach_document(record.id, DocumentDescriptor::new("Identity Proof", "aadhaar.pdf"))
            .await
    );

    let err = assert_err!(p.service.analyze_documents(record.id).await);
    assert!(err.is_upstream());

    let stored = assert_ok!(p.service.get(record.id).await);
    assert!(!stored.document_analysis.is_analyzed());
}

// ============================================================================
// Scenario 3: ineligible verdict keeps its full reason
// ============================================================================

#[tokio::test]
async fn scenario_ineligible_reason_with_separator() {
    // ========== Given ==========
    let reasoner = Arc::new(ScriptedReasoner::replying(
        "Sorry. [[ELIGIBILITY_RESULT:ineligible:Credit score 610: below 700 minimum]] You can reapply later.",
    ));
    let p = pipeline(reasoner).await;

    // ========== When ==========
    let reply = p
        .engine
        .respond(ConversationTurn::new("I am 40, income 30000, score 610", Language::En))
        .await;

    // ========== Then ==========
    let tag = reply.decoded.eligibility.present().expect("eligibility tag");
    assert_eq!(tag.status, EligibilityStatus::Ineligible);
    assert_eq!(tag.reason(), Some("Credit score 610: below 700 minimum"));
    assert_eq!(reply.decoded.display, "Sorry.  You can reapply later.");
}

// ============================================================================
// Scenario 4: a finished review cannot be overturned
// ============================================================================

#[tokio::test]
async fn scenario_rejected_application_stays_rejected() {
    // ========== Given ==========
    let p = pipeline(Arc::new(UnconfiguredReasoner)).await;
    let record = assert_ok!(
        p.service
            .open_from_offer(DEMO_BORROWER_ID, PERSONAL_LOAN_ID, 900_000.0, 48, None)
            .await
    );
    let agent = Actor::agent(Uuid::new_v4(), "Kavya");
    assert_ok!(p.service.reject(record.id, &agent, None).await);
    let before = assert_ok!(p.service.get(record.id).await);

    // ========== When ==========
    let err = assert_err!(p.service.approve(record.id, &agent, None).await);

    // ========== Then ==========
    assert!(err.is_precondition());
    assert_eq!(assert_ok!(p.service.get(record.id).await), before);
    assert!(p.notifier.wait_for(0).await.is_empty());
}
