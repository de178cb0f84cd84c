//! Application lifecycle
//!
//! `ApplicationService` owns every write to an application record. Each write
//! is a guarded read-modify-write committed with the store's revision
//! compare-and-swap, so a guard is always evaluated against the state that
//! actually gets replaced. A lost race re-reads and re-checks the guard, so
//! only a guard failure or a write that never lands surfaces as an error.

use crate::analysis::{AnalysisReport, DocumentAnalysisCoordinator};
use crate::audit::{AuditEntry, AuditLog};
use crate::eligibility::EligibilityEvaluator;
use crate::error::{parse_id, AdvisorError};
use crate::models::{
    ApplicationRecord, ApplicationStatus, Borrower, DocumentDescriptor, LoanProduct,
};
use crate::notify::{NotificationEvent, Notifier};
use crate::reasoner::Reasoner;
use crate::store::{AgentScope, ApplicationFilter, ApplicationStore, CatalogStore};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub mod review;
pub mod transitions;

pub use review::{
    Actor, Dashboard, DashboardStats, ReviewAction, ReviewDecision, ReviewerPolicy, Role,
    DEFAULT_REJECTION_REASON,
};
pub use transitions::Transition;

/// Upper bound on re-reads after lost compare-and-swaps.
const COMMIT_ATTEMPTS: u32 = 32;

/// Backoff after the n-th lost race, capped at 50ms.
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(u64::from(attempt.min(10)) * 5)
}

fn validate_terms(amount: f64, tenure: u32) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AdvisorError::Validation(format!(
            "Requested amount must be positive, got {}",
            amount
        )));
    }
    if tenure == 0 {
        return Err(AdvisorError::Validation(
            "Requested tenure must be at least one month".to_string(),
        ));
    }
    Ok(())
}

/// Requested terms must sit inside the product's published ranges.
fn validate_against_product(product: &LoanProduct, amount: f64, tenure: u32) -> Result<()> {
    if !product.amount.contains(amount) {
        return Err(AdvisorError::Validation(format!(
            "{} amount must be between {} and {}, got {}",
            product.name.en, product.amount.min, product.amount.max, amount
        )));
    }
    if !product.tenure_months.contains(tenure) {
        return Err(AdvisorError::Validation(format!(
            "{} tenure must be between {} and {} months, got {}",
            product.name.en, product.tenure_months.min, product.tenure_months.max, tenure
        )));
    }
    Ok(())
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub struct ApplicationService {
    applications: Arc<dyn ApplicationStore>,
    catalog: Arc<dyn CatalogStore>,
    notifier: Arc<dyn Notifier>,
    coordinator: DocumentAnalysisCoordinator,
    evaluator: EligibilityEvaluator,
    audit: Arc<AuditLog>,
    policy: ReviewerPolicy,
}

impl ApplicationService {
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        catalog: Arc<dyn CatalogStore>,
        reasoner: Arc<dyn Reasoner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let coordinator = DocumentAnalysisCoordinator::new(
            reasoner,
            Arc::clone(&applications),
            Arc::clone(&catalog),
        );

        Self {
            applications,
            catalog,
            notifier,
            coordinator,
            evaluator: EligibilityEvaluator::new(),
            audit: Arc::new(AuditLog::new()),
            policy: ReviewerPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReviewerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn policy(&self) -> ReviewerPolicy {
        self.policy
    }

    // ===== Creation =====

    /// Borrower accepted an eligibility verdict in chat.
    pub async fn open_from_offer(
        &self,
        borrower_id: Uuid,
        product_id: Uuid,
        amount: f64,
        tenure: u32,
        purpose: Option<String>,
    ) -> Result<ApplicationRecord> {
        validate_terms(amount, tenure)?;

        let borrower = self.borrower(borrower_id).await?;
        let product = self.product(product_id).await?;
        if !product.is_active {
            return Err(AdvisorError::Precondition(format!(
                "Loan product {} is not active",
                product.name.en
            )));
        }
        validate_against_product(&product, amount, tenure)?;

        let mut record = self.scored_draft(&borrower, &product, amount, tenure);
        record.purpose = clean_text(purpose);
        record.status = ApplicationStatus::Submitted;

        self.create(record, "open_from_offer", None).await
    }

    /// Agent submits a lead on a borrower's behalf.
    pub async fn submit_lead(
        &self,
        agent: &Actor,
        borrower_id: &str,
        product_id: &str,
        amount: f64,
        tenure: u32,
        purpose: Option<String>,
    ) -> Result<ApplicationRecord> {
        let borrower_id = parse_id(borrower_id, "Borrower ID")?;
        let product_id = parse_id(product_id, "Loan ID")?;
        validate_terms(amount, tenure)?;

        let borrower = self.borrower(borrower_id).await?;
        let product = self.product(product_id).await?;
        validate_against_product(&product, amount, tenure)?;

        let mut record = self.scored_draft(&borrower, &product, amount, tenure);
        record.purpose = clean_text(purpose);
        record.agent_id = Some(agent.id);
        record.is_agent_submission = true;
        record.status = ApplicationStatus::Submitted;

        self.create(record, "submit_lead", Some(agent.id)).await
    }

    pub async fn create_draft(
        &self,
        borrower_id: Uuid,
        product_id: Uuid,
        amount: f64,
        tenure: u32,
        purpose: Option<String>,
    ) -> Result<ApplicationRecord> {
        let borrower = self.borrower(borrower_id).await?;
        // Only checks the product exists
        self.product(product_id).await?;

        let mut record = ApplicationRecord::draft(
            borrower.id,
            product_id,
            amount,
            tenure,
            borrower.profile.clone(),
        );
        record.purpose = clean_text(purpose);

        self.create(record, "create_draft", None).await
    }

    fn scored_draft(
        &self,
        borrower: &Borrower,
        product: &LoanProduct,
        amount: f64,
        tenure: u32,
    ) -> ApplicationRecord {
        let snapshot = borrower.profile.clone();
        let eligibility = self.evaluator.evaluate(&snapshot, product);

        let mut record = ApplicationRecord::draft(borrower.id, product.id, amount, tenure, snapshot);
        record.eligibility = Some(eligibility);
        record
    }

    async fn create(
        &self,
        record: ApplicationRecord,
        action: &str,
        actor: Option<Uuid>,
    ) -> Result<ApplicationRecord> {
        let saved = self.applications.insert(record).await?;
        self.record_audit(action, None, &saved, actor).await;

        info!(
            application_id = %saved.id,
            status = %saved.status,
            action,
            "Application created"
        );
        Ok(saved)
    }

    // ===== Transitions =====

    pub async fn submit(&self, id: Uuid) -> Result<ApplicationRecord> {
        self.commit(
            id,
            Transition::Submit.name(),
            None,
            |record| {
                transitions::check(record.status, Transition::Submit)?;
                validate_terms(record.requested_amount, record.requested_tenure)?;
                if record.borrower_id.is_nil() {
                    return Err(AdvisorError::Validation(
                        "Application has no borrower".to_string(),
                    ));
                }
                Ok(())
            },
            |record| record.status = Transition::Submit.target(),
        )
        .await
    }

    pub async fn begin_review(
        &self,
        id: Uuid,
        reviewer: &Actor,
        remarks: Option<&str>,
    ) -> Result<ApplicationRecord> {
        let remark = remarks.map(str::trim).filter(|text| !text.is_empty());
        self.transition(id, Transition::BeginReview, Some(reviewer.id), |record| {
            if let Some(text) = remark {
                record.remarks.push(text, reviewer.label());
            }
        })
        .await
    }

    /// Approve or reject. Fails without touching the record when review is
    /// already over.
    pub async fn review(
        &self,
        id: Uuid,
        reviewer: &Actor,
        decision: ReviewDecision,
    ) -> Result<ApplicationRecord> {
        decision.validate()?;

        let transition = match decision.action {
            ReviewAction::Approve => Transition::Approve,
            ReviewAction::Reject => Transition::Reject,
        };
        let claims_lead = self.policy.claims_lead;
        let remark = decision.remark_text();

        let committed = self
            .transition(id, transition, Some(reviewer.id), |record| {
                record.reviewed_by = Some(reviewer.id);
                record.reviewed_at = Some(Utc::now());
                if claims_lead {
                    record.agent_id = Some(reviewer.id);
                }

                match decision.action {
                    ReviewAction::Approve => {
                        record.approved_amount =
                            Some(decision.approved_amount.unwrap_or(record.requested_amount));
                        record.interest_rate = decision.interest_rate;
                        if decision.approved_tenure.is_some() {
                            record.approved_tenure = decision.approved_tenure;
                        }
                    }
                    ReviewAction::Reject => {
                        record.rejection_reason =
                            Some(remark.unwrap_or(DEFAULT_REJECTION_REASON).to_string());
                    }
                }

                if let Some(text) = remark {
                    record.remarks.push(text, reviewer.label());
                }
            })
            .await?;

        info!(
            application_id = %id,
            reviewer = %reviewer.id,
            action = %decision.action,
            "Application reviewed"
        );

        if committed.status == ApplicationStatus::Approved {
            self.dispatch_notification(NotificationEvent::Approved, committed.clone());
        }

        Ok(committed)
    }

    pub async fn approve(
        &self,
        id: Uuid,
        reviewer: &Actor,
        remarks: Option<String>,
    ) -> Result<ApplicationRecord> {
        let mut decision = ReviewDecision::approve();
        decision.remarks = remarks;
        self.review(id, reviewer, decision).await
    }

    pub async fn reject(
        &self,
        id: Uuid,
        reviewer: &Actor,
        remarks: Option<String>,
    ) -> Result<ApplicationRecord> {
        let mut decision = ReviewDecision::reject();
        decision.remarks = remarks;
        self.review(id, reviewer, decision).await
    }

    pub async fn disburse(
        &self,
        id: Uuid,
        actor: &Actor,
        remarks: Option<&str>,
    ) -> Result<ApplicationRecord> {
        let remark = remarks.map(str::trim).filter(|text| !text.is_empty());
        self.transition(id, Transition::Disburse, Some(actor.id), |record| {
            record.disbursement_date = Some(Utc::now());
            if let Some(text) = remark {
                record.remarks.push(text, actor.label());
            }
        })
        .await
    }

    // ===== Side-channel updates =====

    pub async fn record_remark(
        &self,
        id: Uuid,
        author: &Actor,
        message: &str,
    ) -> Result<ApplicationRecord> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AdvisorError::Validation("Remark must not be empty".to_string()));
        }

        self.commit(
            id,
            "record_remark",
            Some(author.id),
            |record| transitions::check_open(record.status, "add a remark to"),
            |record| record.remarks.push(message, author.label()),
        )
        .await
    }

    pub async fn attach_document(
        &self,
        id: Uuid,
        document: DocumentDescriptor,
    ) -> Result<ApplicationRecord> {
        if document.document_type.trim().is_empty() || document.file_name.trim().is_empty() {
            return Err(AdvisorError::Validation(
                "Document type and file name are required".to_string(),
            ));
        }

        self.commit(
            id,
            "attach_document",
            None,
            |record| transitions::check_open(record.status, "attach a document to"),
            |record| record.documents.push(document.clone()),
        )
        .await
    }

    /// Re-score against the snapshot taken at submission.
    pub async fn evaluate_eligibility(&self, id: Uuid) -> Result<ApplicationRecord> {
        let current = self.get(id).await?;
        let product = self.product(current.product_id).await?;

        self.commit(
            id,
            "evaluate_eligibility",
            None,
            |record| transitions::check_open(record.status, "re-score"),
            |record| record.eligibility = Some(self.evaluator.evaluate(&record.snapshot, &product)),
        )
        .await
    }

    pub async fn analyze_documents(&self, id: Uuid) -> Result<AnalysisReport> {
        self.coordinator.analyze(id).await
    }

    // ===== Queries =====

    pub async fn get(&self, id: Uuid) -> Result<ApplicationRecord> {
        self.applications
            .get(id)
            .await?
            .ok_or_else(|| AdvisorError::NotFound(format!("Application {}", id)))
    }

    pub async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>> {
        self.applications.list(filter).await
    }

    /// Admins see every lead; agents see their own plus unassigned ones.
    pub async fn dashboard(&self, viewer: &Actor) -> Result<Dashboard> {
        let filter = ApplicationFilter {
            agent: match viewer.role {
                Role::Admin => AgentScope::Any,
                Role::Agent => AgentScope::AssignedOrUnassigned(viewer.id),
            },
            ..ApplicationFilter::default()
        };

        let leads = self.applications.list(&filter).await?;
        let stats = DashboardStats::from_leads(&leads);

        debug!(viewer = %viewer.id, total = stats.total_leads, "Dashboard loaded");
        Ok(Dashboard { leads, stats })
    }

    // ===== Internals =====

    async fn borrower(&self, id: Uuid) -> Result<Borrower> {
        self.catalog
            .borrower(id)
            .await?
            .ok_or_else(|| AdvisorError::NotFound(format!("Borrower {}", id)))
    }

    async fn product(&self, id: Uuid) -> Result<LoanProduct> {
        self.catalog
            .product(id)
            .await?
            .ok_or_else(|| AdvisorError::NotFound(format!("Loan product {}", id)))
    }

    async fn transition<M>(
        &self,
        id: Uuid,
        transition: Transition,
        actor: Option<Uuid>,
        mutate: M,
    ) -> Result<ApplicationRecord>
    where
        M: Fn(&mut ApplicationRecord),
    {
        self.commit(
            id,
            transition.name(),
            actor,
            |record| transitions::check(record.status, transition),
            |record| {
                mutate(record);
                record.status = transition.target();
            },
        )
        .await
    }

    /// Guarded read-modify-write. `guard` runs on every attempt against the
    /// freshly read record; nothing is written when it fails.
    async fn commit<G, M>(
        &self,
        id: Uuid,
        action: &str,
        actor: Option<Uuid>,
        guard: G,
        mutate: M,
    ) -> Result<ApplicationRecord>
    where
        G: Fn(&ApplicationRecord) -> Result<()>,
        M: Fn(&mut ApplicationRecord),
    {
        for attempt in 1..=COMMIT_ATTEMPTS {
            let current = self.get(id).await?;
            guard(&current)?;

            let mut next = current.clone();
            mutate(&mut next);
            next.touch();

            if let Some(committed) = self.applications.update_if(&next, current.revision).await? {
                self.record_audit(action, Some(current.status), &committed, actor)
                    .await;
                debug!(
                    application_id = %id,
                    action,
                    from = %current.status,
                    to = %committed.status,
                    "Application updated"
                );
                return Ok(committed);
            }

            debug!(application_id = %id, action, attempt, "Lost update race, re-reading");
            tokio::time::sleep(retry_delay(attempt)).await;
        }

        warn!(application_id = %id, action, "Gave up after repeated lost update races");

        Err(AdvisorError::Conflict(format!(
            "Application {} kept changing during {}",
            id, action
        )))
    }

    async fn record_audit(
        &self,
        action: &str,
        from: Option<ApplicationStatus>,
        record: &ApplicationRecord,
        actor: Option<Uuid>,
    ) {
        if let Err(e) = self
            .audit
            .record(AuditEntry::new(action, from, record, actor))
            .await
        {
            warn!(application_id = %record.id, "Failed to record audit entry: {}", e);
        }
    }

    /// Deliver on a detached task. The transition is already committed, so
    /// failures and panics are only logged.
    fn dispatch_notification(&self, event: NotificationEvent, record: ApplicationRecord) {
        let notifier = Arc::clone(&self.notifier);
        let catalog = Arc::clone(&self.catalog);
        let application_id = record.id;

        let delivery = tokio::spawn(deliver(notifier, catalog, event, record));

        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok(())) => debug!(
                    application_id = %application_id,
                    event = %event,
                    "Notification delivered"
                ),
                Ok(Err(e)) => warn!(
                    application_id = %application_id,
                    event = %event,
                    "Notification failed: {}",
                    e
                ),
                Err(e) => error!(
                    application_id = %application_id,
                    event = %event,
                    "Notification task aborted: {}",
                    e
                ),
            }
        });
    }
}

async fn deliver(
    notifier: Arc<dyn Notifier>,
    catalog: Arc<dyn CatalogStore>,
    event: NotificationEvent,
    record: ApplicationRecord,
) -> Result<()> {
    let borrower = catalog.borrower(record.borrower_id).await?;
    let product = catalog.product(record.product_id).await?;

    match (borrower, product) {
        (Some(borrower), Some(product)) => notifier.notify(event, &record, &borrower, &product).await,
        _ => Err(AdvisorError::NotFound(format!(
            "Borrower or loan product for application {}",
            record.id
        ))),
    }
}
