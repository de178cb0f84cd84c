use loan_advisor::{
    config::AdvisorConfig,
    conversation::{ConversationContext, ConversationEngine, ConversationTurn, ReplySource},
    lifecycle::{ApplicationService, ReviewerPolicy},
    models::{DocumentDescriptor, Language, LoanProduct},
    notify::{LogNotifier, Notifier, ResendNotifier},
    reasoner::{ChatTurn, GroqReasoner, Reasoner, UnconfiguredReasoner},
    store::{
        seed::DEMO_BORROWER_ID, ApplicationStore, CatalogStore, InMemoryStore,
        PostgresApplicationStore,
    },
    tags::EligibilityStatus,
    telemetry, AdvisorError, Result,
};
use std::sync::Arc;
use tokio::io::{stdin, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use uuid::Uuid;

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = AdvisorConfig::from_env()?;
    telemetry::init(&config.log_level)?;

    info!("Loan advisor starting");

    let catalog = Arc::new(InMemoryStore::with_demo_catalog().await);

    let applications: Arc<dyn ApplicationStore> = match &config.database_url {
        Some(url) => Arc::new(PostgresApplicationStore::connect_lazy(url)?),
        None => catalog.clone(),
    };

    let reasoner: Arc<dyn Reasoner> = match GroqReasoner::from_config(&config.reasoner)? {
        Some(groq) => {
            info!(model = %config.reasoner.model, "Reasoner: groq");
            Arc::new(groq)
        }
        None => {
            warn!("GROQ_API_KEY not set, chat runs on the keyword fallback");
            Arc::new(UnconfiguredReasoner)
        }
    };

    let notifier: Arc<dyn Notifier> = match ResendNotifier::from_config(&config.notifier)? {
        Some(resend) => Arc::new(resend),
        None => Arc::new(LogNotifier),
    };

    let engine = ConversationEngine::new(reasoner.clone(), catalog.clone());
    let service = ApplicationService::new(applications, catalog.clone(), reasoner, notifier)
        .with_policy(ReviewerPolicy {
            claims_lead: config.reviewer_claims_lead,
        });

    let mut input = BufReader::new(stdin()).lines();
    let mut language = config.default_language;
    let mut history: Vec<ChatTurn> = Vec::new();
    let mut context = ConversationContext::default();

    println!("Loan Advisor. Type /lang <en|hi|ta> to switch language, /quit to exit.");

    while let Some(line) = prompt(&mut input, "you").await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }
        if let Some(code) = text.strip_prefix("/lang") {
            match Language::from_code(code) {
                Some(lang) => {
                    language = lang;
                    println!("(language set to {})", language);
                }
                None => println!("(unknown language {:?})", code.trim()),
            }
            continue;
        }

        let turn = ConversationTurn::new(text, language)
            .with_history(history.clone())
            .with_context(context.clone());
        let reply = engine.respond(turn).await;

        let marker = match reply.source {
            ReplySource::Reasoner => "advisor",
            ReplySource::Fallback => "advisor (offline)",
        };
        println!("{}: {}", marker, reply.decoded.display.trim());

        history.push(ChatTurn::user(text));
        history.push(ChatTurn::assistant(reply.reply.clone()));
        context = reply.context;

        let Some(tag) = reply.decoded.eligibility.present() else {
            if reply.decoded.eligibility.is_malformed() {
                warn!("Advisor produced an unreadable eligibility marker");
            }
            continue;
        };

        match tag.status {
            EligibilityStatus::Ineligible => {
                println!("Not eligible: {}", tag.reason().unwrap_or("no reason given"));
            }
            EligibilityStatus::Eligible => {
                let Some(product_id) = tag.product_id() else {
                    warn!(value = %tag.value, "Eligible verdict without a usable product id");
                    continue;
                };
                match catalog.product(product_id).await? {
                    Some(product) => {
                        if let Err(e) = apply(&service, &mut input, &product).await {
                            println!("Application failed: {}", e);
                        }
                    }
                    None => warn!(product_id = %product_id, "Verdict names an unknown product"),
                }
            }
        }
    }

    info!("Loan advisor stopped");
    Ok(())
}

async fn prompt(input: &mut Input, label: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{}> ", label).as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await?)
}

/// Open an application for the demo borrower, attach documents and analyze them.
async fn apply(service: &ApplicationService, input: &mut Input, product: &LoanProduct) -> Result<()> {
    println!(
        "You qualify for {}. Amount ₹{} - ₹{}, tenure {} - {} months.",
        product.name.en,
        product.amount.min,
        product.amount.max,
        product.tenure_months.min,
        product.tenure_months.max
    );

    let amount = match prompt(input, "amount").await? {
        Some(value) => value.trim().parse::<f64>().map_err(|_| {
            AdvisorError::Validation(format!("Amount must be a number, got {:?}", value.trim()))
        })?,
        None => return Ok(()),
    };
    let tenure = match prompt(input, "tenure (months)").await? {
        Some(value) => value.trim().parse::<u32>().map_err(|_| {
            AdvisorError::Validation(format!("Tenure must be whole months, got {:?}", value.trim()))
        })?,
        None => return Ok(()),
    };
    let purpose = prompt(input, "purpose").await?;

    let record = service
        .open_from_offer(DEMO_BORROWER_ID, product.id, amount, tenure, purpose)
        .await?;
    println!("Application {} is {}.", record.id, record.status);

    for document in &product.required_documents {
        let label = format!("file for {} (blank to skip)", document.en);
        match prompt(input, &label).await? {
            Some(file) if !file.trim().is_empty() => {
                service
                    .attach_document(record.id, DocumentDescriptor::new(document.en.clone(), file.trim()))
                    .await?;
            }
            Some(_) => {}
            None => return Ok(()),
        }
    }

    analyze(service, record.id).await
}

async fn analyze(service: &ApplicationService, id: Uuid) -> Result<()> {
    match service.analyze_documents(id).await {
        Ok(report) => println!(
            "Document check: {} (risk {}/10, {})\n{}",
            report.verdict, report.risk_score, report.risk_band, report.details
        ),
        Err(e) if e.is_precondition() => println!("No documents attached, skipping analysis."),
        Err(e) => println!("Document check unavailable: {}", e),
    }

    let record = service.get(id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
