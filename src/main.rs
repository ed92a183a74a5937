use clap::Parser;
use marketflow::application::chat::ChatService;
use marketflow::application::directory::DirectoryService;
use marketflow::application::engine::Engine;
use marketflow::domain::party::{BusinessFilter, SellableFilter};
use marketflow::domain::ports::{ChatStore, DirectoryStore, DisputeStore, TransactionStore};
use marketflow::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use marketflow::infrastructure::rocksdb::RocksDbStore;
use marketflow::interfaces::csv::ledger_writer::LedgerWriter;
use marketflow::interfaces::json::command::Command;
use marketflow::interfaces::json::reader::CommandReader;
use marketflow::interfaces::json::response::{Response, ResponseWriter};
use miette::{IntoDiagnostic, Result};
use serde_json::{Value, json};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input command script (one JSON object per line)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Write the final transaction ledger as CSV to this path.
    #[arg(long)]
    ledger: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays a clean JSON-lines response stream.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        let store = RocksDbStore::open(db_path).into_diagnostic()?;
        return run(store, &cli).await;
    }

    run(InMemoryStore::new(), &cli).await
}

async fn run<S>(store: S, cli: &Cli) -> Result<()>
where
    S: DirectoryStore + ChatStore + TransactionStore + DisputeStore + Clone + 'static,
{
    let engine = Engine::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
    );
    let chat = ChatService::new(Box::new(store.clone()), Box::new(store.clone()));
    let directory = DirectoryService::new(Box::new(store.clone()));

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    let stdout = io::stdout();
    let mut writer = ResponseWriter::new(stdout.lock());

    for command in reader.commands() {
        let result = match command {
            Ok(command) => dispatch(command, &engine, &chat, &directory).await,
            Err(error) => Err(error),
        };
        writer.write(&Response::from_result(result)).into_diagnostic()?;
    }

    if let Some(path) = &cli.ledger {
        let transactions = store.all().await.into_diagnostic()?;
        let file = File::create(path).into_diagnostic()?;
        LedgerWriter::new(file)
            .write_transactions(&transactions)
            .into_diagnostic()?;
    }

    Ok(())
}

async fn dispatch(
    command: Command,
    engine: &Engine,
    chat: &ChatService,
    directory: &DirectoryService,
) -> marketflow::error::Result<Value> {
    match command {
        Command::RegisterUser { name, email, role } => {
            let user = directory.register_user(name, email, role).await?;
            Ok(json!({ "user": user }))
        }
        Command::AddLocation {
            city,
            province,
            postal_code,
        } => {
            let location = directory.add_location(city, province, postal_code).await?;
            Ok(json!({ "location": location }))
        }
        Command::RegisterBusiness {
            actor,
            name,
            description,
            category,
            location_id,
        } => {
            let business = directory
                .register_business(actor, name, description, category, location_id)
                .await?;
            Ok(json!({ "business": business }))
        }
        Command::AddSellable {
            actor,
            business_id,
            name,
            kind,
            price,
            description,
        } => {
            let sellable = directory
                .add_sellable(actor, business_id, name, kind, price, description)
                .await?;
            Ok(json!({ "sellable": sellable }))
        }
        Command::OpenConversation { actor, user_id } => {
            let conversation = chat.open_conversation(actor, user_id).await?;
            Ok(json!({ "conversation": conversation }))
        }
        Command::SendMessage {
            actor,
            conversation_id,
            content,
            sellable_id,
        } => {
            let message = chat
                .send_message(actor, conversation_id, content, sellable_id)
                .await?;
            Ok(json!({ "message": message }))
        }
        Command::ListMessages {
            actor,
            conversation_id,
        } => {
            let messages = chat.messages(actor, conversation_id).await?;
            Ok(json!({ "messages": messages }))
        }
        Command::MarkRead {
            actor,
            conversation_id,
        } => {
            let marked = chat.mark_conversation_read(actor, conversation_id).await?;
            Ok(json!({ "marked": marked }))
        }
        Command::ListConversations { actor } => {
            let conversations = chat.conversations(actor).await?;
            Ok(json!({ "conversations": conversations }))
        }
        Command::CreateTransaction {
            actor,
            customer_id,
            business_id,
            items,
            notes,
            conversation_id,
        } => {
            let (transaction, message) = engine
                .create_transaction(actor, business_id, customer_id, items, notes, conversation_id)
                .await?;
            Ok(json!({ "transaction": transaction, "message": message }))
        }
        Command::UpdateTransactionStatus {
            actor,
            transaction_id,
            status,
            reason,
            conversation_id,
        } => {
            let (transaction, message) = engine
                .update_transaction_status(actor, transaction_id, status, reason, conversation_id)
                .await?;
            Ok(json!({ "transaction": transaction, "message": message }))
        }
        Command::ShowTransaction {
            actor,
            transaction_id,
        } => {
            let transaction = engine.transaction(actor, transaction_id).await?;
            Ok(json!({ "transaction": transaction }))
        }
        Command::OpenDispute {
            actor,
            transaction_id,
            reason,
            conversation_id,
        } => {
            let (dispute, message) = engine
                .open_dispute(actor, transaction_id, reason, conversation_id)
                .await?;
            Ok(json!({ "dispute": dispute, "message": message }))
        }
        Command::AddDisputeMessage {
            actor,
            dispute_id,
            message: body,
            conversation_id,
        } => {
            let (dispute_message, message) = engine
                .add_dispute_message(actor, dispute_id, body, conversation_id)
                .await?;
            Ok(json!({ "dispute_message": dispute_message, "message": message }))
        }
        Command::ResolveDispute {
            actor,
            dispute_id,
            resolution,
            conversation_id,
        } => {
            let (dispute, message) = engine
                .resolve_dispute(actor, dispute_id, resolution, conversation_id)
                .await?;
            Ok(json!({ "dispute": dispute, "message": message }))
        }
        Command::ShowDispute { actor, dispute_id } => {
            let (dispute, messages) = engine.dispute(actor, dispute_id).await?;
            Ok(json!({ "dispute": dispute, "messages": messages }))
        }
        Command::ListBusinesses {
            category,
            location_id,
            verified,
            min_price,
            max_price,
            query,
        } => {
            let filter = BusinessFilter {
                category,
                location_id,
                verified,
                min_price,
                max_price,
                query,
            };
            let businesses = directory.businesses(&filter).await?;
            Ok(json!({ "businesses": businesses }))
        }
        Command::ListSellables {
            kind,
            business_id,
            category,
            location_id,
            min_price,
            max_price,
            query,
        } => {
            let filter = SellableFilter {
                kind,
                business_id,
                category,
                location_id,
                min_price,
                max_price,
                query,
            };
            let sellables = directory.sellables(&filter).await?;
            Ok(json!({ "sellables": sellables }))
        }
        Command::Search { query } => {
            let results = directory.search(query).await?;
            Ok(json!({ "results": results }))
        }
        Command::SaveBusiness { actor, business_id } => {
            let saved = directory.save_business(actor, business_id).await?;
            Ok(json!({ "saved": saved }))
        }
        Command::UnsaveBusiness { actor, business_id } => {
            directory.unsave_business(actor, business_id).await?;
            Ok(json!({ "removed": true }))
        }
        Command::ListSavedBusinesses { actor } => {
            let businesses = directory.saved_businesses(actor).await?;
            Ok(json!({ "businesses": businesses }))
        }
        Command::AddReview {
            actor,
            business_id,
            rating,
            body,
        } => {
            let review = directory.add_review(actor, business_id, rating, body).await?;
            Ok(json!({ "review": review }))
        }
        Command::ListReviews { business_id } => {
            let reviews = directory.reviews(business_id).await?;
            Ok(json!({ "reviews": reviews }))
        }
    }
}
