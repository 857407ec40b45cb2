use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use vehicle_market::{
    auth::{AuthConfig, AuthService},
    config::{self, AppConfig},
    db::{self, DbPool},
    errors::{ErrorResponse, ServiceError},
    events,
    models::{InspectionReport, InspectionStatus, PaymentDetails, PaymentMethod, TransactionStatus, VehicleStatus},
    services::{
        financing::{self, FinancingQuote},
        inspections::{
            CancelInspectionRequest, CompleteInspectionRequest, InspectionFilter,
            InspectionResponse, ScheduleInspectionRequest, UpdateInspectionRequest,
        },
        transactions::{
            CancelTransactionRequest, CompleteTransactionRequest, CreateTransactionRequest,
            TransactionFilter, TransactionResponse, UpdateTransactionRequest,
        },
        vehicles::{RegisterVehicleRequest, VehicleFilter, VehicleResponse},
        AppServices, ServiceSettings,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        if json {
            if let Some(body) = error_body(&err) {
                eprintln!("{}", serde_json::to_string_pretty(&body)?);
                std::process::exit(1);
            }
        }
        return Err(err);
    }
    Ok(())
}

/// Structured body for service failures; other errors keep anyhow's report.
fn error_body(err: &anyhow::Error) -> Option<ErrorResponse> {
    let service_error = err.downcast_ref::<ServiceError>()?;
    let mut body = service_error.to_error_response();
    body.details = Some(err.to_string());
    Some(body)
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        // Pure arithmetic; no config or database needed.
        Commands::Financing(FinancingCommands::Quote(args)) => {
            handle_financing_quote(&args, cli.json)?
        }
        Commands::Migrate => {
            let context = CliContext::initialize().await?;
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::Token(args) => {
            let context = CliContext::initialize().await?;
            handle_token(&context, args, cli.json)?
        }
        Commands::Vehicles(command) => {
            let context = CliContext::initialize().await?;
            handle_vehicles_command(&context, &cli.identity, command, cli.json).await?
        }
        Commands::Transactions(command) => {
            let context = CliContext::initialize().await?;
            handle_transactions_command(&context, &cli.identity, command, cli.json).await?
        }
        Commands::Inspections(command) => {
            let context = CliContext::initialize().await?;
            handle_inspections_command(&context, &cli.identity, command, cli.json).await?
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "vehicle-market",
    about = "Operate vehicle listings and sale transactions",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(flatten)]
    identity: IdentityArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IdentityArgs {
    #[arg(long, global = true, help = "Bearer token identifying the caller")]
    token: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Act as this user id without a token (operator use)"
    )]
    as_user: Option<Uuid>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Issue an access token for a user id
    Token(TokenArgs),
    #[command(subcommand)]
    Vehicles(VehiclesCommands),
    #[command(subcommand)]
    Transactions(TransactionsCommands),
    #[command(subcommand)]
    Inspections(InspectionsCommands),
    #[command(subcommand)]
    Financing(FinancingCommands),
}

#[derive(Args)]
struct TokenArgs {
    #[arg(long, help = "User id to put in the token subject")]
    user: Uuid,
    #[arg(long = "role", help = "Role claim; may be repeated")]
    roles: Vec<String>,
}

#[derive(Subcommand)]
enum VehiclesCommands {
    Register(RegisterVehicleArgs),
    Get(IdArgs),
    List(ListVehiclesArgs),
    Archive(IdArgs),
    Activate(IdArgs),
}

#[derive(Args)]
struct IdArgs {
    #[arg(long)]
    id: Uuid,
}

#[derive(Args)]
struct RegisterVehicleArgs {
    #[arg(long)]
    make: String,
    #[arg(long)]
    model: String,
    #[arg(long)]
    year: i32,
    #[arg(long)]
    price: Decimal,
    #[arg(long, default_value_t = 0)]
    mileage: i32,
    #[arg(long)]
    city: String,
    #[arg(long)]
    state: String,
    #[arg(long)]
    country: String,
}

#[derive(Args)]
struct ListVehiclesArgs {
    #[arg(long)]
    status: Option<VehicleStatus>,
    #[arg(long)]
    make: Option<String>,
    #[arg(long)]
    owner: Option<Uuid>,
    #[arg(long)]
    min_price: Option<Decimal>,
    #[arg(long)]
    max_price: Option<Decimal>,
    #[arg(long)]
    page: Option<u64>,
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Subcommand)]
enum TransactionsCommands {
    Create(CreateTransactionArgs),
    Get(IdArgs),
    List(ListTransactionsArgs),
    /// Transactions where the caller is seller or buyer
    Mine,
    ByVehicle(ByVehicleArgs),
    Update(UpdateTransactionArgs),
    Complete(CompleteTransactionArgs),
    Cancel(CancelArgs),
}

#[derive(Args)]
struct PaymentArgs {
    #[arg(long)]
    down_payment: Option<Decimal>,
    #[arg(long, help = "Financing term in months")]
    term: Option<u32>,
    #[arg(long, help = "Annual interest rate in percent")]
    rate: Option<Decimal>,
    #[arg(long)]
    bank_name: Option<String>,
    #[arg(long)]
    account_number: Option<String>,
    #[arg(long)]
    card_last4: Option<String>,
    #[arg(long)]
    card_brand: Option<String>,
}

impl PaymentArgs {
    fn into_details(self) -> Option<PaymentDetails> {
        let details = PaymentDetails {
            down_payment: self.down_payment,
            financing_term_months: self.term,
            interest_rate: self.rate,
            bank_name: self.bank_name,
            account_number: self.account_number,
            card_last4: self.card_last4,
            card_brand: self.card_brand,
            ..Default::default()
        };
        (details != PaymentDetails::default()).then_some(details)
    }
}

#[derive(Args)]
struct CreateTransactionArgs {
    #[arg(long)]
    vehicle: Uuid,
    #[arg(long)]
    buyer: Uuid,
    #[arg(long)]
    amount: Decimal,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long, help = "cash, bank_transfer, card or financing")]
    method: PaymentMethod,
    #[command(flatten)]
    payment: PaymentArgs,
    #[arg(long)]
    inspection: Option<Uuid>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct ListTransactionsArgs {
    #[arg(long)]
    status: Option<TransactionStatus>,
    #[arg(long)]
    seller: Option<Uuid>,
    #[arg(long)]
    buyer: Option<Uuid>,
    #[arg(long)]
    page: Option<u64>,
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args)]
struct ByVehicleArgs {
    #[arg(long)]
    vehicle: Uuid,
}

#[derive(Args)]
struct UpdateTransactionArgs {
    #[arg(long)]
    id: Uuid,
    #[arg(long)]
    status: Option<TransactionStatus>,
    #[command(flatten)]
    payment: PaymentArgs,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct CompleteTransactionArgs {
    #[arg(long)]
    id: Uuid,
    #[arg(long, help = "Payment reference from the bank or processor")]
    reference: String,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct CancelArgs {
    #[arg(long)]
    id: Uuid,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand)]
enum InspectionsCommands {
    /// Book an inspection as the calling inspector
    Schedule(ScheduleInspectionArgs),
    Get(IdArgs),
    List(ListInspectionsArgs),
    ByVehicle(ByVehicleArgs),
    /// Inspections assigned to the caller
    Mine,
    Update(UpdateInspectionArgs),
    Complete(CompleteInspectionArgs),
    Cancel(CancelArgs),
    Delete(IdArgs),
}

#[derive(Args)]
struct ScheduleInspectionArgs {
    #[arg(long)]
    vehicle: Uuid,
    #[arg(long, help = "RFC 3339 timestamp, e.g. 2030-05-01T09:30:00Z")]
    at: DateTime<Utc>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct ListInspectionsArgs {
    #[arg(long)]
    status: Option<InspectionStatus>,
    #[arg(long)]
    vehicle: Option<Uuid>,
    #[arg(long)]
    inspector: Option<Uuid>,
    #[arg(long)]
    page: Option<u64>,
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args)]
struct UpdateInspectionArgs {
    #[arg(long)]
    id: Uuid,
    #[arg(long)]
    status: Option<InspectionStatus>,
    #[arg(long)]
    at: Option<DateTime<Utc>>,
    #[arg(long, help = "Report as JSON")]
    report: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct CompleteInspectionArgs {
    #[arg(long)]
    id: Uuid,
    #[arg(long, help = "Report as JSON")]
    report: String,
    #[arg(long)]
    notes: Option<String>,
}

fn parse_report(raw: &str) -> Result<InspectionReport> {
    serde_json::from_str(raw).context("--report is not a valid inspection report")
}

#[derive(Subcommand)]
enum FinancingCommands {
    Quote(QuoteArgs),
}

#[derive(Args)]
struct QuoteArgs {
    #[arg(long)]
    amount: Decimal,
    #[arg(long)]
    down_payment: Decimal,
    #[arg(long, help = "Term in months")]
    term: u32,
    #[arg(long, default_value = "0", help = "Annual interest rate in percent")]
    rate: Decimal,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
    services: AppServices,
    auth_service: AuthService,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        if config.auto_migrate {
            db::run_migrations(&db)
                .await
                .context("failed to run migrations")?;
        }

        let (event_sender, event_rx) = events::channel(config.event_channel_capacity);
        tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(
            db.clone(),
            Some(Arc::new(event_sender)),
            ServiceSettings::from(&config),
        );
        let auth_service = AuthService::new(AuthConfig::from(&config));

        Ok(Self {
            config,
            db,
            services,
            auth_service,
        })
    }

    fn caller(&self, identity: &IdentityArgs) -> Result<Uuid> {
        if let Some(token) = identity.token.as_deref() {
            let user = self
                .auth_service
                .authenticate(token)
                .map_err(|e| anyhow!("authentication failed: {}", e))?;
            return Ok(user.user_id);
        }
        if let Some(user_id) = identity.as_user {
            if self.config.is_production() {
                bail!("--as-user is disabled in production; pass --token");
            }
            return Ok(user_id);
        }
        bail!("this command needs a caller: pass --token <jwt> or --as-user <uuid>")
    }
}

fn handle_token(context: &CliContext, args: TokenArgs, json: bool) -> Result<()> {
    let token = context
        .auth_service
        .issue_token(args.user, args.roles)
        .map_err(|e| anyhow!("failed to issue token: {}", e))?;

    if json {
        print_json(&serde_json::json!({ "userId": args.user, "token": token }))?;
    } else {
        println!("{}", token);
    }
    Ok(())
}

async fn handle_vehicles_command(
    context: &CliContext,
    identity: &IdentityArgs,
    command: VehiclesCommands,
    json: bool,
) -> Result<()> {
    let service = &context.services.vehicles;

    match command {
        VehiclesCommands::Register(args) => {
            let owner = context.caller(identity)?;
            let vehicle = service
                .register_vehicle(
                    owner,
                    RegisterVehicleRequest {
                        make: args.make,
                        model: args.model,
                        year: args.year,
                        price: args.price,
                        mileage: args.mileage,
                        city: args.city,
                        state: args.state,
                        country: args.country,
                    },
                )
                .await
                .context("failed to register vehicle")?;
            output_vehicle(&vehicle, json)?;
        }
        VehiclesCommands::Get(args) => {
            let vehicle = service
                .get_vehicle(args.id)
                .await
                .context("failed to load vehicle")?;
            output_vehicle(&vehicle, json)?;
        }
        VehiclesCommands::List(args) => {
            let page = service
                .list_vehicles(VehicleFilter {
                    status: args.status,
                    make: args.make,
                    owner_id: args.owner,
                    min_price: args.min_price,
                    max_price: args.max_price,
                    page: args.page,
                    limit: args.limit,
                })
                .await
                .context("failed to list vehicles")?;
            if json {
                print_json(&page)?;
            } else {
                println!(
                    "Page {}/{} ({} vehicles)",
                    page.page, page.total_pages, page.total
                );
                for vehicle in &page.items {
                    render_vehicle(vehicle);
                }
            }
        }
        VehiclesCommands::Archive(args) => {
            let caller = context.caller(identity)?;
            let vehicle = service
                .set_status(args.id, caller, VehicleStatus::Archived)
                .await
                .context("failed to archive vehicle")?;
            output_vehicle(&vehicle, json)?;
        }
        VehiclesCommands::Activate(args) => {
            let caller = context.caller(identity)?;
            let vehicle = service
                .set_status(args.id, caller, VehicleStatus::Active)
                .await
                .context("failed to activate vehicle")?;
            output_vehicle(&vehicle, json)?;
        }
    }

    Ok(())
}

async fn handle_transactions_command(
    context: &CliContext,
    identity: &IdentityArgs,
    command: TransactionsCommands,
    json: bool,
) -> Result<()> {
    let service = &context.services.transactions;

    match command {
        TransactionsCommands::Create(args) => {
            let seller = context.caller(identity)?;
            let transaction = service
                .create_transaction(
                    seller,
                    CreateTransactionRequest {
                        vehicle_id: args.vehicle,
                        buyer_id: args.buyer,
                        amount: args.amount,
                        currency: args.currency,
                        payment_method: args.method,
                        payment_details: args.payment.into_details(),
                        inspection_id: args.inspection,
                        notes: args.notes,
                    },
                )
                .await
                .context("failed to create transaction")?;
            output_transaction(&transaction, json)?;
        }
        TransactionsCommands::Get(args) => {
            let transaction = service
                .get_transaction(args.id)
                .await
                .context("failed to load transaction")?;
            output_transaction(&transaction, json)?;
        }
        TransactionsCommands::List(args) => {
            let page = service
                .list_transactions(TransactionFilter {
                    status: args.status,
                    seller_id: args.seller,
                    buyer_id: args.buyer,
                    vehicle_id: None,
                    page: args.page,
                    limit: args.limit,
                })
                .await
                .context("failed to list transactions")?;
            if json {
                print_json(&page)?;
            } else {
                println!(
                    "Page {}/{} ({} transactions)",
                    page.page, page.total_pages, page.total
                );
                for transaction in &page.items {
                    render_transaction(transaction);
                }
            }
        }
        TransactionsCommands::Mine => {
            let caller = context.caller(identity)?;
            let transactions = service
                .list_for_user(caller)
                .await
                .context("failed to list transactions")?;
            output_transactions(&transactions, json)?;
        }
        TransactionsCommands::ByVehicle(args) => {
            let transactions = service
                .list_for_vehicle(args.vehicle)
                .await
                .context("failed to list transactions")?;
            output_transactions(&transactions, json)?;
        }
        TransactionsCommands::Update(args) => {
            let caller = context.caller(identity)?;
            let transaction = service
                .update_transaction(
                    args.id,
                    caller,
                    UpdateTransactionRequest {
                        status: args.status,
                        payment_details: args.payment.into_details(),
                        notes: args.notes,
                    },
                )
                .await
                .context("failed to update transaction")?;
            output_transaction(&transaction, json)?;
        }
        TransactionsCommands::Complete(args) => {
            let caller = context.caller(identity)?;
            let transaction = service
                .complete_transaction(
                    args.id,
                    caller,
                    CompleteTransactionRequest {
                        transaction_reference: args.reference,
                        notes: args.notes,
                    },
                )
                .await
                .context("failed to complete transaction")?;
            output_transaction(&transaction, json)?;
        }
        TransactionsCommands::Cancel(args) => {
            let caller = context.caller(identity)?;
            let transaction = service
                .cancel_transaction(args.id, caller, CancelTransactionRequest { notes: args.notes })
                .await
                .context("failed to cancel transaction")?;
            output_transaction(&transaction, json)?;
        }
    }

    Ok(())
}

async fn handle_inspections_command(
    context: &CliContext,
    identity: &IdentityArgs,
    command: InspectionsCommands,
    json: bool,
) -> Result<()> {
    let service = &context.services.inspections;

    match command {
        InspectionsCommands::Schedule(args) => {
            let inspector = context.caller(identity)?;
            let inspection = service
                .schedule_inspection(
                    inspector,
                    ScheduleInspectionRequest {
                        vehicle_id: args.vehicle,
                        scheduled_at: args.at,
                        notes: args.notes,
                    },
                )
                .await
                .context("failed to schedule inspection")?;
            output_inspection(&inspection, json)?;
        }
        InspectionsCommands::Get(args) => {
            let inspection = service
                .get_inspection(args.id)
                .await
                .context("failed to load inspection")?;
            output_inspection(&inspection, json)?;
        }
        InspectionsCommands::List(args) => {
            let page = service
                .list_inspections(InspectionFilter {
                    status: args.status,
                    vehicle_id: args.vehicle,
                    inspector_id: args.inspector,
                    page: args.page,
                    limit: args.limit,
                })
                .await
                .context("failed to list inspections")?;
            if json {
                print_json(&page)?;
            } else {
                println!(
                    "Page {}/{} ({} inspections)",
                    page.page, page.total_pages, page.total
                );
                for inspection in &page.items {
                    render_inspection(inspection);
                }
            }
        }
        InspectionsCommands::ByVehicle(args) => {
            let inspections = service
                .list_for_vehicle(args.vehicle)
                .await
                .context("failed to list inspections")?;
            output_inspections(&inspections, json)?;
        }
        InspectionsCommands::Mine => {
            let inspector = context.caller(identity)?;
            let inspections = service
                .list_for_inspector(inspector)
                .await
                .context("failed to list inspections")?;
            output_inspections(&inspections, json)?;
        }
        InspectionsCommands::Update(args) => {
            let caller = context.caller(identity)?;
            let report = args.report.as_deref().map(parse_report).transpose()?;
            let inspection = service
                .update_inspection(
                    args.id,
                    caller,
                    UpdateInspectionRequest {
                        status: args.status,
                        scheduled_at: args.at,
                        report,
                        notes: args.notes,
                    },
                )
                .await
                .context("failed to update inspection")?;
            output_inspection(&inspection, json)?;
        }
        InspectionsCommands::Complete(args) => {
            let caller = context.caller(identity)?;
            let report = parse_report(&args.report)?;
            let inspection = service
                .complete_inspection(
                    args.id,
                    caller,
                    CompleteInspectionRequest {
                        report,
                        notes: args.notes,
                    },
                )
                .await
                .context("failed to complete inspection")?;
            output_inspection(&inspection, json)?;
        }
        InspectionsCommands::Cancel(args) => {
            let caller = context.caller(identity)?;
            let inspection = service
                .cancel_inspection(args.id, caller, CancelInspectionRequest { notes: args.notes })
                .await
                .context("failed to cancel inspection")?;
            output_inspection(&inspection, json)?;
        }
        InspectionsCommands::Delete(args) => {
            let caller = context.caller(identity)?;
            service
                .delete_inspection(args.id, caller)
                .await
                .context("failed to delete inspection")?;
            if json {
                print_json(&serde_json::json!({ "id": args.id, "deleted": true }))?;
            } else {
                println!("Inspection {} deleted", args.id);
            }
        }
    }

    Ok(())
}

fn handle_financing_quote(args: &QuoteArgs, json: bool) -> Result<()> {
    let quote = financing::calculate_financing(args.amount, args.down_payment, args.term, args.rate)
        .context("failed to compute financing")?;

    if json {
        print_json(&quote)?;
    } else {
        render_quote(&quote);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn output_vehicle(vehicle: &VehicleResponse, json: bool) -> Result<()> {
    if json {
        print_json(vehicle)
    } else {
        render_vehicle(vehicle);
        Ok(())
    }
}

fn output_transaction(transaction: &TransactionResponse, json: bool) -> Result<()> {
    if json {
        print_json(transaction)
    } else {
        render_transaction(transaction);
        Ok(())
    }
}

fn output_transactions(transactions: &[TransactionResponse], json: bool) -> Result<()> {
    if json {
        return print_json(&transactions);
    }
    if transactions.is_empty() {
        println!("No transactions");
    }
    for transaction in transactions {
        render_transaction(transaction);
    }
    Ok(())
}

fn output_inspection(inspection: &InspectionResponse, json: bool) -> Result<()> {
    if json {
        print_json(inspection)
    } else {
        render_inspection(inspection);
        Ok(())
    }
}

fn output_inspections(inspections: &[InspectionResponse], json: bool) -> Result<()> {
    if json {
        return print_json(&inspections);
    }
    if inspections.is_empty() {
        println!("No inspections");
    }
    for inspection in inspections {
        render_inspection(inspection);
    }
    Ok(())
}

fn render_vehicle(vehicle: &VehicleResponse) {
    println!(
        "- Vehicle {} • {} {} {} • {} • owner {} • {} ({}, {})",
        vehicle.id,
        vehicle.year,
        vehicle.make,
        vehicle.model,
        vehicle.price,
        vehicle.owner_id,
        vehicle.status,
        vehicle.city,
        vehicle.country
    );
}

fn render_transaction(transaction: &TransactionResponse) {
    println!(
        "- Transaction {} • vehicle {} • seller {} → buyer {} • {} {} via {} • {}",
        transaction.id,
        transaction.vehicle_id,
        transaction.seller_id,
        transaction.buyer_id,
        transaction.amount,
        transaction.currency,
        transaction.payment_method,
        transaction.status
    );
    if let Some(monthly) = transaction.payment_details.monthly_payment {
        println!(
            "  financed {} over {} months at {} / month",
            transaction
                .payment_details
                .financed_amount
                .unwrap_or_default(),
            transaction
                .payment_details
                .financing_term_months
                .unwrap_or_default(),
            monthly
        );
    }
}

fn render_inspection(inspection: &InspectionResponse) {
    println!(
        "- Inspection {} • vehicle {} • inspector {} • {} • {}",
        inspection.id,
        inspection.vehicle_id,
        inspection.inspector_id,
        inspection.scheduled_at.to_rfc3339(),
        inspection.status
    );
    if let Some(report) = &inspection.report {
        println!(
            "  {} • mechanical {} / exterior {} / interior {} • {} issue(s) • repairs ~{}",
            report.overall_condition,
            report.mechanical_score,
            report.exterior_score,
            report.interior_score,
            report.issues.len(),
            report.estimated_repairs
        );
    }
}

fn render_quote(quote: &FinancingQuote) {
    println!("Financed amount: {}", quote.financed_amount);
    println!(
        "Monthly payment: {} for {} months",
        quote.monthly_payment, quote.term_months
    );
    println!("Total paid:      {}", quote.total_paid);
    println!("Total interest:  {}", quote.total_interest);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_render_as_error_body() {
        let err = anyhow::Error::new(ServiceError::NotFound("inspection not found".into()))
            .context("failed to load inspection");
        let body = error_body(&err).unwrap();
        assert_eq!(body.error, "Not Found");
        assert_eq!(body.message, "Not found: inspection not found");
        assert_eq!(body.details.as_deref(), Some("failed to load inspection"));
    }

    #[test]
    fn other_errors_have_no_body() {
        let err = anyhow!("this command needs a caller");
        assert!(error_body(&err).is_none());
    }

    #[test]
    fn report_flag_parses_json() {
        let report = parse_report(
            r#"{"overallCondition":"excellent","mechanicalScore":95,"exteriorScore":90,
                "interiorScore":92,"estimatedRepairs":"0"}"#,
        )
        .unwrap();
        assert!(report.issues.is_empty());
        assert!(parse_report("{not json").is_err());
    }
}
