use crate::commands::{
    run_appointment, run_audit, run_request, run_slot, AppointmentCommand, AuditArgs,
    RequestCommand, SlotCommand,
};
use crate::demo::{run_demo, DemoArgs};
use crate::infra::StorageArgs;
use crate::server;
use clap::{Args, Parser, Subcommand};
use consult_booking::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Consultation Booking",
    about = "Publish consultation slots, file requests and manage appointments",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Publish, move, withdraw and list lecturer slots
    Slot {
        #[command(subcommand)]
        command: SlotCommand,
    },
    /// File, withdraw, approve and reject consultation requests
    Request {
        #[command(subcommand)]
        command: RequestCommand,
    },
    /// Complete, cancel and reschedule appointments
    Appointment {
        #[command(subcommand)]
        command: AppointmentCommand,
    },
    /// Check the stored records for cross-store drift
    Audit(AuditArgs),
    /// Walk through a full booking round against in-memory stores
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) storage: StorageArgs,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Slot { command } => run_slot(command),
        Command::Request { command } => run_request(command),
        Command::Appointment { command } => run_appointment(command),
        Command::Audit(args) => run_audit(args),
        Command::Demo(args) => run_demo(args),
    }
}
