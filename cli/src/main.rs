use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use clinic_client::api::types::{IdentityForm, QuestionnaireSubmission};
use clinic_client::api::{DoctorApi, PatientApi};
use clinic_client::config::{DOCTOR_LOGIN_ROUTE, PATIENT_LOGIN_ROUTE};
use clinic_client::{
    ApiClient, ClientConfig, ClientError, ClinicConfig, FileStorage, GuardDecision, Navigator, RouteGuard,
    SessionStore,
};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{}", .0.user_message())]
    Client(#[from] ClientError),
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "clinic", about = "Clinic portal API client")]
struct Cli {
    #[arg(long, env = "CLINIC_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "CLINIC_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the persisted session.
    Whoami,
    /// Clear the persisted session.
    Logout,
    /// Check whether a route may be entered with the current session.
    Guard { path: String },
    Doctor(DoctorCommand),
    Patient(PatientCommand),
}

#[derive(Args, Debug)]
struct DoctorCommand {
    #[command(subcommand)]
    command: DoctorSubcommand,
}

#[derive(Subcommand, Debug)]
enum DoctorSubcommand {
    Login {
        username: String,
        #[arg(long, env = "CLINIC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Queue {
        /// Defaults to the logged-in doctor's id.
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Queue with every record's case summary.
    QueueDetails,
    Summary {
        record_id: String,
    },
    Report {
        record_id: String,
        #[arg(long)]
        text: String,
    },
    /// Upload a questionnaire spreadsheet.
    Import {
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct PatientCommand {
    #[command(subcommand)]
    command: PatientSubcommand,
}

#[derive(Subcommand, Debug)]
enum PatientSubcommand {
    Login {
        phone_number: String,
        #[arg(long, env = "CLINIC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        phone_number: String,
        #[arg(long, env = "CLINIC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Bind(BindArgs),
    Info,
    Departments,
    Questionnaire {
        department_id: String,
    },
    Submit(SubmitArgs),
    Upload {
        file: PathBuf,
        #[arg(long)]
        mime: Option<String>,
    },
    Record {
        record_id: String,
    },
    /// Earlier questionnaire submissions.
    Submissions,
}

#[derive(Args, Debug)]
struct BindArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    gender: String,
    #[arg(long)]
    birth: String,
    #[arg(long)]
    ethnicity: String,
    #[arg(long)]
    origin: String,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    #[arg(long)]
    questionnaire_id: String,
    #[arg(long)]
    department_id: String,
    /// Answers as a JSON object.
    #[arg(long)]
    answers: String,
    /// Id of an uploaded file; repeatable.
    #[arg(long = "file-id")]
    file_ids: Vec<String>,
}

/// Prints what to run next instead of moving a UI.
struct HintNavigator;

impl Navigator for HintNavigator {
    fn redirect_to_login(&self, route: &str) {
        eprintln!("session expired; {}", login_hint(route));
    }
}

fn login_hint(route: &str) -> &'static str {
    match route {
        DOCTOR_LOGIN_ROUTE => "run `clinic doctor login <username>`",
        PATIENT_LOGIN_ROUTE => "run `clinic patient login <phone-number>`",
        _ => "log in again",
    }
}

struct Context {
    config: ClinicConfig,
    session: Arc<SessionStore>,
}

impl Context {
    fn client(&self, config: ClientConfig) -> Result<ApiClient, CliError> {
        Ok(ApiClient::new(config, self.session.clone(), Arc::new(HintNavigator))?)
    }

    fn doctor(&self) -> Result<DoctorApi, CliError> {
        Ok(DoctorApi::new(self.client(self.config.doctor())?))
    }

    fn patient(&self) -> Result<PatientApi, CliError> {
        Ok(PatientApi::new(self.client(self.config.patient())?))
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClinicConfig::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config = config.with_api_url(api_url)?;
    }
    if let Some(session_file) = cli.session_file {
        config.session_file = session_file;
    }
    tracing::debug!(api_url = %config.api_url, session_file = %config.session_file.display(), "config loaded");
    let session = Arc::new(SessionStore::load(FileStorage::new(config.session_file.clone())));
    let ctx = Context { config, session };

    match cli.command {
        Command::Whoami => print_json(&session_json(&ctx.session)),
        Command::Logout => {
            let cleared = ctx.session.logout();
            print_json(&json!({ "logged_out": cleared }))
        }
        Command::Guard { path } => {
            let decision = RouteGuard::clinic().check(&ctx.session, &path);
            print_json(&decision_json(&path, &decision))
        }
        Command::Doctor(doctor) => run_doctor(&ctx, doctor).await,
        Command::Patient(patient) => run_patient(&ctx, patient).await,
    }
}

async fn run_doctor(ctx: &Context, doctor: DoctorCommand) -> Result<(), CliError> {
    let api = ctx.doctor()?;
    let json = match doctor.command {
        DoctorSubcommand::Login { username, password } => api.login(&username, &password).await?,
        DoctorSubcommand::Queue { user_id } => {
            let user_id = match user_id {
                Some(id) => id,
                None => identity_id(&ctx.session)?,
            };
            json!(api.queue(&user_id).await?)
        }
        DoctorSubcommand::QueueDetails => serde_json::to_value(api.fetch_queue_details().await?)?,
        DoctorSubcommand::Summary { record_id } => serde_json::to_value(api.case_summary(&record_id).await?)?,
        DoctorSubcommand::Report { record_id, text } => serde_json::to_value(api.submit_report(&record_id, &text).await?)?,
        DoctorSubcommand::Import { file } => {
            let bytes = read_file(&file)?;
            serde_json::to_value(api.import_questionnaire(&file_name(&file), bytes).await?)?
        }
    };
    print_json(&json)
}

async fn run_patient(ctx: &Context, patient: PatientCommand) -> Result<(), CliError> {
    let api = ctx.patient()?;
    let json = match patient.command {
        PatientSubcommand::Login { phone_number, password } => api.login(&phone_number, &password).await?,
        PatientSubcommand::Register { phone_number, password } => {
            serde_json::to_value(api.register(&phone_number, &password).await?)?
        }
        PatientSubcommand::Bind(args) => {
            let form = IdentityForm {
                username: args.username,
                gender: args.gender,
                birth: args.birth,
                ethnicity: args.ethnicity,
                origin: args.origin,
            };
            serde_json::to_value(api.bind_identity(&form).await?)?
        }
        PatientSubcommand::Info => serde_json::to_value(api.user_info().await?)?,
        PatientSubcommand::Departments => serde_json::to_value(api.departments().await?)?,
        PatientSubcommand::Questionnaire { department_id } => {
            serde_json::to_value(api.questionnaire(&department_id).await?)?
        }
        PatientSubcommand::Submit(args) => {
            let submission = QuestionnaireSubmission {
                questionnaire_id: args.questionnaire_id,
                department_id: args.department_id,
                answers: serde_json::from_str::<Value>(&args.answers)?,
                file_id: args.file_ids,
            };
            serde_json::to_value(api.submit_questionnaire(&submission).await?)?
        }
        PatientSubcommand::Upload { file, mime } => {
            let bytes = read_file(&file)?;
            serde_json::to_value(api.upload_file(&file_name(&file), mime.as_deref(), bytes).await?)?
        }
        PatientSubcommand::Record { record_id } => api.submission_detail(&record_id).await?,
        PatientSubcommand::Submissions => serde_json::to_value(api.submitted_questionnaires().await?)?,
    };
    print_json(&json)
}

fn identity_id(session: &SessionStore) -> Result<String, CliError> {
    session
        .snapshot()
        .identity
        .and_then(|identity| identity.id())
        .ok_or(CliError::Client(ClientError::NotLoggedIn))
}

fn session_json(session: &SessionStore) -> Value {
    let snapshot = session.snapshot();
    json!({
        "logged_in": snapshot.is_logged_in(),
        "role": snapshot.role.as_str(),
        "identity": snapshot.identity.as_ref().map(|identity| identity.record().clone()),
    })
}

fn decision_json(path: &str, decision: &GuardDecision) -> Value {
    match decision {
        GuardDecision::Allow => json!({ "path": path, "decision": "allow" }),
        GuardDecision::Redirect(to) => json!({ "path": path, "decision": "redirect", "to": to }),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::ReadFile { path: path.to_owned(), source })
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
