use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, error};

use studio_session::config::{config_schema, load_config_from, ConfigV1};
use studio_session::guard::GuardDecision;
use studio_session::session::{RefreshOutcome, SessionError};
use studio_session::startup;
use studio_session::state::AppState;
use studio_session::ui::{HistoryNavigator, Notice, NoticeLevel, Notifier};
use studio_session::utils::logger::init_logging;

#[derive(Parser)]
#[command(name = "studio-session", about = "Sign in to the studio API and manage the stored session")]
struct Args {
    #[arg(long, default_value = "./config.yaml", help = "Config file path")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STUDIO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in with it
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "STUDIO_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Verify the stored token and show who it belongs to
    Whoami,
    /// Exchange the stored token for a fresh one
    Refresh,
    /// Forget the stored token
    Logout,
    /// Keep the session alive and report changes until interrupted
    Watch,
    /// Print the configuration JSON schema
    Schema,
}

/// Prints notices to stderr, the way a toast would show them.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => eprintln!("✔ {notice}"),
            NoticeLevel::Error => eprintln!("✘ {notice}"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Command::Schema = args.command {
        println!("{}", config_schema());
        return ExitCode::SUCCESS;
    }

    let config = match load_config_from(&args.config) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Could not load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Could not set up logging: {e}");
        return ExitCode::FAILURE;
    }

    let state = match build_state(config, &args.command) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Could not build the session layer");
            return ExitCode::FAILURE;
        }
    };

    let code = run(&state, args.command).await;
    debug!(route = %state.navigator.current_route(), "Finished");
    code
}

/// Credential commands start where a sign-in form lives; everything else
/// behaves like a guarded page.
fn build_state(
    config: Arc<ConfigV1>,
    command: &Command,
) -> Result<AppState, studio_session::client::ApiError> {
    let start = match command {
        Command::Login { .. } | Command::Signup { .. } => config.session.landing_route.clone(),
        _ => config.session.dashboard_route.clone(),
    };
    startup::build(
        config,
        Arc::new(ConsoleNotifier),
        Arc::new(HistoryNavigator::new(start)),
    )
}

async fn run(state: &AppState, command: Command) -> ExitCode {
    match command {
        Command::Login { email, password } => {
            report_sign_in(state.session.login(&email, &password).await)
        }
        Command::Signup {
            username,
            email,
            password,
            full_name,
        } => report_sign_in(
            state
                .session
                .signup(&username, &email, &password, full_name.as_deref())
                .await,
        ),
        Command::Whoami => match state.guard.resolve().await {
            GuardDecision::Render => {
                if let Some(user) = state.session.current_session().user() {
                    println!("{} <{}>", user.display_name(), user.email);
                }
                ExitCode::SUCCESS
            }
            _ => {
                println!("Not signed in");
                ExitCode::FAILURE
            }
        },
        Command::Refresh => {
            state.session.initialize().await;
            match state.session.refresh_token().await {
                RefreshOutcome::Refreshed => {
                    println!("Token refreshed");
                    ExitCode::SUCCESS
                }
                RefreshOutcome::Skipped => {
                    println!("Not signed in");
                    ExitCode::FAILURE
                }
                RefreshOutcome::Stale | RefreshOutcome::LoggedOut => ExitCode::FAILURE,
            }
        }
        Command::Logout => {
            state.session.logout().await;
            ExitCode::SUCCESS
        }
        Command::Watch => watch(state).await,
        Command::Schema => ExitCode::SUCCESS,
    }
}

fn report_sign_in(result: Result<studio_session::models::User, SessionError>) -> ExitCode {
    match result {
        Ok(user) => {
            println!("Signed in as {}", user.display_name());
            ExitCode::SUCCESS
        }
        Err(e) => {
            debug!(error = %e, "Sign-in failed");
            ExitCode::FAILURE
        }
    }
}

async fn watch(state: &AppState) -> ExitCode {
    let initial = state.guard.resolve().await;
    println!("{}", describe(&initial, state));
    if initial != GuardDecision::Render {
        return ExitCode::FAILURE;
    }

    let mut decisions = state.guard.watch();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return ExitCode::SUCCESS,
            decision = decisions.next_decision() => match decision {
                Some(decision) => {
                    println!("{}", describe(&decision, state));
                    if decision != GuardDecision::Render {
                        return ExitCode::FAILURE;
                    }
                }
                None => return ExitCode::FAILURE,
            },
        }
    }
}

fn describe(decision: &GuardDecision, state: &AppState) -> String {
    match decision {
        GuardDecision::Loading => "Checking session".to_string(),
        GuardDecision::Redirect(route) => format!("Signed out; would go to {route}"),
        GuardDecision::Render => match state.session.current_session().user() {
            Some(user) => format!("Signed in as {}", user.display_name()),
            None => "Signed in".to_string(),
        },
    }
}
