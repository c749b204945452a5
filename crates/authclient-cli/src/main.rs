//! authclient - command-line front end for the session-aware auth client.
//!
//! Drives the `SessionController`: login, signup, logout, password reset,
//! and authenticated requests that refresh expired tokens transparently.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use authclient_core::{
    ClientError, Config, LoginCredentials, RequestDescriptor, SessionController, SessionEvent,
    SignupRequest,
};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// Constants
// ============================================================================

/// How long to wait for session signals after a command finishes
const EVENT_DRAIN_TIMEOUT_MS: u64 = 100;

const USAGE: &str = "\
Usage: authclient <command> [args]

Commands:
  status                      Show the current session
  login <email>               Log in (prompts for password)
  signup <name> <email>       Create an account (prompts for password)
  logout                      Clear the stored session
  forgot-password <email>     Request a password reset link
  reset-password <token>      Set a new password (prompts for it)
  get <path>                  Authenticated GET, prints the response body
  post <path> [json]          Authenticated POST with an optional JSON body";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let config = Config::load().context("Failed to load configuration")?;
    let storage = config.open_storage().context("Failed to open session storage")?;
    let controller =
        SessionController::new(&config, storage).context("Failed to initialise client")?;
    let mut events = controller.subscribe();
    info!(base_url = %config.base_url, "authclient starting");

    let result = run(&controller, command, &args[1..]).await;
    report_events(&mut events).await;

    match result {
        Err(e) if is_session_expired(&e) => {
            eprintln!("Session expired. Please log in again.");
            std::process::exit(1);
        }
        Err(e) if is_timeout(&e) => {
            eprintln!("Connection timed out. Please try again.");
            std::process::exit(1);
        }
        other => other,
    }
}

async fn run(controller: &SessionController, command: &str, args: &[String]) -> Result<()> {
    match (command, args) {
        ("status", []) => {
            print_status(controller);
            Ok(())
        }
        ("login", [email]) => {
            let password = prompt_password("Password: ")?;
            controller
                .login(&LoginCredentials::new(email.as_str(), password))
                .await
                .context("Login failed")?;
            println!("Login successful!");
            Ok(())
        }
        ("signup", [name, email]) => {
            let password = prompt_password("Password: ")?;
            let account = SignupRequest {
                name: name.clone(),
                email: email.clone(),
                password,
            };
            controller.signup(&account).await.context("Signup failed")?;
            println!("Account created, you are logged in.");
            Ok(())
        }
        ("logout", []) => {
            controller.logout()?;
            println!("Logged out.");
            Ok(())
        }
        ("forgot-password", [email]) => {
            let message = controller.forgot_password(email).await?;
            println!("{}", message);
            Ok(())
        }
        ("reset-password", [token]) => {
            let password = prompt_password("New password: ")?;
            let message = controller.reset_password(token, &password).await?;
            println!("{}", message);
            Ok(())
        }
        ("get", [path]) => send(controller, RequestDescriptor::get(path.as_str())).await,
        ("post", [path]) => send(controller, RequestDescriptor::post(path.as_str())).await,
        ("post", [path, body]) => {
            let body: serde_json::Value =
                serde_json::from_str(body).context("Request body is not valid JSON")?;
            let descriptor = RequestDescriptor::post(path.as_str()).json(&body)?;
            send(controller, descriptor).await
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

async fn send(controller: &SessionController, descriptor: RequestDescriptor) -> Result<()> {
    let response = controller.execute(&descriptor).await?;
    eprintln!("HTTP {}", response.status);

    let mut stdout = io::stdout();
    match serde_json::from_str::<serde_json::Value>(&response.body) {
        Ok(json) => writeln!(stdout, "{}", serde_json::to_string_pretty(&json)?)?,
        Err(_) => writeln!(stdout, "{}", response.body)?,
    }
    Ok(())
}

fn print_status(controller: &SessionController) {
    if !controller.is_authenticated() {
        println!("Not logged in.");
        return;
    }
    match controller.profile() {
        Some(profile) => println!("Logged in as {} <{}>", profile.name, profile.email),
        None => println!("Logged in."),
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)?;
    Ok(password)
}

/// Print any session signals raised while the command ran
async fn report_events(events: &mut broadcast::Receiver<SessionEvent>) {
    let timeout = Duration::from_millis(EVENT_DRAIN_TIMEOUT_MS);
    while let Ok(Ok(event)) = tokio::time::timeout(timeout, events.recv()).await {
        match event {
            SessionEvent::Expired => info!("Session expired"),
            SessionEvent::Cleared => info!("Session cleared"),
        }
    }
}

fn is_session_expired(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ClientError>()
        .map(ClientError::is_session_expired)
        .unwrap_or(false)
}

fn is_timeout(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<ClientError>(),
        Some(ClientError::Transport(transport)) if transport.is_timeout()
    )
}
