//! Interactive OAuth flow.
//!
//! Reads the OAuth app from `MONZO_CLIENT_ID`, `MONZO_CLIENT_SECRET` and
//! `MONZO_REDIRECT_URI` (or `config/auth.json`, or prompts), sends you to the
//! authorization page, exchanges the code from the pasted redirect URL and
//! saves the tokens to `config/auth.json`.
//!
//! ```text
//! RUST_LOG=monzo_rs=debug cargo run --example auth_flow
//! ```

use std::io::{self, BufRead, Write};

use monzo_rs::{MonzoClient, Result};
use tracing_subscriber::EnvFilter;

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Monzo OAuth Authentication Flow ===");

    let mut builder = MonzoClient::builder().with_env();
    let probe = MonzoClient::builder().with_env().build()?;
    let app = probe.tokens().app();
    if app.client_id.is_none() {
        builder = builder.client_id(prompt("Enter your Monzo client_id")?);
    }
    if app.client_secret.is_none() {
        builder = builder.client_secret(prompt("Enter your Monzo client_secret")?);
    }
    if app.redirect_uri.is_none() {
        builder = builder.redirect_uri(prompt("Enter your redirect_uri")?);
    }
    let client = builder.build()?;

    let request = client.authorization_request(None)?;
    println!("\nVisit this URL to authorize the application:\n\n{}\n", request.url());
    println!("Approve the login in the Monzo app, then paste the full redirect URL.");
    let redirect = prompt("Redirect URL")?;

    let code = request.code_from_redirect(&redirect)?;
    client.exchange_code_for_token(&code)?;
    client.save_auth()?;

    let me = client.whoami()?;
    println!("Authenticated as {} (client {})", me.user_id, me.client_id);
    if let Some(path) = client.config().auth_file.as_ref() {
        println!("Tokens saved to {}", path.display());
    }

    Ok(())
}
