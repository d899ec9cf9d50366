use std::io::{BufRead, Write};

use {
    anyhow::{Context, Result},
    clap::Subcommand,
    edulift_client::ApiClient,
    edulift_session::User,
};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Log in and store the session.
    Login {
        /// Username (usually the account email).
        #[arg(long, short)]
        username: String,
        /// Password. Read from stdin when omitted.
        #[arg(long, env = "EDULIFT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Show whether a session is stored and for whom.
    Status,
    /// Fetch the logged-in user's profile from the backend.
    Whoami,
    /// Refresh the access token now.
    Refresh,
    /// Change the logged-in user's password.
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    /// Request a password reset mail.
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
}

pub async fn handle_auth(client: &ApiClient, action: AuthAction) -> Result<()> {
    match action {
        AuthAction::Login { username, password } => login(client, &username, password).await,
        AuthAction::Logout => logout(client),
        AuthAction::Status => status(client),
        AuthAction::Whoami => whoami(client).await,
        AuthAction::Refresh => {
            client.auth().refresh().await?;
            println!("Access token refreshed.");
            Ok(())
        },
        AuthAction::ChangePassword { current, new } => {
            let reply = client.auth().change_password(&current, &new).await?;
            println!("{}", reply_message(&reply, "Password changed."));
            Ok(())
        },
        AuthAction::ForgotPassword { email } => {
            let reply = client.auth().forgot_password(&email).await?;
            println!("{}", reply_message(&reply, "Reset instructions sent."));
            Ok(())
        },
    }
}

async fn login(client: &ApiClient, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password()?,
    };
    let user = client.auth().login(username, &password).await?;
    println!("Logged in as {}", describe_user(&user));
    Ok(())
}

fn prompt_password() -> Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("no password given");
    }
    Ok(password)
}

fn logout(client: &ApiClient) -> Result<()> {
    client.auth().logout()?;
    println!("Logged out.");
    Ok(())
}

fn status(client: &ApiClient) -> Result<()> {
    match client.auth().current_user()? {
        Some(user) => println!("Logged in as {}", describe_user(&user)),
        None => println!("Not logged in."),
    }
    Ok(())
}

async fn whoami(client: &ApiClient) -> Result<()> {
    let user = client.users().me().await?;
    println!("{}", describe_user(&user));
    println!("  id:     {}", user.id);
    println!("  email:  {}", user.email);
    println!("  active: {}", if user.is_active { "yes" } else { "no" });
    if let Some(ref created) = user.created_at {
        println!("  since:  {created}");
    }
    Ok(())
}

fn describe_user(user: &User) -> String {
    format!("{} <{}> [{}]", user.display_name(), user.username, user.role)
}

/// Backend confirmation text, or `fallback` when the reply has none.
fn reply_message(reply: &serde_json::Value, fallback: &str) -> String {
    reply
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}
