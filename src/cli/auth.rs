//! CLI handlers for session commands.

use crate::gateway::Gateway;

/// Handle `authgate auth login <email>`.
pub async fn handle_login(
    gateway: &Gateway,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let identity = gateway.login(email, password).await?;
    println!(
        "✅ Logged in as {}",
        identity.email.as_deref().unwrap_or(&identity.id)
    );
    Ok(())
}

/// Handle `authgate auth register <email>`.
pub async fn handle_register(
    gateway: &Gateway,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let body = gateway.register(email, password).await?;
    println!("✅ Registered {email}");
    if body.as_object().is_some_and(|o| !o.is_empty()) {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    println!("   Log in with: authgate auth login {email}");
    Ok(())
}

/// Handle `authgate auth status`.
pub fn handle_status(gateway: &Gateway) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = gateway.snapshot();
    println!("API base:      {}", snapshot.api_base);
    println!("State:         {}", snapshot.state);
    match &snapshot.identity {
        Some(identity) => println!(
            "User:          {}",
            identity.email.as_deref().unwrap_or(&identity.id)
        ),
        None => println!("User:          none"),
    }
    println!(
        "Access token:  {}",
        if snapshot.has_access_token { "present" } else { "none" }
    );
    println!(
        "Refresh token: {}",
        if snapshot.has_refresh_token { "present" } else { "none" }
    );
    if let Some(at) = snapshot.last_refresh {
        println!("Last refresh:  {}", at.to_rfc3339());
    }
    Ok(())
}

/// Handle `authgate auth refresh`.
pub async fn handle_refresh(gateway: &Gateway) -> Result<(), Box<dyn std::error::Error>> {
    gateway.refresh().await?;
    println!("✅ Access token refreshed");
    Ok(())
}

/// Handle `authgate auth logout`.
pub fn handle_logout(gateway: &Gateway) -> Result<(), Box<dyn std::error::Error>> {
    gateway.logout();
    println!("✅ Logged out");
    Ok(())
}
