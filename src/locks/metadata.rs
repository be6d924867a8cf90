//! Lock owner identities.

/// Generate a fresh owner identity: `user@host:pid:<random>`.
///
/// The random part keeps two maps in one process distinct, so they contend
/// for the lock like separate processes would.
pub fn owner_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}:{}:{}", user_at_host(), std::process::id(), &random[..8])
}

fn user_at_host() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
