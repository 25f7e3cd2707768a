use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "OCS_HOST",
        "OCS_PORT",
        "OCS_DATABASE_URL",
        "OCS_DB_MAX_CONNECTIONS",
        "OCS_SHOPIFY_API_VERSION",
        "OCS_SHOPIFY_HMAC_CHECKS",
        "OCS_ORPHAN_RETENTION_DAYS",
        "OCS_ORPHAN_PRUNE_INTERVAL_MINS",
        "OCS_CREDIT_CLAIM_LEASE_MINS",
        "OCS_EXTERNAL_TIMEOUT_SECS",
        "OCS_MAILGUN_DOMAIN",
        "OCS_MAILGUN_FROM",
        "OCS_MAILGUN_TO",
        "OCS_MAILGUN_REGION",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
