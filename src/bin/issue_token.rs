use std::env;

use anyhow::{bail, Context, Result};

use ticket_service::auth::jwt::JwtService;
use ticket_service::auth::resolve_principal;
use ticket_service::config::AppConfig;

const USAGE: &str =
    "Usage: issue_token <subject> <role> [--org <org-id>] [--driver <driver-id>]";

/// Mints a bearer token signed with the configured secret, for local testing.
fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let mut args = env::args().skip(1);
    let (Some(subject), Some(role)) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };

    let mut org_id = None;
    let mut driver_id = None;
    while let Some(flag) = args.next() {
        let value = args.next().with_context(|| format!("{flag} needs a value"))?;
        match flag.as_str() {
            "--org" => org_id = Some(value),
            "--driver" => driver_id = Some(value),
            other => bail!("unknown option {other}\n{USAGE}"),
        }
    }

    let principal = resolve_principal(&role, org_id.as_deref(), driver_id.as_deref())?;
    let config = AppConfig::from_env()?;
    let jwt = JwtService::from_config(&config)?;
    let token = jwt.generate_token(&subject, &principal)?;

    println!("{token}");
    Ok(())
}
