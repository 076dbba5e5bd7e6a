use colored::*;
use std::fs;
use std::io;
use std::path::Path;

use crate::config::Config;

/// Startup checks run before the dashboard opens the database
pub fn run_onboarding_checks(config: &Config) -> Result<(), OnboardingError> {
    println!("{}", "=".repeat(60).bright_cyan());
    println!("{}", "  Exchange Dashboard - Initialization".bright_cyan().bold());
    println!("{}", "=".repeat(60).bright_cyan());
    println!();

    check_database_permissions(&config.database_path)?;
    check_market_endpoint(&config.coingecko_api_base)?;

    println!("{}", "✓ All configuration checks passed!".green().bold());
    println!();

    Ok(())
}

fn check_database_permissions(db_path: &str) -> Result<(), OnboardingError> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(OnboardingError::MissingDirectory(parent.display().to_string()));
        }
    }

    match fs::OpenOptions::new().write(true).create(true).open(db_path) {
        Ok(_) => {
            println!("{} Balance storage writable ({})", "✓".green(), db_path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(OnboardingError::DatabasePermissionDenied(db_path.to_string()))
        }
        Err(e) => Err(OnboardingError::DatabaseError(e.to_string())),
    }
}

fn check_market_endpoint(base: &str) -> Result<(), OnboardingError> {
    if !base.starts_with("https://") && !base.starts_with("http://") {
        return Err(OnboardingError::InvalidMarketEndpoint(base.to_string()));
    }
    if base.starts_with("http://") {
        println!("{} Market data over plain HTTP ({})", "⚠".yellow(), base);
    } else {
        println!("{} Market data endpoint {}", "✓".green(), base);
    }
    Ok(())
}

/// Startup problems, rendered as fix-it instructions for the user
#[derive(Debug)]
pub enum OnboardingError {
    MissingDirectory(String),
    DatabasePermissionDenied(String),
    DatabaseError(String),
    InvalidMarketEndpoint(String),
}

/// Print a framed error: red title, detail lines, then numbered fixes
fn write_banner(
    f: &mut std::fmt::Formatter<'_>,
    title: &str,
    details: &[String],
    fixes: &[String],
) -> std::fmt::Result {
    let rule = "-".repeat(60);
    writeln!(f)?;
    writeln!(f, "{}", format!("[!] {}", title).red().bold())?;
    writeln!(f, "{}", rule.red())?;
    for line in details {
        writeln!(f, "{}", line)?;
    }
    if !fixes.is_empty() {
        writeln!(f)?;
        writeln!(f, "{}", ">> HOW TO FIX:".yellow().bold())?;
        for (i, fix) in fixes.iter().enumerate() {
            writeln!(f, "{}. {}", i + 1, fix)?;
        }
    }
    writeln!(f, "{}", rule.red())
}

impl std::fmt::Display for OnboardingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnboardingError::MissingDirectory(dir) => write_banner(
                f,
                "Balance storage folder missing",
                &[format!("The folder '{}' does not exist.", dir.yellow())],
                &[
                    format!("Create it with {}", format!("mkdir -p {}", dir).cyan()),
                    format!("Or point {} in '.env' somewhere else", "DATABASE_PATH".cyan()),
                ],
            ),
            OnboardingError::DatabasePermissionDenied(path) => write_banner(
                f,
                "Balance storage is not writable",
                &[
                    format!("Balances are saved to '{}', but it cannot be opened for writing.", path.yellow()),
                    "Deposits, withdrawals and transfers would be lost on exit.".to_string(),
                ],
                &[
                    format!("Grant write access, e.g. {}", format!("chmod u+w {}", path).cyan()),
                    format!("Or set {} in '.env' to a writable file", "DATABASE_PATH".cyan()),
                ],
            ),
            OnboardingError::DatabaseError(err) => write_banner(
                f,
                "Balance storage check failed",
                &[format!("Error: {}", err)],
                &[],
            ),
            OnboardingError::InvalidMarketEndpoint(base) => write_banner(
                f,
                "Bad market data URL",
                &[format!("'{}' is not an http(s) URL.", base.yellow())],
                &[
                    format!("Remove {} from '.env' to use the public API", "COINGECKO_API_BASE".cyan()),
                    format!("Or set it to e.g. {}", "https://api.coingecko.com/api/v3".cyan()),
                ],
            ),
        }
    }
}

impl std::error::Error for OnboardingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directory_reported() {
        let err = check_database_permissions("/definitely/not/here/dashboard.db").unwrap_err();
        assert!(matches!(err, OnboardingError::MissingDirectory(_)));
    }

    #[test]
    fn test_error_banner_lists_fixes() {
        colored::control::set_override(false);
        let text = OnboardingError::MissingDirectory("/srv/dash".to_string()).to_string();
        assert!(text.contains("Balance storage folder missing"));
        assert!(text.contains("1. Create it with mkdir -p /srv/dash"));
        assert!(text.contains("2. Or point DATABASE_PATH"));
    }

    #[test]
    fn test_market_endpoint_scheme() {
        assert!(check_market_endpoint("https://api.coingecko.com/api/v3").is_ok());
        assert!(matches!(
            check_market_endpoint("api.coingecko.com"),
            Err(OnboardingError::InvalidMarketEndpoint(_))
        ));
    }
}
