//! Account command implementation.

use anyhow::{Context, Result};
use console::style;

use tergite_hal::AccountInfo;

use super::common::Session;

/// Save (or overwrite) an account in the account file.
pub fn save(session: &Session, service_name: &str, url: &str, token: Option<&str>) -> Result<()> {
    let store = session.store()?;
    let mut account = AccountInfo::new(service_name, url);
    if let Some(token) = token {
        account = account.with_token(token);
    }

    store
        .save(std::slice::from_ref(&account))
        .with_context(|| format!("Failed to write {}", store.path().display()))?;

    println!(
        "{} Saved account {} to {}",
        style("✓").green().bold(),
        style(service_name).cyan(),
        store.path().display()
    );
    Ok(())
}

/// List saved accounts without their tokens.
pub fn list(session: &Session) -> Result<()> {
    let store = session.store()?;
    let accounts = store.load()?;

    if accounts.is_empty() {
        println!(
            "{} No accounts saved in {}",
            style("→").cyan().bold(),
            store.path().display()
        );
        return Ok(());
    }

    println!("{}", style("Saved accounts:").bold());
    println!();
    for account in &accounts {
        println!(
            "  {} {}",
            style("●").green(),
            style(&account.service_name).bold()
        );
        println!("    URL: {}", account.url);
        println!(
            "    Token: {}",
            if account.token.is_some() { "set" } else { "none" }
        );
        for (key, value) in &account.extras {
            println!("    {key}: {value}");
        }
    }
    Ok(())
}

/// Remove an account from the account file.
pub fn delete(session: &Session, service_name: &str) -> Result<()> {
    let store = session.store()?;
    if !store.delete(service_name)? {
        anyhow::bail!(
            "No account named '{service_name}' in {}",
            store.path().display()
        );
    }
    println!(
        "{} Deleted account {}",
        style("✓").green().bold(),
        style(service_name).cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".qiskit").join("tergiterc");
        let session = Session::new(Some(rc.clone()), None);

        save(&session, "local", "http://localhost:8002", Some("secret")).unwrap();
        let accounts = session.store().unwrap().load().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].token.as_deref(), Some("secret"));
        list(&session).unwrap();

        delete(&session, "local").unwrap();
        assert!(session.store().unwrap().load().unwrap().is_empty());
        assert!(delete(&session, "local").is_err());
    }
}
