//! Command handlers. Each one maps API errors to a readable message.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use taskdesk_core::api::{FilePart, ProgressCallback};
use taskdesk_core::{ApiError, Config, RequestOptions, SessionManager};

use crate::Command;

pub async fn run(command: Command, config: &mut Config) -> Result<()> {
    let manager = config.build_manager()?;

    match command {
        Command::Login { email } => login(&manager, config, email).await,
        Command::Register { name, email } => {
            let password = rpassword::prompt_password("Password: ")?;
            manager
                .register(&name, &email, &password)
                .await
                .map_err(describe)?;
            println!("Account created for {}. Sign in with `taskdesk login`.", email);
            Ok(())
        }
        Command::Logout => {
            manager.logout().await;
            println!("Signed out.");
            Ok(())
        }
        Command::Whoami => {
            let user = manager.verify_token().await.map_err(describe)?;
            println!("{} <{}>", user.display_name(), user.email);
            if let Some(role) = user.rol {
                println!("Role: {}", role);
            }
            Ok(())
        }
        Command::Status => {
            match manager.current_user() {
                Some(user) if manager.is_authenticated() => {
                    println!("Signed in as {} <{}>", user.display_name(), user.email)
                }
                _ => println!("Not signed in."),
            }
            Ok(())
        }
        Command::Projects => {
            let projects = require_session(&manager)?.list_projects().await.map_err(describe)?;
            for p in projects {
                println!(
                    "{:>5}  {:<40}  {}",
                    p.id,
                    p.nombre,
                    p.estado.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Tasks { project } => {
            let tasks = require_session(&manager)?
                .list_tasks(project)
                .await
                .map_err(describe)?;
            for t in tasks {
                let status = t.estado.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
                println!("{:>5}  {:<40}  {}", t.id, t.titulo, status);
            }
            Ok(())
        }
        Command::Users => {
            let users = require_session(&manager)?.list_users().await.map_err(describe)?;
            for u in users {
                println!(
                    "{:>5}  {:<30}  {:<30}  {}",
                    u.id,
                    u.display_name(),
                    u.email,
                    u.rol.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Roles => {
            let roles = require_session(&manager)?.list_roles().await.map_err(describe)?;
            for r in roles {
                println!("{:>5}  {:<20}  {}", r.id, r.nombre, r.permisos.join(", "));
            }
            Ok(())
        }
        Command::Activity { limit } => {
            let entries = require_session(&manager)?
                .recent_activity(limit)
                .await
                .map_err(describe)?;
            for e in entries {
                println!("{}  {}", e.created_at.as_deref().unwrap_or("-"), e.summary());
            }
            Ok(())
        }
        Command::Upload { file, project, task } => {
            let client = require_session(&manager)?;
            let part = FilePart::from_path("archivo", &file).await?;
            let progress: ProgressCallback = Arc::new(|sent, total| {
                eprint!("\rUploading {}/{} bytes", sent, total);
                let _ = io::stderr().flush();
            });
            let attachment = client
                .upload_attachment(project, task, part, Some(progress))
                .await
                .map_err(describe)?;
            eprintln!();
            println!(
                "Uploaded {} as #{} ({})",
                attachment.nombre_original,
                attachment.id,
                attachment.size_display()
            );
            Ok(())
        }
        Command::Download { id, name, dir } => {
            let path = require_session(&manager)?
                .download_file(&format!("/files/{}/download", id), &name, &dir)
                .await
                .map_err(describe)?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Command::Get { path } => {
            let body: Value = manager
                .client()
                .get(&path, RequestOptions::default())
                .await
                .map_err(describe)?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
    }
}

async fn login(manager: &SessionManager, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => {
            print!("Email: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    let password = rpassword::prompt_password("Password: ")?;

    let outcome = manager.login(&email, &password).await.map_err(describe)?;
    config.last_email = Some(email);
    config.save().context("Failed to save config")?;

    println!("Signed in as {}", outcome.user.display_name());
    Ok(())
}

fn require_session(manager: &SessionManager) -> Result<&taskdesk_core::ApiClient> {
    if !manager.is_authenticated() {
        anyhow::bail!("Not signed in. Run `taskdesk login` first.");
    }
    Ok(manager.client())
}

/// Render an API error the way a user should read it.
fn describe(err: ApiError) -> anyhow::Error {
    match &err {
        ApiError::Connection(_) => anyhow::anyhow!("Could not reach the server: {}", err),
        ApiError::Authentication(_) => {
            anyhow::anyhow!("{} - run `taskdesk login` to sign in again", err.message())
        }
        ApiError::Validation(body) => {
            let mut message = body.message.clone();
            if let Some(Value::Object(fields)) = &body.errors {
                for (field, detail) in fields {
                    let detail = detail.as_str().map(String::from).unwrap_or_else(|| detail.to_string());
                    message.push_str(&format!("\n  {}: {}", field, detail));
                }
            }
            anyhow::anyhow!(message)
        }
        _ => anyhow::anyhow!(err.message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdesk_core::ErrorBody;

    #[test]
    fn test_describe_validation_lists_fields() {
        let err = ApiError::Validation(ErrorBody {
            status: 422,
            message: "Validation failed".into(),
            errors: Some(serde_json::json!({"email": "invalid"})),
        });
        let text = describe(err).to_string();
        assert!(text.starts_with("Validation failed"));
        assert!(text.contains("email: invalid"));
    }

    #[test]
    fn test_describe_authentication_suggests_login() {
        let err = ApiError::Authentication(ErrorBody::new(401, "Token expirado"));
        assert!(describe(err).to_string().contains("taskdesk login"));
    }
}
