use std::fs;

use inquire::validator::Validation;
use inquire::{Password, Text};

use crate::auth::SecretHasher;
use crate::config::ServerConfig;
use crate::server::validation::{
    validate_address, validate_email, validate_password, validate_user_name,
};
use crate::store::{SqliteStore, Store};
use crate::types::{NewUser, Role};

type FieldValidator = fn(&str) -> Result<(), String>;

fn to_validation(result: Result<(), String>) -> Validation {
    result
        .map(|()| Validation::Valid)
        .unwrap_or_else(|e| Validation::Invalid(e.into()))
}

/// Uses the flag value if given, otherwise prompts for it.
fn resolve_text(
    value: Option<String>,
    flag: &str,
    prompt: &str,
    validate: FieldValidator,
    non_interactive: bool,
) -> anyhow::Result<String> {
    if let Some(value) = value {
        validate(&value).map_err(anyhow::Error::msg)?;
        return Ok(value);
    }
    if non_interactive {
        anyhow::bail!("--{flag} is required in non-interactive mode");
    }
    Ok(Text::new(prompt)
        .with_validator(move |input: &str| Ok(to_validation(validate(input))))
        .prompt()?)
}

fn resolve_password(value: Option<String>, non_interactive: bool) -> anyhow::Result<String> {
    if let Some(value) = value {
        validate_password(&value).map_err(anyhow::Error::msg)?;
        return Ok(value);
    }
    if non_interactive {
        anyhow::bail!("--password is required in non-interactive mode");
    }
    Ok(Password::new("Password:")
        .with_validator(|input: &str| Ok(to_validation(validate_password(input))))
        .prompt()?)
}

pub struct InitArgs {
    pub data_dir: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub address: Option<String>,
    pub non_interactive: bool,
}

pub fn run_admin_init(args: InitArgs) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir: args.data_dir.into(),
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if store.has_admin()? {
        anyhow::bail!(
            "Server already initialized. An admin account exists in {}",
            config.db_path().display()
        );
    }

    let non_interactive = args.non_interactive;
    let name = resolve_text(args.name, "name", "Name:", validate_user_name, non_interactive)?;
    let email = resolve_text(args.email, "email", "Email:", validate_email, non_interactive)?;
    let password = resolve_password(args.password, non_interactive)?;
    let address = match args.address {
        Some(address) => {
            validate_address(&address).map_err(anyhow::Error::msg)?;
            address
        }
        None if non_interactive => String::new(),
        None => Text::new("Address:")
            .with_validator(|input: &str| Ok(to_validation(validate_address(input))))
            .prompt()?,
    };

    let password_hash = SecretHasher::new().hash(&password)?;
    let admin = store.create_user(&NewUser {
        name,
        email,
        password_hash,
        address,
        role: Role::Admin,
    })?;

    println!();
    println!("========================================");
    println!("Created admin account {} ({})", admin.email, admin.id);
    println!("Log in with POST /api/login");
    println!("========================================");
    println!();

    Ok(())
}
