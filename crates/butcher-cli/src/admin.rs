//! Administrator account commands.

use butcher_core::validation::{normalize_email, require_text, validate_password};
use butcher_db::NewUser;
use clap::Subcommand;

/// Sub-commands available under `admin`.
#[derive(Debug, Subcommand)]
pub enum AdminCommands {
    /// Create an admin, or promote and reset the user with this email
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        father_name: Option<String>,
    },
}

pub(crate) struct AdminInput<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub mobile: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub father_name: &'a str,
}

/// Validated, normalized account fields ready to hash and store.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct AdminAccount {
    pub email: String,
    pub mobile: String,
    pub first_name: String,
    pub last_name: String,
    pub father_name: String,
}

/// Apply the same field rules the registration endpoint uses.
///
/// # Errors
///
/// Returns an error naming the first field that fails validation.
pub(crate) fn validate_admin(input: &AdminInput<'_>) -> anyhow::Result<AdminAccount> {
    validate_password(input.password)?;
    Ok(AdminAccount {
        email: normalize_email(input.email)?,
        mobile: require_text("mobile", input.mobile, 30)?,
        first_name: require_text("first_name", input.first_name, 100)?,
        last_name: require_text("last_name", input.last_name, 100)?,
        father_name: input.father_name.trim().to_owned(),
    })
}

/// Create or promote an administrator account.
///
/// # Errors
///
/// Returns an error if validation, hashing or the database write fails.
pub(crate) async fn run_admin_create(
    pool: &sqlx::PgPool,
    input: &AdminInput<'_>,
) -> anyhow::Result<()> {
    let account = validate_admin(input)?;
    let password_hash = butcher_core::hash_password(input.password)?;

    let row = butcher_db::upsert_admin(
        pool,
        &NewUser {
            first_name: &account.first_name,
            last_name: &account.last_name,
            father_name: &account.father_name,
            email: &account.email,
            mobile: &account.mobile,
            password_hash: &password_hash,
        },
    )
    .await?;

    tracing::info!(user_id = row.id, "admin account saved");
    println!("admin {} ready (id {})", row.email, row.id);
    Ok(())
}
