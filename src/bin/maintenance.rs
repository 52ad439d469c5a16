use std::env;

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use referral_desk::{
    auth::password::hash_password,
    config::AppConfig,
    db,
    jobs::prune_finished_jobs,
    models::{normalize_email, NewUser, ROLE_ADMIN},
    schema::users,
    telemetry::init_tracing,
};

const USAGE: &str = "Usage:\n  maintenance create-admin <username> <email> <password>\n  maintenance prune-jobs [days]";
const DEFAULT_PRUNE_DAYS: i64 = 30;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("warn");

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("create-admin") => create_admin(&args[1..]),
        Some("prune-jobs") => prune_jobs(args.get(1).map(String::as_str)),
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }
}

fn connect() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;
    Ok(pool)
}

fn create_admin(args: &[String]) -> Result<()> {
    let [username, email, password] = args else {
        bail!("create-admin expects <username> <email> <password>\n{USAGE}");
    };

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let admin = NewUser {
        id: Uuid::new_v4(),
        username: username.trim().to_string(),
        email: normalize_email(email),
        password_hash: hash_password(password)?,
        role: ROLE_ADMIN.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        phone_number: String::new(),
        unit_name: String::new(),
        title: String::new(),
    };
    diesel::insert_into(users::table)
        .values(&admin)
        .execute(&mut conn)
        .context("failed to insert admin user")?;

    println!("Created admin {} ({}).", admin.username, admin.id);
    Ok(())
}

fn prune_jobs(days: Option<&str>) -> Result<()> {
    let days = match days {
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("invalid number of days: {raw}"))?,
        None => DEFAULT_PRUNE_DAYS,
    };
    if days < 0 {
        bail!("number of days must not be negative");
    }

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    let cutoff = (Utc::now() - ChronoDuration::days(days)).naive_utc();
    let deleted = prune_finished_jobs(&mut conn, cutoff).context("failed to prune jobs")?;

    println!("Removed {deleted} finished jobs older than {days} days.");
    Ok(())
}
