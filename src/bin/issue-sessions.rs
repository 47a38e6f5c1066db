use std::error::Error;

use dotenv::dotenv;
use log::{debug, info, initialize_logger};
use structopt::StructOpt;

use scapture::config::get_variable;
use scapture::db::{Db, PgDb};
use scapture::entities::{Id, ProviderProfile};
use scapture::identity;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "issue-sessions",
    about = "Issue and print bearer session tokens for the given users"
)]
struct Opt {
    /// Signs in (creating if needed) the user with this provider identity,
    /// given as `provider:provider_id`
    #[structopt(long, parse(try_from_str = parse_identity))]
    identity: Option<(String, String)>,

    /// The display name to record for `--identity`
    #[structopt(long)]
    name: Option<String>,

    /// The email to record for `--identity`
    #[structopt(long)]
    email: Option<String>,

    /// The user IDs to issue sessions for
    ids: Vec<Id>,
}

fn parse_identity(raw: &str) -> Result<(String, String), String> {
    let mut pieces = raw.splitn(2, ':');

    match (pieces.next(), pieces.next()) {
        (Some(provider), Some(provider_id)) if !provider.is_empty() && !provider_id.is_empty() => {
            Ok((provider.to_owned(), provider_id.to_owned()))
        }
        _ => Err(format!("expected provider:provider_id, got {:?}", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let connection_string = get_variable("SCAPTURE_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string)
        .await
        .expect("create database pool from SCAPTURE_DB_CONNECTION_STRING");
    let db = PgDb::new(pool);

    if let Some((provider, provider_id)) = opt.identity {
        let profile = ProviderProfile {
            provider,
            provider_id,
            name: opt.name,
            email: opt.email,
            image: None,
        };

        let (user, token) = identity::sign_in(&logger, &db, profile).await?;
        println!("{}\t{}", user.id, token);
    }

    info!(logger, "Issuing sessions for {:?}...", &opt.ids);

    for id in opt.ids {
        let logger = logger.new(log::o!("user_id" => id));

        let token = db.create_session(id).await?;
        debug!(logger, "Issued session");

        println!("{}\t{}", id, token);
    }

    Ok(())
}
