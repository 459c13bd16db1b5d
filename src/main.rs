use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use threadwatch::app::AppContext;
use threadwatch::cli::commands::{self, PostOptions};
use threadwatch::cli::{Cli, Commands, SiteAction};
use threadwatch::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Sites { action } => match action {
            SiteAction::List => commands::list_sites(&ctx)?,
            SiteAction::Add { kind } => commands::add_site(&ctx, &kind)?,
            SiteAction::Remove { id } => commands::remove_site(&ctx, id)?,
            SiteAction::Order { ids } => commands::order_sites(&ctx, &ids)?,
            SiteAction::Settings { id, json } => {
                commands::update_site_settings(&ctx, id, &json)?
            }
        },
        Commands::Boards { site, refresh } => {
            commands::list_boards(&ctx, site, refresh).await?;
        }
        Commands::AddBoard { site, code, name } => {
            commands::add_board(&ctx, site, &code, name.as_deref())?;
        }
        Commands::Resolve { url } => {
            commands::resolve_url(&ctx, &url)?;
        }
        Commands::Watch { url } => {
            commands::watch(&ctx, &url).await?;
        }
        Commands::Post {
            url,
            comment,
            name,
            subject,
            options,
            file,
            spoiler,
            captcha,
            challenge,
            password,
        } => {
            let opts = PostOptions {
                comment: &comment,
                name: &name,
                subject: &subject,
                options: &options,
                file: file.as_deref(),
                spoiler,
                captcha: captcha.as_deref(),
                challenge: challenge.as_deref(),
                password: password.as_deref(),
            };
            commands::post(&ctx, &url, opts).await?;
        }
        Commands::Delete {
            url,
            post,
            password,
            image_only,
        } => {
            commands::delete(&ctx, &url, post, &password, image_only).await?;
        }
    }

    Ok(())
}
