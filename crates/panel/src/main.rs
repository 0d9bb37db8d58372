use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ratingsline_core::{FocusItem, MediaType};
use ratingsline_db::{SqliteBlobStore, SqliteSettings};
use ratingsline_metadata::clock::SystemClock;
use ratingsline_metadata::transport::ReqwestTransport;
use ratingsline_panel::{LogTarget, Phase, Pipeline, config};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Ratings and details line for focused movies and shows.
///
/// Settings and the ratings cache live in a SQLite database, selected with
/// `--db` or the `RATINGSLINE_DB` environment variable.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Cli {
    /// Path of the SQLite database.
    #[arg(long)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Focus a panel on each item in turn and log what it draws.
    Focus {
        /// Items as `<movie|tv>:<id>[:title]`.
        #[arg(required = true)]
        items: Vec<String>,

        /// Pause between focus changes, in milliseconds.
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
    /// Read or change stored settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Get { key: String },
    Set { key: String, value: String },
    /// Remove a stored setting so its default applies again.
    Unset { key: String },
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let db_path = cli
        .db
        .or_else(|| std::env::var("RATINGSLINE_DB").ok())
        .unwrap_or_else(|| "ratingsline.db".to_string());
    info!(db_path = %db_path, "connecting to database");

    let pool = ratingsline_db::connect(&db_path)
        .await
        .context("failed to connect to database")?;
    ratingsline_db::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    ratingsline_db::repo::settings::insert_defaults(&pool)
        .await
        .context("failed to seed default settings")?;

    match cli.command {
        Command::Focus { items, interval_ms } => {
            let items = items
                .iter()
                .map(String::as_str)
                .map(parse_focus_item)
                .collect::<anyhow::Result<Vec<_>>>()?;

            let pipeline = Pipeline::build(
                config::load_from_env(),
                Arc::new(SqliteBlobStore::new(pool.clone())),
                Arc::new(SqliteSettings::new(pool.clone())),
                Arc::new(ReqwestTransport::new()),
                Arc::new(SystemClock),
            )
            .await;
            focus(&pipeline, items, Duration::from_millis(interval_ms)).await?;
        }
        Command::Settings { action } => match action {
            SettingsAction::Get { key } => {
                let value = ratingsline_db::repo::settings::get(&pool, &key)
                    .await
                    .context("failed to read setting")?;
                match value {
                    Some(value) => println!("{value}"),
                    None => bail!("setting {key} is not set"),
                }
            }
            SettingsAction::Set { key, value } => {
                ratingsline_db::repo::settings::set(&pool, &key, &value)
                    .await
                    .context("failed to write setting")?;
                info!(key = %key, "setting updated");
            }
            SettingsAction::Unset { key } => {
                let removed = ratingsline_db::repo::settings::delete(&pool, &key)
                    .await
                    .context("failed to remove setting")?;
                if removed {
                    info!(key = %key, "setting removed");
                } else {
                    warn!(key = %key, "setting was not set");
                }
            }
            SettingsAction::List => {
                let all = ratingsline_db::repo::settings::list(&pool)
                    .await
                    .context("failed to list settings")?;
                for (key, value) in all {
                    // Keys are shown, their values are not.
                    if key.ends_with("_api_key") && !value.is_empty() {
                        println!("{key}=<set>");
                    } else {
                        println!("{key}={value}");
                    }
                }
            }
        },
    }

    Ok(())
}

async fn focus(pipeline: &Pipeline, items: Vec<FocusItem>, interval: Duration) -> anyhow::Result<()> {
    let panel = pipeline.panel(Arc::new(LogTarget));
    panel.create();
    info!(panel_id = %panel.panel_id(), items = items.len(), "focusing items");

    let last_id = items.last().and_then(|item| item.id.clone());
    for item in items {
        panel.update(item);
        tokio::time::sleep(interval).await;
    }

    let config = pipeline.config();
    let deadline = config.debounce + config.ratings_timeout + config.metadata_timeout;
    let settled = tokio::time::timeout(deadline, async {
        while panel.phase() != Phase::Rendered {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if settled.is_err() {
        warn!(phase = ?panel.phase(), "panel did not finish drawing");
    }

    if let Some(ratings) = last_id.as_deref().and_then(|id| panel.ratings_for(id)) {
        println!(
            "{}",
            serde_json::to_string_pretty(&ratings).context("failed to encode ratings")?
        );
    }

    panel.destroy();
    Ok(())
}

/// `movie:550:Fight Club` or `tv:1396`.
fn parse_focus_item(raw: &str) -> anyhow::Result<FocusItem> {
    let mut parts = raw.splitn(3, ':');
    let method = parts.next().unwrap_or_default().trim();
    let id = parts.next().map(str::trim).filter(|id| !id.is_empty());
    let title = parts.next().map(|t| t.trim().to_string());

    let Some(media_type) = MediaType::from_method(method) else {
        bail!("unknown media type {method:?} in {raw:?}; expected movie or tv");
    };
    let Some(id) = id else {
        bail!("missing id in {raw:?}");
    };

    let mut item = FocusItem {
        id: Some(id.to_string()),
        method: Some(media_type.tmdb_segment().to_string()),
        ..Default::default()
    };
    match media_type {
        MediaType::Movie => item.title = title,
        MediaType::Show => item.name = title,
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_movie_with_title() {
        let item = parse_focus_item("movie:550:Fight Club: Remastered").unwrap();
        assert_eq!(item.id.as_deref(), Some("550"));
        assert_eq!(item.method.as_deref(), Some("movie"));
        assert_eq!(item.display_title(), "Fight Club: Remastered");
    }

    #[test]
    fn parses_show_without_title() {
        let item = parse_focus_item("tv:1396").unwrap();
        let media = item.media_ref().unwrap();
        assert_eq!(media.media_type, MediaType::Show);
        assert_eq!(item.display_title(), "");
    }

    #[test]
    fn rejects_unknown_type_and_missing_id() {
        assert!(parse_focus_item("book:1").is_err());
        assert!(parse_focus_item("movie:").is_err());
        assert!(parse_focus_item("movie").is_err());
    }

    #[test]
    fn settings_unset_takes_a_key() {
        let cli = Cli::try_parse_from(["ratingsline", "settings", "unset", "tmdb_api_key"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Settings { action: SettingsAction::Unset { key } } if key == "tmdb_api_key"
        ));
        assert!(Cli::try_parse_from(["ratingsline", "settings", "unset"]).is_err());
    }
}
