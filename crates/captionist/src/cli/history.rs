//! The `captionist history` and `captionist show` commands.

use captionist_core::output::to_json;
use captionist_core::{CaptionRecord, Config};
use clap::Args;
use serde::Serialize;

use super::SessionArgs;

/// Arguments for the `history` command.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Records per page
    #[arg(short, long, default_value = "20", value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub limit: u16,

    /// Continue after the page that returned this token
    #[arg(long)]
    pub page_token: Option<String>,
}

/// Arguments for the `show` command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Image id from `captionist history`
    pub image_id: String,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// A record plus short-lived URLs for the stored image and thumbnail.
#[derive(Serialize)]
struct ShownRecord {
    #[serde(flatten)]
    record: CaptionRecord,
    access_url: String,
    thumbnail_access_url: String,
}

pub async fn execute_history(args: HistoryArgs, config: Config) -> anyhow::Result<()> {
    let pretty = config.output.pretty;
    let service = super::open_service(config).await?;
    let session = super::signed_in(&service, &args.session).await?;

    let page = service
        .history(&session.user_id, usize::from(args.limit), args.page_token.as_deref())
        .await?;
    tracing::debug!("{} record(s) on this page", page.records.len());

    println!("{}", to_json(&page, pretty)?);
    if let Some(token) = &page.next_page_token {
        eprintln!("More results: captionist history --page-token {token}");
    }
    Ok(())
}

pub async fn execute_show(args: ShowArgs, config: Config) -> anyhow::Result<()> {
    let pretty = config.output.pretty;
    let service = super::open_service(config).await?;
    let session = super::signed_in(&service, &args.session).await?;

    let record = service.get_caption(&session.user_id, &args.image_id).await?;
    let shown = ShownRecord {
        access_url: service.access_url(&session.user_id, &record.storage_url)?,
        thumbnail_access_url: service.access_url(&session.user_id, &record.thumbnail_url)?,
        record,
    };

    println!("{}", to_json(&shown, pretty)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: HistoryArgs,
    }

    #[test]
    fn test_history_defaults() {
        let args = Harness::try_parse_from(["captionist"]).unwrap().args;
        assert_eq!(args.limit, 20);
        assert!(args.page_token.is_none());
    }

    #[test]
    fn test_history_limit_bounds() {
        assert!(Harness::try_parse_from(["captionist", "--limit", "0"]).is_err());
        let args = Harness::try_parse_from(["captionist", "-l", "5", "--page-token", "tok"])
            .unwrap()
            .args;
        assert_eq!(args.limit, 5);
        assert_eq!(args.page_token.as_deref(), Some("tok"));
    }
}
