use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::json;

use mail_sidepanel::config::{DriveLocation, PanelConfig};
use mail_sidepanel::contacts::{Reconciler, extract_contact};
use mail_sidepanel::folders::{Attachment, Suggestion, Target, TreeBuilder};
use mail_sidepanel::services::{GraphClient, MailItem};

#[derive(Debug, Parser)]
#[command(name = "mail-sidepanel")]
#[command(about = "Suggest a folder and reconcile the sender of a message", long_about = None)]
struct Args {
    /// Path to the raw message (.eml)
    message: PathBuf,

    /// Apply the proposed directory change instead of only reporting it
    #[arg(long)]
    confirm: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Args { message, confirm } = Args::parse();

    // Logs go to stderr; stdout carries the JSON report.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = PanelConfig::from_env()?;
    let policy = config.load_policy()?;

    let item = MailItem::from_file(&message)
        .with_context(|| format!("reading {}", message.display()))?;
    let contact = extract_contact(&item.body, &item.sender_name, &item.sender_email);
    let selected = Attachment::default_selection(&item.attachments);

    let mut report = json!({
        "subject": item.subject,
        "contact": contact,
        "selected_attachments": selected,
    });

    let Some(graph) = config.graph.as_ref() else {
        tracing::info!("GRAPH_ACCESS_TOKEN not set, skipping folder and directory steps");
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    };

    let mut client = GraphClient::new(&graph.base_url, graph.access_token.clone());
    match &graph.drive {
        DriveLocation::Personal => {}
        DriveLocation::Drive(id) => client = client.with_drive(id),
        DriveLocation::Site(path) => {
            let drive = client.resolve_drive(path).await?;
            client = client.with_drive(drive);
        }
    }
    let client = Arc::new(client);

    // ── Folder suggestion ───────────────────────────────────────────
    let forest = TreeBuilder::new(client.clone(), policy.expansion_policy()?)
        .with_max_in_flight(config.max_in_flight)
        .build(&config.root_id)
        .await?;

    let subject = Some(item.subject.as_str());
    let targets = Target::for_selection(&item.attachments, &selected, subject);
    let suggestion = policy.scope_chain().suggest(&forest, &targets);
    report["folder"] = match suggestion {
        Suggestion::None => serde_json::Value::Null,
        Suggestion::Match(candidate) => json!({
            "kind": suggestion.label(),
            "path": candidate.node.path,
            "id": candidate.node.id,
            "score": candidate.score,
        }),
        Suggestion::Fallback(node) => json!({
            "kind": suggestion.label(),
            "path": node.path,
            "id": node.id,
        }),
    };

    // ── Contact reconciliation ──────────────────────────────────────
    let reconciler = Reconciler::new(client);
    let mut cycle = reconciler.check(contact).await?;
    report["reconciliation"] = json!(cycle.state());

    if confirm && cycle.offers_mutation() {
        let outcome = reconciler.confirm(&mut cycle).await?;
        report["mutation"] = json!(outcome);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_and_confirm() {
        let args = Args::try_parse_from(["mail-sidepanel", "msg.eml", "--confirm"]).unwrap();
        assert_eq!(args.message, PathBuf::from("msg.eml"));
        assert!(args.confirm);

        let args = Args::try_parse_from(["mail-sidepanel", "--confirm", "msg.eml"]).unwrap();
        assert_eq!(args.message, PathBuf::from("msg.eml"));
        assert!(args.confirm);

        let args = Args::try_parse_from(["mail-sidepanel", "msg.eml"]).unwrap();
        assert!(!args.confirm);
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Args::try_parse_from(["mail-sidepanel", "--confrim", "msg.eml"]).is_err());
        assert!(Args::try_parse_from(["mail-sidepanel", "--verbose", "msg.eml"]).is_err());
    }

    #[test]
    fn requires_a_message() {
        assert!(Args::try_parse_from(["mail-sidepanel", "--confirm"]).is_err());
        assert!(Args::try_parse_from(["mail-sidepanel", "a.eml", "b.eml"]).is_err());
    }
}
