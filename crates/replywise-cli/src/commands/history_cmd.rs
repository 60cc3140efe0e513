//! `replywise history` -- show recorded requests.

use clap::Args;
use replywise_llm::{HistoryStore, JsonFileHistory};
use replywise_types::{HistoryEntry, HistoryStatus};

/// Arguments for the `history` subcommand.
#[derive(Args)]
pub struct HistoryArgs {
    /// Show only the most recent N entries.
    #[arg(short, long)]
    pub limit: Option<usize>,
}

fn format_entry(entry: &HistoryEntry) -> String {
    let status = match entry.status {
        HistoryStatus::Success => "ok",
        HistoryStatus::Error => "error",
    };
    let tokens = entry
        .tokens_total
        .map(|t| format!("{t} tok"))
        .unwrap_or_else(|| "- tok".into());
    let ttft = entry
        .time_to_first_token_ms
        .map(|ms| format!("{ms} ms"))
        .unwrap_or_else(|| "-".into());
    format!(
        "{} [{status}] {}/{} {} ms (first token {ttft}, {tokens})\n  > {}\n  < {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.provider,
        entry.model,
        entry.duration_ms,
        entry.input_summary,
        entry.output_text.replace('\n', "\n    "),
    )
}

/// Run the history command.
pub async fn run(args: HistoryArgs) -> anyhow::Result<()> {
    let history = JsonFileHistory::new(super::history_path()?);
    let entries = history
        .entries()
        .await
        .map_err(|e| anyhow::anyhow!("failed to read history: {e}"))?;

    if entries.is_empty() {
        println!("No history recorded.");
        return Ok(());
    }

    let skip = args
        .limit
        .map_or(0, |limit| entries.len().saturating_sub(limit));
    for entry in &entries[skip..] {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use replywise_types::{ProviderId, Usage};

    #[test]
    fn formats_success_entry() {
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        let entry = HistoryEntry::new(
            ProviderId::Openai,
            "gpt-4o-mini",
            "dinner?",
            "Sure,\nsee you",
            Some(usage),
            Some(120),
            800,
            HistoryStatus::Success,
        );
        let text = format_entry(&entry);
        assert!(text.contains("[ok] openai/gpt-4o-mini 800 ms"));
        assert!(text.contains("first token 120 ms, 15 tok"));
        assert!(text.contains("> dinner?"));
        assert!(text.contains("< Sure,\n    see you"));
    }
}
