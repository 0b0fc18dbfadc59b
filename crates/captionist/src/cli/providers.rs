//! The `captionist providers` command.

use captionist_core::{CaptionOrchestrator, Config, ProviderStatus};
use console::style;

/// Print the fallback chain with each provider's availability.
///
/// Availability only reflects configuration (model ids, endpoints, keys);
/// no provider is called.
pub fn execute(config: Config) -> anyhow::Result<()> {
    let orchestrator = CaptionOrchestrator::from_config(&config);
    for line in render(&orchestrator.status()) {
        println!("{line}");
    }
    Ok(())
}

fn render(status: &[ProviderStatus]) -> Vec<String> {
    status
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let state = if entry.available {
                style("available").green()
            } else {
                style("not configured").red()
            };
            let role = if i == 0 { " (primary)" } else { "" };
            format!("{}. {:<10} {}{}", i + 1, entry.kind.as_str(), state, role)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionist_core::CaptionProviderKind;

    #[test]
    fn test_render_lists_in_order() {
        console::set_colors_enabled(false);
        let lines = render(&[
            ProviderStatus {
                kind: CaptionProviderKind::PublicInferenceApi,
                available: true,
            },
            ProviderStatus {
                kind: CaptionProviderKind::RemoteHostedModel,
                available: false,
            },
        ]);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1. hf"));
        assert!(lines[0].ends_with("available (primary)"));
        assert!(lines[1].starts_with("2. bedrock"));
        assert!(lines[1].ends_with("not configured"));
    }
}
