//! Submit command implementation
//!
//! Builds the full dispatcher in-process and runs a single request through
//! it, which is handy for checking provider wiring without starting a server.

use crate::api::types::CapabilityResponseBody;
use crate::cli::output::format_attempts_table;
use crate::cli::serve::build_dispatcher;
use crate::cli::SubmitArgs;
use crate::config::ConduitConfig;
use crate::dispatch::{DispatchError, SubmitResponse};
use crate::request::{CapabilityRequest, Constraints, Payload};
use colored::Colorize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Build the request described by the command-line flags.
pub fn build_request(args: &SubmitArgs) -> Result<CapabilityRequest, Box<dyn std::error::Error>> {
    let payload = match (&args.text, &args.file) {
        (Some(text), _) => Payload::new(
            args.content_type.as_deref().unwrap_or("text/plain"),
            text.clone().into_bytes(),
        ),
        (None, Some(path)) => {
            let data = std::fs::read(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            Payload::new(
                args.content_type
                    .as_deref()
                    .unwrap_or("application/octet-stream"),
                data,
            )
        }
        (None, None) => return Err("either --text or --file is required".into()),
    };

    let mut constraints = Constraints::default();
    if let Some(max_cost) = args.max_cost {
        constraints = constraints.with_max_cost(max_cost);
    }
    if let Some(ms) = args.max_latency_ms {
        constraints = constraints.with_max_latency(Duration::from_millis(ms));
    }
    if let Some(ref language) = args.language {
        constraints = constraints.with_language(language.clone());
    }
    if let Some(ms) = args.deadline_ms {
        constraints = constraints.with_deadline(Duration::from_millis(ms));
    }

    let request = CapabilityRequest::new(&args.capability, payload).with_constraints(constraints);
    request.validate()?;
    Ok(request)
}

/// Handle `conduit submit` command
pub async fn handle_submit(
    args: &SubmitArgs,
    config: &ConduitConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let request = build_request(args)?;
    let dispatcher = build_dispatcher(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let _interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match dispatcher.submit_with_cancel(request, cancel).await {
        Ok(response) if args.json => Ok(serde_json::to_string_pretty(
            &CapabilityResponseBody::from(response),
        )?),
        Ok(response) => Ok(format_response(&response)),
        Err(e) => {
            report_failure(&e);
            Err(e.into())
        }
    }
}

/// Human-readable rendering of a successful submit.
pub fn format_response(response: &SubmitResponse) -> String {
    let mut out = String::new();

    let mut flags = Vec::new();
    if response.cached {
        flags.push("cached");
    }
    if response.coalesced {
        flags.push("coalesced");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" ({})", flags.join(", "))
    };

    out.push_str(&format!(
        "{} {}{}\n",
        "✓".green(),
        response.provider_used.bold(),
        flags
    ));
    out.push_str(&format!("  cost: {}\n", response.cost));

    if !response.attempts.is_empty() {
        out.push_str(&format_attempts_table(&response.attempts));
        out.push('\n');
    }

    match response.result.as_text() {
        Some(text) if response.result.is_textual() => out.push_str(text),
        _ => out.push_str(&format!(
            "<{}, {} bytes>",
            response.result.content_type,
            response.result.len()
        )),
    }

    out
}

fn report_failure(error: &DispatchError) {
    eprintln!("{} {}", "✗".red(), error.code().red());
    for failure in error.provider_failures() {
        eprintln!("  {}: {}", failure.provider_id, failure.reason);
    }
    if !error.attempts().is_empty() {
        eprintln!("{}", format_attempts_table(error.attempts()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use std::io::Write;

    fn parse(argv: &[&str]) -> SubmitArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            crate::cli::Commands::Submit(args) => args,
            _ => panic!("Expected Submit command"),
        }
    }

    fn config() -> ConduitConfig {
        toml::from_str(
            r#"
            [[capabilities]]
            name = "text_classification"

            [[providers]]
            id = "pricey"
            adapter = "static"
            capabilities = ["text_classification"]
            cost = { model = "per_call", price = 2.0 }

            [[providers]]
            id = "budget"
            adapter = "static"
            capabilities = ["text_classification"]
            cost = { model = "per_call", price = 0.1 }

            [providers.options]
            response = { label = "billing" }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_request_from_text() {
        let args = parse(&[
            "conduit",
            "submit",
            "text_classification",
            "--text",
            "refund",
            "--max-cost",
            "1.5",
            "--max-latency-ms",
            "250",
        ]);
        let request = build_request(&args).unwrap();
        assert_eq!(request.payload.content_type, "text/plain");
        assert_eq!(request.constraints.max_cost, Some(1.5));
        assert_eq!(
            request.constraints.max_latency,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_build_request_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = parse(&[
            "conduit",
            "submit",
            "speech_to_text",
            "--file",
            &path,
            "--content-type",
            "audio/wav",
        ]);
        let request = build_request(&args).unwrap();
        assert_eq!(request.payload.content_type, "audio/wav");
        assert_eq!(request.payload.len(), 4);
    }

    #[test]
    fn test_build_request_rejects_empty_text() {
        let args = parse(&["conduit", "submit", "text_classification", "--text", ""]);
        assert!(build_request(&args).is_err());
    }

    #[tokio::test]
    async fn test_handle_submit_picks_cheapest_static_provider() {
        let args = parse(&[
            "conduit",
            "submit",
            "text_classification",
            "--text",
            "refund",
            "--json",
        ]);
        let output = handle_submit(&args, &config()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["provider_used"], "budget");
        assert_eq!(parsed["result"]["json"]["label"], "billing");
    }

    #[tokio::test]
    async fn test_handle_submit_budget_exceeded() {
        let args = parse(&[
            "conduit",
            "submit",
            "text_classification",
            "--text",
            "refund",
            "--max-cost",
            "0.01",
        ]);
        let err = handle_submit(&args, &config()).await.unwrap_err();
        assert!(err.to_string().contains("Budget exceeded"));
    }
}
