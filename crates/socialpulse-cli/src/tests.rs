use super::*;

#[test]
fn parses_query_with_defaults() {
    let cli = Cli::try_parse_from(["socialpulse-cli", "query", "AAPL"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Query {
            ref query,
            window: Window::Hours24,
            dry_run: false,
        } if query == "AAPL"
    ));
}

#[test]
fn parses_query_window_and_dry_run() {
    let cli = Cli::try_parse_from([
        "socialpulse-cli",
        "query",
        "Apple Inc.",
        "--window",
        "7d",
        "--dry-run",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Query {
            window: Window::Days7,
            dry_run: true,
            ..
        }
    ));
}

#[test]
fn rejects_unknown_window() {
    let result = Cli::try_parse_from(["socialpulse-cli", "query", "AAPL", "--window", "30d"]);
    assert!(result.is_err());
}

#[test]
fn parses_resolve_command() {
    let cli = Cli::try_parse_from(["socialpulse-cli", "resolve", "$tsla"])
        .expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Resolve { ref query } if query == "$tsla"));
}

#[test]
fn parses_health_command() {
    let cli = Cli::try_parse_from(["socialpulse-cli", "health"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Health));
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["socialpulse-cli"]).is_err());
}
