#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Configuration for the Argo rollup client.

use clap::{
    Parser,
    builder::{
        Styles,
        styling::{AnsiColor, Color, Style},
    },
};

mod chain;
pub use chain::{ContractAddresses, L1Opts, L2Opts};

mod role;
pub use role::{DriverOpts, ProverOpts, RoleOpts};

mod telemetry;
pub use telemetry::TelemetryOpts;

/// CLI options for the Argo rollup client.
#[derive(Debug, Clone, Parser)]
#[command(author, version, styles = cli_styles(), about)]
pub struct Opts {
    /// A unique name for this Argo instance, used in metrics and logs
    #[clap(long, env = "ARGO_INSTANCE_NAME", default_value = "argo")]
    pub instance_name: String,
    /// L1-related configuration options
    #[clap(flatten)]
    pub l1: L1Opts,
    /// L2-related configuration options
    #[clap(flatten)]
    pub l2: L2Opts,
    /// The contract addresses required to run the client.
    #[clap(flatten)]
    pub contracts: ContractAddresses,
    /// Telemetry-related configuration options
    #[clap(flatten)]
    pub telemetry: TelemetryOpts,
    /// The role to run.
    #[command(subcommand)]
    pub role: RoleOpts,
}

/// Styles for the CLI.
const fn cli_styles() -> Styles {
    Styles::styled()
        .usage(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .header(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .error(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .valid(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}

#[cfg(test)]
mod tests {
    use super::Opts;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Opts::command().debug_assert()
    }
}
