// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Allow a scaling group's members (and optionally this host) through one
//! ingress rule of a security group, and nothing else through that rule.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use sg_imds_client::DEFAULT_BASE_URL;
use sg_reconciler::Backends;
use sg_reconciler::Error;
use sg_reconciler::RuleMatchKey;
use sg_reconciler::RunConfig;
use sg_reconciler::SecurityGroupId;
use sg_reconciler::config::resolve_region;
use sg_reconciler::reconcile_security_group;
use sg_sim::SimCloud;
use slog::Drain;
use slog::Level;
use slog::Logger;
use slog::debug;
use slog_term::FullFormat;
use slog_term::TermDecorator;

mod cmd;

use cmd::CmdError;
use cmd::fatal;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Region to operate in (default: this host's region, from instance
    /// metadata)
    #[arg(short, long, env = "AWS_REGION")]
    region: Option<String>,

    /// Security group whose rule is managed, e.g. sg-asdf1234
    #[arg(short = 's', long, value_parser = parse_security_group_id)]
    security_group: SecurityGroupId,

    /// Lower bound of the rule (a port, or an ICMP type)
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    from: i64,

    /// Upper bound of the rule (a port, or an ICMP type)
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    to: i64,

    /// Protocol of the rule: tcp, udp or icmp
    #[arg(short, long, default_value = "tcp")]
    protocol: String,

    /// Also allow this host's own public address
    #[arg(short = 'i', long)]
    include_self: bool,

    /// Scaling group whose members' public addresses are allowed
    #[arg(short = 'a', long)]
    scaling_group: Option<String>,

    /// TOML file holding the state of the simulated cloud to operate on
    #[arg(long)]
    sim_state: Utf8PathBuf,

    /// Base URL of the instance metadata service
    #[arg(
        long,
        env = "SG_MANGLER_METADATA_URL",
        default_value = DEFAULT_BASE_URL,
    )]
    metadata_url: String,

    /// Log level (critical, error, warn, info, debug, trace)
    #[arg(
        long,
        env = "SG_MANGLER_LOG_LEVEL",
        default_value = "info",
        value_parser = parse_log_level,
    )]
    log_level: Level,

    /// Report what would change without changing it
    #[arg(long)]
    dry_run: bool,
}

fn parse_security_group_id(s: &str) -> Result<SecurityGroupId, String> {
    s.parse().map_err(|error: Error| match error {
        Error::Configuration { message } => message,
        other => other.to_string(),
    })
}

fn parse_log_level(s: &str) -> Result<Level, String> {
    s.parse().map_err(|()| format!("unknown log level {s:?}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(cmd_error) = do_run().await {
        fatal(cmd_error);
    }
}

async fn do_run() -> Result<(), CmdError> {
    // clap exits with status 2 on its own for malformed arguments.
    let args = Args::parse();

    let rule =
        RuleMatchKey::from_user_input(&args.protocol, args.from, args.to)
            .map_err(usage)?;
    let mut config = RunConfig::new(args.security_group.clone(), rule);
    config.scaling_group_name = args.scaling_group.clone();
    config.include_self = args.include_self;
    config.dry_run = args.dry_run;

    let log = create_logger(args.log_level);
    debug!(log, "starting"; "args" => ?args);

    let metadata =
        sg_imds_client::Client::new(&args.metadata_url, log.clone())
            .context("failed to create instance metadata client")
            .map_err(CmdError::Failure)?;
    let region = resolve_region(&log, args.region.as_deref(), &metadata)
        .await
        .map_err(usage)?;

    let cloud = SimCloud::from_file(&log, &args.sim_state, &region)
        .context("failed to load simulated cloud")
        .map_err(CmdError::Failure)?;
    let backends = Backends {
        scaling_groups: &cloud,
        compute: &cloud,
        metadata: &metadata,
        acl: &cloud,
    };

    let summary = reconcile_security_group(&log, &config, backends)
        .await
        .with_context(|| {
            format!("failed to reconcile {}", config.security_group_id)
        })
        .map_err(CmdError::Failure)?;
    println!("{summary}");
    Ok(())
}

/// Configuration problems are the operator's to fix; anything else is a
/// failure.
fn usage(error: Error) -> CmdError {
    match error {
        Error::Configuration { message } => CmdError::Usage(message),
        other => CmdError::Failure(anyhow::Error::new(other)),
    }
}

fn create_logger(level: Level) -> Logger {
    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, slog::o!())
}
