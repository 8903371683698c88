#![deny(unused_variables)]
#![deny(unused_imports)]
#![deny(dead_code)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use itertools::Itertools;
use std::process;

use fairadmit::artifact::PolicyArtifact;
use fairadmit::cohort::data::{load_applicants, write_applicants, write_decisions};
use fairadmit::cohort::{SimulationConfig, audit, simulate, summarize};
use fairadmit::estimate::split::DEFAULT_TEST_FRACTION;
use fairadmit::estimate::HoldoutSplit;
use fairadmit::rank::{rank_descending, select_top};
use fairadmit::types::{PolicyError, PolicyKind};

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyCli {
    Naive,
    Unaware,
    Fair,
}

impl From<PolicyCli> for PolicyKind {
    fn from(policy: PolicyCli) -> Self {
        match policy {
            PolicyCli::Naive => PolicyKind::Naive,
            PolicyCli::Unaware => PolicyKind::Unaware,
            PolicyCli::Fair => PolicyKind::Fair,
        }
    }
}

#[derive(Args)]
pub struct CohortArgs {
    /// TOML file overriding the default simulation parameters
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Number of applicants to simulate
    #[arg(long, value_name = "N")]
    pub rows: Option<usize>,

    /// Seed of the simulation
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub cohort: CohortArgs,

    /// Where to write the simulated applicants
    #[arg(long, default_value = "cohort.tsv")]
    pub output: String,
}

#[derive(Args)]
pub struct TrainArgs {
    /// Applicant TSV with race, sex, gpa, lsat (and first_year for the unaware policy)
    pub training_data: String,

    #[arg(long, value_enum)]
    pub policy: PolicyCli,

    /// Fraction of rows held out to report the regression fit quality
    #[arg(long, default_value_t = DEFAULT_TEST_FRACTION)]
    pub test_fraction: f64,

    /// Seed of the hold-out split; random when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Where to write the trained policy
    #[arg(long, default_value = "policy.toml")]
    pub output: String,
}

#[derive(Args)]
pub struct AdmitArgs {
    /// Applicant TSV with race, sex, gpa and lsat columns
    pub applicants: String,

    /// Number of seats to fill
    #[arg(long)]
    pub seats: usize,

    /// Trained policy file (.toml)
    #[arg(long, conflicts_with = "policy", required_unless_present = "policy")]
    pub model: Option<String>,

    /// Run an untrained policy directly; only `naive` needs no model
    #[arg(long, value_enum)]
    pub policy: Option<PolicyCli>,

    /// Where to write the decisions
    #[arg(long, default_value = "decisions.tsv")]
    pub output: String,
}

#[derive(Args)]
pub struct AuditArgs {
    #[command(flatten)]
    pub cohort: CohortArgs,

    /// Number of seats to fill
    #[arg(long)]
    pub seats: usize,

    /// Fraction of rows held out while training the policies
    #[arg(long, default_value_t = DEFAULT_TEST_FRACTION)]
    pub test_fraction: f64,
}

#[derive(Parser)]
#[command(
    name = "fairadmit",
    about = "Counterfactually fair admission policies",
    long_about = "Simulates applicant cohorts, trains naive, unaware and counterfactually \
                 fair admission policies, and audits how their decisions change when a \
                 protected attribute is flipped."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Simulate an applicant cohort (outputs: cohort.tsv)")]
    Simulate(SimulateArgs),
    #[command(about = "Train an admission policy (outputs: policy.toml)")]
    Train(TrainArgs),
    #[command(about = "Admit the best applicants (outputs: decisions.tsv)")]
    Admit(AdmitArgs),
    #[command(about = "Compare all policies on a simulated cohort and its counterfactuals")]
    Audit(AuditArgs),
    #[command(about = "Display version information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Simulate(args)) => run_simulate(args),
        Some(Commands::Train(args)) => run_train(args),
        Some(Commands::Admit(args)) => run_admit(args),
        Some(Commands::Audit(args)) => run_audit(args),
        Some(Commands::Version) => {
            println!("fairadmit {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn simulation_config(args: &CohortArgs) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            println!("Loading simulation config from: {path}");
            SimulationConfig::load(path)?
        }
        None => SimulationConfig::default(),
    };
    if let Some(rows) = args.rows {
        config.rows = rows;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    Ok(config)
}

pub fn run_simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = simulation_config(&args.cohort)?;
    let cohort = simulate(&config)?;
    write_applicants(&args.output, &cohort.applicants())?;
    println!(
        "Wrote {} simulated applicants (seed {}) to {}",
        cohort.len(),
        config.seed,
        args.output
    );
    Ok(())
}

pub fn run_train(args: TrainArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading training data from: {}", args.training_data);
    let applicants = load_applicants(&args.training_data)?;
    println!("Loaded {} applicants", applicants.len());

    let kind = PolicyKind::from(args.policy);
    let split = HoldoutSplit {
        test_fraction: args.test_fraction,
        seed: args.seed,
    };
    let artifact = PolicyArtifact::train(kind, &applicants, split)?;

    artifact.save(&args.output)?;
    println!("Saved {kind} policy to {}", args.output);
    Ok(())
}

pub fn run_admit(args: AdmitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let artifact = match (&args.model, args.policy) {
        (Some(path), _) => {
            println!("Loading policy from: {path}");
            PolicyArtifact::load(path)?
        }
        (None, Some(policy)) => {
            let kind = PolicyKind::from(policy);
            if kind.requires_training() {
                return Err(PolicyError::NotTrained {
                    policy: kind,
                    missing: kind.as_str(),
                }
                .into());
            }
            PolicyArtifact::naive()
        }
        (None, None) => return Err("either --model or --policy is required".into()),
    };

    println!("Loading applicants from: {}", args.applicants);
    let applicants = load_applicants(&args.applicants)?;

    let scores = artifact.scores(&applicants)?;
    let selection = select_top(scores.view(), args.seats)?;

    let mut ranks = vec![0; scores.len()];
    for (position, row) in rank_descending(scores.view()).into_iter().enumerate() {
        ranks[row] = position + 1;
    }
    write_decisions(
        &args.output,
        &applicants.sample_ids,
        scores.view(),
        &ranks,
        selection.accepted.view(),
    )?;

    println!(
        "Admitted {} of {} applicants with the {} policy; decisions written to {}",
        selection.n_accepted(),
        applicants.len(),
        artifact.kind,
        args.output
    );

    let summary = summarize(
        artifact.kind,
        &applicants,
        scores.view(),
        selection.accepted.view(),
        args.seats,
    )?;
    let [race0, race1] = summary.acceptance_rate_by_race;
    println!(
        "Acceptance rate by race: race=0 {}, race=1 {}",
        format_rate(race0),
        format_rate(race1)
    );
    if let Some(correlation) = summary.score_ability_correlation {
        println!(
            "Admitted mean ability {} (score/ability correlation {correlation:.4})",
            format_rate(summary.admitted_mean_ability)
        );
    }
    Ok(())
}

pub fn run_audit(args: AuditArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = simulation_config(&args.cohort)?;
    let cohort = simulate(&config)?;
    let split = HoldoutSplit::seeded(args.test_fraction, config.seed);

    println!(
        "{}",
        [
            "policy",
            "accepted",
            "race_flip_rate",
            "sex_flip_rate",
            "accept_rate_race0",
            "accept_rate_race1",
            "admitted_mean_ability",
            "score_ability_corr",
        ]
        .iter()
        .join("\t")
    );
    for kind in PolicyKind::ALL {
        let artifact = PolicyArtifact::train(kind, &cohort.applicants(), split)?;
        let report = audit(&artifact, &cohort, args.seats)?;
        let summary = &report.summary;
        let [race0, race1] = summary.acceptance_rate_by_race;
        println!(
            "{}",
            [
                summary.policy.to_string(),
                summary.accepted.to_string(),
                format!("{:.4}", report.race_flip_rate),
                format!("{:.4}", report.sex_flip_rate),
                format_rate(race0),
                format_rate(race1),
                format_rate(summary.admitted_mean_ability),
                format_rate(summary.score_ability_correlation),
            ]
            .iter()
            .join("\t")
        );
    }
    Ok(())
}

fn format_rate(value: Option<f64>) -> String {
    value.map_or_else(|| "NA".to_string(), |v| format!("{v:.4}"))
}
