use clap::{Args, Parser, Subcommand};
use contributor_reputation::{
  config::ScoringConfig,
  export::AnalysisExport,
  github::octocrab_handle,
  reputation::{
    commit_source::GitHubSource,
    pipeline::{ScoreRequest, ScoringPipeline, ScoringReport},
    store::{ScoreStore, SqliteScoreStore},
    ScoreRecord,
  },
  webhook::PushEvent,
  ReputationError, Result,
};
use std::{path::PathBuf, process::ExitCode, time::Duration};

use log::*;

use simplelog::*;

#[derive(Parser, Debug)]
#[command(author, version, arg_required_else_help(true))]
struct Opts {
  /// Would you like to enable debug information?
  #[arg(short = 'd', long, default_value_t = false, global = true)]
  debug: bool,

  /// GitHub token used for every API call.
  #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
  token: Option<String>,

  /// Alternative GitHub API base URL (GitHub Enterprise, test servers).
  #[arg(long, env = "GITHUB_API_URL", global = true)]
  api_url: Option<String>,

  /// Where are the scores stored?
  #[arg(long, env = "REPUTATION_DB", default_value = "reputation.db", global = true)]
  database: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Args, Debug)]
struct ScoringOpts {
  /// Commits requested per page (GitHub allows at most 100).
  #[arg(long, default_value_t = 100)]
  per_page: u8,

  /// How many of each contributor's most recent commits are counted?
  #[arg(long, default_value_t = 100)]
  max_commits: usize,

  /// Contributors scored at the same time.
  #[arg(long, default_value_t = 4)]
  contributor_concurrency: usize,

  /// Commit details fetched at the same time for one contributor.
  #[arg(long, default_value_t = 8)]
  stats_concurrency: usize,

  /// Give up (and write nothing) after this many seconds.
  #[arg(long, default_value_t = 120)]
  timeout_secs: u64,
}

impl ScoringOpts {
  fn config(&self) -> ScoringConfig {
    ScoringConfig {
      per_page: self.per_page,
      max_commits: self.max_commits,
      contributor_concurrency: self.contributor_concurrency,
      stats_concurrency: self.stats_concurrency,
      ..ScoringConfig::default()
    }
  }
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Recompute and store scores for a repository.
  Score {
    /// What is the owner (user or organization) of the repository?
    #[arg(short = 'o', long)]
    owner: String,

    /// What is the name of the repository?
    #[arg(short = 'r', long)]
    repo: String,

    /// Only score this contributor.
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Would you like to write the results to a JSON file?
    #[arg(short = 'j', long)]
    json_file: Option<PathBuf>,

    #[command(flatten)]
    scoring: ScoringOpts,
  },

  /// Rescore the sender of a webhook delivery saved to a file.
  Webhook {
    /// Path to the JSON payload.
    #[arg(short = 'p', long)]
    payload: PathBuf,

    /// Value of the X-GitHub-Event header; only `push` triggers scoring.
    #[arg(short = 'e', long, default_value = "push")]
    event: String,

    #[command(flatten)]
    scoring: ScoringOpts,
  },

  /// Print stored scores.
  Show {
    #[arg(short = 'o', long)]
    owner: String,

    #[arg(short = 'r', long)]
    repo: String,

    #[arg(short = 'u', long)]
    user: Option<String>,
  },
}

fn print_record(record: &ScoreRecord) {
  println!(
    "{}/{}\t{}\t{:.2}\t{} commits\t+{}\t-{}\tv{}\t{}",
    record.owner,
    record.repository,
    record.username,
    record.display_score(),
    record.commits,
    record.additions,
    record.deletions,
    record.formula_version,
    record.updated_at.to_rfc3339()
  );
}

async fn run_scoring(
  opts: &Opts,
  request: ScoreRequest,
  scoring: &ScoringOpts,
) -> Result<ScoringReport> {
  let config = scoring.config();
  config.validate()?;

  let gh = octocrab_handle(opts.token.as_deref(), opts.api_url.as_deref())?;
  let source = GitHubSource::new(gh, config.per_page, config.max_commits);
  let store = SqliteScoreStore::open(&opts.database)?;
  let pipeline = ScoringPipeline::new(&source, &store, &config);

  let report = tokio::time::timeout(
    Duration::from_secs(scoring.timeout_secs),
    pipeline.run(&request),
  )
  .await
  .map_err(|_| {
    ReputationError::UpstreamUnavailable(format!(
      "scoring {}/{} did not finish within {}s",
      request.owner, request.repo, scoring.timeout_secs
    ))
  })??;

  for record in &report.records {
    print_record(record);
  }
  for failure in &report.failures {
    warn!(
      "{} was not scored ({}): {}",
      failure.username,
      failure.error.kind(),
      failure.error
    );
  }

  Ok(report)
}

async fn run(opts: &Opts) -> Result<()> {
  match &opts.command {
    Command::Score {
      owner,
      repo,
      user,
      json_file,
      scoring,
    } => {
      let mut request = ScoreRequest::repository(owner, repo);
      if let Some(user) = user {
        request = request.for_contributor(user);
      }

      let report = run_scoring(opts, request, scoring).await?;
      info!("Stored {} score(s).", report.records.len());

      if let Some(path) = json_file {
        AnalysisExport::from_report(&report, chrono::Utc::now()).write_to(path)?;
        info!("Wrote {}", path.display());
      }
    }
    Command::Webhook {
      payload,
      event,
      scoring,
    } => {
      if event != "push" {
        info!("Ignored non-push event: {}", event);
        return Ok(());
      }
      let body = std::fs::read_to_string(payload).map_err(|e| {
        ReputationError::InvalidInput(format!("cannot read {}: {e}", payload.display()))
      })?;
      let request = PushEvent::from_json(&body)?.score_request();
      debug!("Push delivery resolved to {:?}", request);

      run_scoring(opts, request, scoring).await?;
    }
    Command::Show { owner, repo, user } => {
      let store = SqliteScoreStore::open(&opts.database)?;
      let records = match user {
        Some(user) => store.find(repo, owner, user).await?.into_iter().collect(),
        None => store.list(repo, owner).await?,
      };
      if records.is_empty() {
        info!("No scores stored for {}/{}", owner, repo);
      }
      for record in &records {
        print_record(record);
      }
    }
  }

  Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
  let opts = Opts::parse();

  let log_level = if opts.debug {
    LevelFilter::Debug
  } else {
    LevelFilter::Info
  };

  if let Err(e) = TermLogger::init(
    log_level,
    Config::default(),
    TerminalMode::Mixed,
    ColorChoice::Auto,
  ) {
    eprintln!("Failed to initialize logger: {:?}", e);
    return ExitCode::FAILURE;
  }

  debug!("DEBUG ENABLED");

  match run(&opts).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("Scoring failed [{}]: {}", e.kind(), e);
      match e {
        ReputationError::Unauthenticated(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
      }
    }
  }
}
