use std::fs;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use biosub::api::ArchiveHttpClient;
use biosub::config::{Settings, Workspace, default_api_url, default_ftp_host};
use biosub::domain::PackageKind;
use biosub::error::BiosubError;
use biosub::output::JsonOutput;
use biosub::submit::{Submitter, status_report};
use biosub::transfer::FtpTransfer;

#[derive(Parser)]
#[command(name = "biosub")]
#[command(about = "Validate and submit bio-data packages to a genome-phenome archive")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Submit package directories")]
    Submit(BatchArgs),
    #[command(about = "Validate package directories against the archive without submitting")]
    DryRun(BatchArgs),
    #[command(about = "Report the recorded submission status of package directories")]
    Status(DirArgs),
    #[command(about = "Create a submission workspace in the current directory")]
    Init(InitArgs),
    #[command(about = "Scaffold new package directories")]
    New(DirArgs),
}

#[derive(Args)]
struct BatchArgs {
    #[arg(required = true)]
    dirs: Vec<String>,

    /// Package kind, detected from the batch directory name (FQ.*, BAM.*,
    /// VCF.*) when omitted.
    #[arg(long)]
    kind: Option<PackageKind>,
}

#[derive(Args)]
struct DirArgs {
    #[arg(required = true)]
    dirs: Vec<String>,

    #[arg(long)]
    kind: Option<PackageKind>,
}

#[derive(Args)]
struct InitArgs {
    #[arg(long)]
    submitter_account: String,

    #[arg(long)]
    submitter_password: String,

    #[arg(long)]
    ftp_host: Option<String>,

    #[arg(long)]
    api_url: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<BiosubError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BiosubError) -> u8 {
    match error {
        BiosubError::MissingWorkspace
        | BiosubError::ConfigRead(_)
        | BiosubError::ConfigParse(_)
        | BiosubError::InvalidKind(_) => 2,
        BiosubError::Credentials(_)
        | BiosubError::CatalogUnavailable(_)
        | BiosubError::Connection(_)
        | BiosubError::ApiHttp(_)
        | BiosubError::ApiStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Submit(args) => run_batch(args, false),
        Commands::DryRun(args) => run_batch(args, true),
        Commands::Status(args) => {
            let dirs = package_dirs(&args.dirs)?;
            let report = status_report(&dirs);
            JsonOutput::print_status(&report).into_diagnostic()
        }
        Commands::Init(args) => run_init(args),
        Commands::New(args) => run_new(args),
    }
}

fn run_batch(args: BatchArgs, dry_run: bool) -> miette::Result<()> {
    let cwd = current_dir()?;
    let workspace = Workspace::discover(&cwd).into_diagnostic()?;
    let kind = resolve_kind(args.kind, &cwd)?;
    let dirs = package_dirs(&args.dirs)?;

    let settings = workspace.settings.clone();
    let api = ArchiveHttpClient::new(&settings.api_url).into_diagnostic()?;
    let transfer = FtpTransfer::new(
        &settings.ftp_host,
        &settings.submitter_account,
        &settings.submitter_password,
    );

    let submitter = Submitter::new(api, transfer, settings);
    let report = submitter.run(&dirs, kind, dry_run).into_diagnostic()?;
    JsonOutput::print_batch(&report).into_diagnostic()
}

fn run_init(args: InitArgs) -> miette::Result<()> {
    let cwd = current_dir()?;
    let settings = Settings {
        submitter_account: args.submitter_account,
        submitter_password: args.submitter_password,
        ftp_host: args.ftp_host.unwrap_or_else(default_ftp_host),
        api_url: args.api_url.unwrap_or_else(default_api_url),
    };
    let root = Workspace::init(&cwd, &settings).into_diagnostic()?;
    println!("submission workspace initialized at {root}");
    Ok(())
}

fn run_new(args: DirArgs) -> miette::Result<()> {
    let cwd = current_dir()?;
    Workspace::discover(&cwd).into_diagnostic()?;
    let kind = resolve_kind(args.kind, &cwd)?;
    for dir in package_dirs(&args.dirs)? {
        fs::create_dir_all(dir.as_std_path()).into_diagnostic()?;
        let metadata_file = dir.join(format!("{}.yaml", kind.primary_kind()));
        if metadata_file.as_std_path().exists() {
            continue;
        }
        fs::write(metadata_file.as_std_path(), metadata_template(kind)).into_diagnostic()?;
        println!("created {dir}");
    }
    Ok(())
}

fn metadata_template(kind: PackageKind) -> &'static str {
    match kind {
        PackageKind::Unaligned => concat!(
            "sample:\n  alias: \n  subjectId: \n  genderId: \n  caseOrControlId: \n  phenotype: \n",
            "experiment:\n  instrumentModelId: \n  librarySourceId: \n  librarySelectionId: \n",
            "  libraryStrategyId: \n  libraryLayoutId: \n",
            "run:\n  runFileTypeId: \n",
            "files:\n  - fileName: \n",
        ),
        PackageKind::Alignment | PackageKind::Variation => concat!(
            "sample:\n  alias: \n  subjectId: \n  genderId: \n  caseOrControlId: \n  phenotype: \n",
            "analysis:\n  genomeId: \n  experimentTypeId: []\n  chromosomeReferences: []\n",
            "files:\n  - fileName: \n",
        ),
    }
}

fn current_dir() -> miette::Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().into_diagnostic()?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|_| miette::Report::msg("current directory is not valid UTF-8"))
}

fn resolve_kind(explicit: Option<PackageKind>, cwd: &Utf8PathBuf) -> miette::Result<PackageKind> {
    if let Some(kind) = explicit {
        return Ok(kind);
    }
    cwd.file_name()
        .and_then(PackageKind::from_batch_dir)
        .ok_or_else(|| {
            miette::Report::msg(
                "cannot detect the package kind from the current directory, pass --kind",
            )
        })
}

fn package_dirs(dirs: &[String]) -> miette::Result<Vec<Utf8PathBuf>> {
    let mut resolved = Vec::new();
    for dir in dirs {
        let trimmed = dir.trim_end_matches('/');
        if trimmed == "." || trimmed == ".." {
            return Err(miette::Report::msg("package directory can not be '.' or '..'"));
        }
        resolved.push(Utf8PathBuf::from(trimmed));
    }
    Ok(resolved)
}
