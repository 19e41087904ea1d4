use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use listen_rank::{
    BuildOptions, CountError, DEFAULT_DELIMITER, Discipline, Field, MalformedRowPolicy, RankedEntry,
    Session, TextSource, enumerate_all, rank_top,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const STDIN_INPUT: &str = "-"; // read the export from stdin
const COMPARE_TOP_N: usize = 10; // entries shown by `compare`

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FieldArg {
    Track,
    Artist,
}

impl From<FieldArg> for Field {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::Track => Field::Track,
            FieldArg::Artist => Field::Artist,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DisciplineArg {
    Unordered,
    Ordered,
}

impl From<DisciplineArg> for Discipline {
    fn from(arg: DisciplineArg) -> Self {
        match arg {
            DisciplineArg::Unordered => Discipline::Unordered,
            DisciplineArg::Ordered => Discipline::Ordered,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "listen-rank",
    about = "Count, rank and look up tracks or artists in a listening-history export"
)]
struct Cli {
    #[arg(
        short,
        long = "input",
        required = true,
        num_args = 1..,
        help = "Export file(s) to ingest; several files are counted in parallel, '-' reads stdin"
    )]
    inputs: Vec<PathBuf>,
    #[arg(
        long,
        env = "LISTEN_RANK_DATA_DIR",
        help = "Directory prepended to relative input paths"
    )]
    data_dir: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = FieldArg::Track, help = "Preset column to count by")]
    field: FieldArg,
    #[arg(long, conflicts_with = "field", help = "Count by an arbitrary header name instead")]
    column: Option<String>,
    #[arg(long, value_enum, default_value_t = DisciplineArg::Unordered)]
    discipline: DisciplineArg,
    #[arg(long, default_value_t = DEFAULT_DELIMITER, help = "Field delimiter")]
    delimiter: char,
    #[arg(long, help = "Fail on rows that are too short instead of skipping them")]
    strict: bool,
    #[arg(long, help = "Do not count rows whose key field is empty")]
    skip_empty: bool,
    #[arg(long, help = "Emit JSON instead of text")]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the N most frequent keys.
    Top { n: usize },
    /// Print every key with its count in index order.
    All,
    /// Print how often one exact key occurs.
    Lookup { key: String },
    /// Build both disciplines, time them and check that they agree.
    Compare {
        #[arg(long, default_value_t = COMPARE_TOP_N)]
        top: usize,
    },
}

impl Cli {
    fn field(&self) -> Field {
        self.field.into()
    }

    fn discipline(&self) -> Discipline {
        self.discipline.into()
    }

    fn column(&self) -> &str {
        self.column.as_deref().unwrap_or(self.field().column())
    }

    fn options(&self) -> BuildOptions {
        BuildOptions {
            delimiter: self.delimiter,
            on_malformed: if self.strict {
                MalformedRowPolicy::Abort
            } else {
                MalformedRowPolicy::Skip
            },
            skip_empty_keys: self.skip_empty,
        }
    }

    fn not_found_message(&self) -> String {
        match &self.column {
            Some(column) => format!("'{column}' value not found"),
            None => format!("{} Not Found!", self.field().label()),
        }
    }

    /// Timing lines go to stdout in text mode and to the log in JSON mode.
    fn report_time(&self, what: &str, elapsed: Duration) {
        if self.json {
            info!(operation = what, ?elapsed, "timing");
        } else {
            println!("Time to {what}: {elapsed:.2?}");
        }
    }
}

fn open_sources(cli: &Cli) -> Result<Vec<TextSource>> {
    cli.inputs
        .iter()
        .map(|input| -> Result<TextSource, CountError> {
            if input.as_os_str() == STDIN_INPUT {
                let mut bytes = Vec::new();
                io::stdin()
                    .read_to_end(&mut bytes)
                    .map_err(|e| CountError::SourceUnavailable {
                        origin: "stdin".to_string(),
                        reason: e.to_string(),
                    })?;
                return Ok(TextSource::from_bytes("stdin", &bytes));
            }
            let path = match &cli.data_dir {
                Some(dir) if input.is_relative() => dir.join(input),
                _ => input.clone(),
            };
            TextSource::open(&path)
        })
        .collect::<Result<Vec<_>, _>>()
        .context("could not open input")
}

/// Whole microseconds, saturating instead of truncating.
fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

/// Builds one slot of the session, reporting elapsed time.
fn build_index(
    cli: &Cli,
    session: &mut Session,
    sources: Vec<TextSource>,
    discipline: Discipline,
) -> Result<()> {
    let column = cli.column();
    let start = Instant::now();
    match session.build_sharded(column, discipline, sources, &cli.options()) {
        Ok(stats) => {
            info!(column, %discipline, rows = stats.rows, counted = stats.counted, skipped = stats.skipped, "index ready");
            cli.report_time(&format!("create {discipline} index"), start.elapsed());
            Ok(())
        }
        Err(err @ CountError::AlreadyBuilt { .. }) => {
            println!("{err}");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("failed to build {discipline} index for '{column}'")),
    }
}

fn write_entries<'a>(entries: impl IntoIterator<Item = &'a RankedEntry>) -> Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    for entry in entries {
        writeln!(out, "{entry}")?;
    }
    out.flush()?;
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_top(cli: &Cli, session: &Session, n: usize) -> Result<()> {
    let index = session.require(cli.column(), cli.discipline())?;
    let start = Instant::now();
    let top = rank_top(index, n);
    if cli.json {
        print_json(&top)?;
    } else {
        println!("{n} results to display");
        println!();
        write_entries(&top)?;
    }
    cli.report_time(
        &format!("rank {} index and print {} entries", cli.discipline(), top.len()),
        start.elapsed(),
    );
    Ok(())
}

fn show_all(cli: &Cli, session: &Session) -> Result<()> {
    let index = session.require(cli.column(), cli.discipline())?;
    let start = Instant::now();
    let entries = enumerate_all(index);
    if cli.json {
        print_json(&entries)?;
    } else {
        write_entries(&entries)?;
    }
    cli.report_time(&format!("print {} index", cli.discipline()), start.elapsed());
    Ok(())
}

fn show_lookup(cli: &Cli, session: &Session, key: &str) -> Result<()> {
    let start = Instant::now();
    let count = session.lookup(cli.column(), cli.discipline(), key)?;
    let elapsed = start.elapsed();
    if cli.json {
        print_json(&RankedEntry {
            key: key.to_string(),
            count,
        })?;
    } else if count > 0 {
        println!("Number of streams: {count}");
    } else {
        println!("{}", cli.not_found_message());
    }
    cli.report_time(&format!("search {} index", cli.discipline()), elapsed);
    Ok(())
}

#[derive(Debug, Serialize)]
struct CompareReport {
    column: String,
    keys: usize,
    rows: u64,
    build_micros: DisciplineTimes,
    rank_micros: DisciplineTimes,
    top: Vec<RankedEntry>,
}

#[derive(Debug, Default, Serialize)]
struct DisciplineTimes {
    unordered: u64,
    ordered: u64,
}

fn compare(cli: &Cli, session: &mut Session, sources: Vec<TextSource>, top: usize) -> Result<()> {
    let column = cli.column();
    let mut build_micros = DisciplineTimes::default();
    let mut rank_micros = DisciplineTimes::default();
    let mut rankings = Vec::new();

    for discipline in [Discipline::Unordered, Discipline::Ordered] {
        let start = Instant::now();
        build_index(cli, session, sources.clone(), discipline)?;
        let built = micros(start.elapsed());

        let start = Instant::now();
        let ranking = session.rank(column, discipline)?;
        let ranked = start.elapsed();
        cli.report_time(&format!("sort {discipline} index"), ranked);

        match discipline {
            Discipline::Unordered => {
                build_micros.unordered = built;
                rank_micros.unordered = micros(ranked);
            }
            Discipline::Ordered => {
                build_micros.ordered = built;
                rank_micros.ordered = micros(ranked);
            }
        }
        rankings.push(ranking);
    }

    let unordered = session.require(column, Discipline::Unordered)?;
    let ordered = session.require(column, Discipline::Ordered)?;
    let agree = unordered.len() == ordered.len()
        && unordered.iter().all(|(key, count)| ordered.get(key) == count)
        && rankings[0] == rankings[1];
    if !agree {
        bail!("unordered and ordered indexes disagree for '{column}'");
    }

    let report = CompareReport {
        column: column.to_string(),
        keys: ordered.len(),
        rows: ordered.total(),
        build_micros,
        rank_micros,
        top: rankings[1].top_n(top).to_vec(),
    };
    if cli.json {
        print_json(&report)?;
    } else {
        println!(
            "Both indexes agree: {} distinct keys over {} rows",
            report.keys, report.rows
        );
        write_entries(&report.top)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let sources = open_sources(&cli)?;
    let mut session = Session::new();

    match &cli.command {
        Command::Top { n } => {
            build_index(&cli, &mut session, sources, cli.discipline())?;
            show_top(&cli, &session, *n)
        }
        Command::All => {
            build_index(&cli, &mut session, sources, cli.discipline())?;
            show_all(&cli, &session)
        }
        Command::Lookup { key } => {
            build_index(&cli, &mut session, sources, cli.discipline())?;
            show_lookup(&cli, &session, key)
        }
        Command::Compare { top } => compare(&cli, &mut session, sources, *top),
    }
}
