use clap::Parser;
use crossbeam_channel::{bounded, Receiver};
use disasterlink::{
    project_by_theme, summarize, write_csv, AdjacencyIndex, DisasterDatabase, DisasterResult,
    DisasterRow, EventTable, LinkConfig, LinkContext, RecordId, RecordStore,
};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
};

const CHANNEL_SIZE: usize = 16;
const DB_BATCH_SIZE: usize = 1_000;

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Link records into disasters.
///
/// Records of the same disaster type that overlap in time and happened in adjacent provinces
/// are linked together into disasters. The disasters are written to a CSV file sorted by total
/// cost, and optionally stored in a database.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "linkdisasters")]
#[clap(author, version, about)]
struct LinkDisastersOptionsInit {
    /// The path to the records CSV file, as made by aggregateclaims.
    records_file: PathBuf,

    /// The path to the province adjacency matrix CSV file.
    adjacency_file: PathBuf,

    /// The path to a JSON configuration file.
    ///
    /// If this is not specified, the default configuration is used.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// The number of days two disasters may be apart and still be linked.
    ///
    /// This overrides the value in the configuration file.
    #[clap(short = 'l', long)]
    days_leniency: Option<u32>,

    /// A directory of enrichment event batch files.
    ///
    /// If this is specified, a CSV file with one row per disaster and event theme is also made.
    #[clap(short, long)]
    events_dir: Option<PathBuf>,

    /// The path to the disasters CSV file to create.
    ///
    /// If this is not specified, then the program will create one automatically by replacing the
    /// file name of the records_file with "disasters.csv".
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// The path to the database file to store the disasters in.
    ///
    /// If this is not specified, then the program will check for it in the "DISASTER_DB"
    /// environment variable. If neither is set, nothing is stored.
    #[clap(short, long)]
    #[clap(env = "DISASTER_DB")]
    database: Option<PathBuf>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct LinkDisastersOptionsChecked {
    /// The path to the records CSV file.
    records_file: PathBuf,

    /// The path to the adjacency matrix file.
    adjacency_file: PathBuf,

    /// Run configuration.
    config: LinkConfig,

    /// A directory of enrichment event batch files.
    events_dir: Option<PathBuf>,

    /// The path to the disasters CSV file.
    output: PathBuf,

    /// The path to the theme rows CSV file.
    themes_output: PathBuf,

    /// The path to the database file.
    database: Option<PathBuf>,

    /// Verbose output
    verbose: bool,
}

impl Display for LinkDisastersOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "      Records: {}", self.records_file.display())?;
        writeln!(f, "    Adjacency: {}", self.adjacency_file.display())?;
        writeln!(f, "     Leniency: {} days", self.config.days_leniency)?;
        match self.events_dir {
            Some(ref dir) => {
                writeln!(f, "       Events: {}", dir.display())?;
                writeln!(f, " Theme Output: {}", self.themes_output.display())?;
            }
            None => writeln!(f, "       Events: none")?,
        }
        writeln!(f, "       Output: {}", self.output.display())?;
        match self.database {
            Some(ref db) => writeln!(f, "     Database: {}", db.display())?,
            None => writeln!(f, "     Database: none")?,
        }
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> DisasterResult<LinkDisastersOptionsChecked> {
    let LinkDisastersOptionsInit {
        records_file,
        adjacency_file,
        config,
        days_leniency,
        events_dir,
        output,
        database,
        verbose,
    } = LinkDisastersOptionsInit::parse();

    let mut config = match config {
        Some(ref path) => LinkConfig::from_json_file(path)
            .map_err(|err| format!("error loading {}: {}", path.display(), err))?,
        None => LinkConfig::default(),
    };

    if let Some(days) = days_leniency {
        config.days_leniency = days;
    }

    if let Some(ref dir) = events_dir {
        if !dir.is_dir() {
            return Err(format!("events directory does not exist: {}", dir.display()).into());
        }
    }

    let output = match output {
        Some(v) => v,
        None => records_file.with_file_name("disasters.csv"),
    };
    let themes_output = output.with_extension("themes.csv");

    Ok(LinkDisastersOptionsChecked {
        records_file,
        adjacency_file,
        config,
        events_dir,
        output,
        themes_output,
        database,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> DisasterResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose || opts.config.debug_messages_on {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if opts.verbose {
        info!("{}", opts);
    }

    // The events aren't needed until the disasters are linked, so load them in the meantime.
    let events_thread = match opts.events_dir {
        Some(ref dir) => Some(start_events_thread(dir)?),
        None => None,
    };

    let records = RecordStore::from_csv(&opts.records_file)?;
    let adjacency = AdjacencyIndex::from_csv(&opts.adjacency_file)?;
    info!(
        "Loaded {} records and {} provinces",
        records.len(),
        adjacency.len()
    );

    let ctx = LinkContext::new(&records, &adjacency, &opts.config)?;
    let (mut disasters, _stats) = ctx.link()?;
    disasters.sort_by(|a, b| b.total_cost().total_cmp(&a.total_cost()));

    let rows = summarize(&disasters, &adjacency);

    let f = std::fs::File::create(&opts.output)?;
    write_csv(&rows, f)?;
    info!("Wrote {} disasters to {}", rows.len(), opts.output.display());

    if let Some(ref path) = opts.database {
        let (to_db, from_main) = bounded(CHANNEL_SIZE);
        let db_thread = start_database_thread(path.clone(), &records, from_main)?;

        let stored: Vec<(DisasterRow, Vec<RecordId>)> = rows
            .iter()
            .zip(&disasters)
            .map(|(row, disaster)| (row.clone(), disaster.members().to_vec()))
            .collect();

        for batch in stored.chunks(DB_BATCH_SIZE) {
            // A closed channel means the database thread quit, and joining it reports why.
            if to_db.send(batch.to_vec()).is_err() {
                break;
            }
        }
        drop(to_db);

        let num_stored = db_thread
            .join()
            .map_err(|_| "database thread panicked")??;
        info!("Stored {} disasters in {}", num_stored, path.display());
    }

    if let Some(events_thread) = events_thread {
        let events = events_thread
            .join()
            .map_err(|_| "event loading thread panicked")??;

        if events.is_empty() {
            warn!("No enrichment events were found");
        }

        let themes = project_by_theme(&disasters, &events)?;
        let f = std::fs::File::create(&opts.themes_output)?;
        write_csv(&themes, f)?;
        info!(
            "Wrote {} theme rows to {}",
            themes.len(),
            opts.themes_output.display()
        );
    }

    Ok(())
}

fn start_events_thread(dir: &Path) -> DisasterResult<JoinHandle<Result<EventTable, String>>> {
    let dir = dir.to_owned();

    let jh = thread::Builder::new()
        .name("linkdisasters-events".to_owned())
        .spawn(move || EventTable::load_batches(&dir).map_err(|err| err.to_string()))?;

    Ok(jh)
}

fn start_database_thread(
    path: PathBuf,
    records: &RecordStore,
    from_main: Receiver<Vec<(DisasterRow, Vec<RecordId>)>>,
) -> DisasterResult<JoinHandle<Result<usize, String>>> {
    // The records must be in place before any disaster refers to them.
    let db = DisasterDatabase::connect(&path)?;
    db.add_records(records)?;
    db.clear_disasters()?;
    drop(db);

    let jh = thread::Builder::new()
        .name("linkdisasters-database".to_owned())
        .spawn(move || {
            let db = DisasterDatabase::connect(&path).map_err(|err| err.to_string())?;
            let mut add_transaction = db
                .prepare_to_add_disasters()
                .map_err(|err| err.to_string())?;

            let mut num_stored = 0;
            for batch in from_main {
                num_stored += add_transaction
                    .add(&batch)
                    .map_err(|err| err.to_string())?
                    .len();
            }

            Ok(num_stored)
        })?;

    Ok(jh)
}
