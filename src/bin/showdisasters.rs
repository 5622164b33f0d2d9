use clap::Parser;
use disasterlink::{DisasterDatabase, DisasterResult, SortKey};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
};
use strum::IntoEnumIterator;

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Show the disasters stored in a database.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "showdisasters")]
#[clap(author, version, about)]
struct ShowDisastersOptionsInit {
    /// The path to the database file.
    ///
    /// If this is not specified, then the program will check for it in the "DISASTER_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "DISASTER_DB")]
    database: PathBuf,

    /// The order to show the disasters in.
    ///
    /// One of total-cost, claims, duration, losses-per-day, or date.
    #[clap(short, long)]
    #[clap(parse(try_from_str=parse_sort_key))]
    #[clap(default_value = "total-cost")]
    sort_by: SortKey,

    /// The maximum number of disasters to show.
    #[clap(short, long)]
    #[clap(default_value_t = 10)]
    count: usize,

    /// Also list the ids of the records in each disaster.
    #[clap(short, long)]
    members: bool,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/// Parse a sort key argument.
fn parse_sort_key(key: &str) -> Result<SortKey, String> {
    SortKey::from_str(key).map_err(|_| {
        let valid: Vec<&'static str> = SortKey::iter().map(Into::into).collect();
        format!(
            "invalid sort key '{}', valid keys are: {}",
            key,
            valid.join(", ")
        )
    })
}

#[derive(Debug)]
struct ShowDisastersOptionsChecked {
    /// The path to the database file.
    database: PathBuf,

    /// The order to show the disasters in.
    sort_by: SortKey,

    /// The maximum number of disasters to show.
    count: usize,

    /// List the member record ids.
    members: bool,

    /// Verbose output
    verbose: bool,
}

impl Display for ShowDisastersOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "Database: {}", self.database.display())?;
        writeln!(f, " Sort By: {}", self.sort_by)?;
        writeln!(f, "   Count: {}", self.count)?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> DisasterResult<ShowDisastersOptionsChecked> {
    let ShowDisastersOptionsInit {
        database,
        sort_by,
        count,
        members,
        verbose,
    } = ShowDisastersOptionsInit::parse();

    if !database.is_file() {
        return Err(format!("database does not exist: {}", database.display()).into());
    }

    Ok(ShowDisastersOptionsChecked {
        database,
        sort_by,
        count,
        members,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> DisasterResult<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    let opts = parse_args()?;

    if opts.verbose {
        info!("{}", opts);
    }

    let db = DisasterDatabase::connect(&opts.database)?;

    let disasters = db.query_disasters(opts.sort_by, Some(opts.count))?;
    if disasters.is_empty() {
        println!("No disasters in {}", opts.database.display());
        return Ok(());
    }

    for (rank, stored) in disasters.iter().enumerate() {
        println!("{:>3}. Disaster {}", rank + 1, stored.disaster_id);
        print!("{}", stored.row);

        if opts.members {
            let members = db.disaster_members(stored.disaster_id)?;
            let members: Vec<String> = members.iter().map(|id| id.to_string()).collect();
            println!("        Records: {}", members.join(", "));
        }

        println!();
    }

    Ok(())
}
