use clap::Parser;
use disasterlink::{aggregate_claims, Claim, DisasterDatabase, DisasterResult, RecordStore};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Aggregate raw insurance claims into records.
///
/// Claims for the same disaster type in the same province on consecutive days are joined into a
/// single record with the total number of claims, the total cost, and the duration in days.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "aggregateclaims")]
#[clap(author, version, about)]
struct AggregateClaimsOptionsInit {
    /// The path to the raw claims file.
    ///
    /// This is a semicolon separated file with one row per claim.
    claims_file: PathBuf,

    /// The path to the records CSV file to create.
    ///
    /// If this is not specified, then the program will create one automatically by replacing the
    /// file name of the claims_file with "records.csv".
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// The path to a database file to store the records in as well.
    ///
    /// If this is not specified, then the program will check for it in the "DISASTER_DB"
    /// environment variable. If neither is set, the records only go to the CSV file.
    #[clap(short, long)]
    #[clap(env = "DISASTER_DB")]
    database: Option<PathBuf>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct AggregateClaimsOptionsChecked {
    /// The path to the raw claims file.
    claims_file: PathBuf,

    /// The path to the records CSV file.
    output: PathBuf,

    /// The path to the database file, if any.
    database: Option<PathBuf>,

    /// Verbose output
    verbose: bool,
}

impl Display for AggregateClaimsOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "  Claims: {}", self.claims_file.display())?;
        writeln!(f, " Records: {}", self.output.display())?;
        match self.database {
            Some(ref db) => writeln!(f, "Database: {}", db.display())?,
            None => writeln!(f, "Database: none")?,
        }
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> DisasterResult<AggregateClaimsOptionsChecked> {
    let AggregateClaimsOptionsInit {
        claims_file,
        output,
        database,
        verbose,
    } = AggregateClaimsOptionsInit::parse();

    if !claims_file.is_file() {
        return Err(format!("claims file does not exist: {}", claims_file.display()).into());
    }

    let output = match output {
        Some(v) => v,
        None => claims_file.with_file_name("records.csv"),
    };

    Ok(AggregateClaimsOptionsChecked {
        claims_file,
        output,
        database,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> DisasterResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if opts.verbose {
        info!("{}", opts);
    }

    let claims = Claim::load_csv(&opts.claims_file)?;
    let num_claims = claims.len();

    let store = RecordStore::new(aggregate_claims(claims))?;
    info!(
        "Aggregated {} claims into {} records",
        num_claims,
        store.len()
    );

    let f = std::fs::File::create(&opts.output)?;
    store.write_csv(f)?;
    info!("Wrote records to {}", opts.output.display());

    if let Some(ref path) = opts.database {
        let db = DisasterDatabase::connect(path)?;
        db.add_records(&store)?;
    }

    Ok(())
}
