use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use ecm::index::{build_index, SeekIndex};
use ecm::EcmReader;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use thousands::Separable;

fn validate_file_exists(s: &OsStr) -> Result<PathBuf, std::io::Error> {
    let path = PathBuf::from(s);
    if path.exists() && path.is_file() {
        return Ok(path);
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "File not found or not a file.",
    ))
}

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds the .edi sparse seek index for a .ecm file
    Index {
        /// path to the .ecm file
        #[clap(parse(try_from_os_str = validate_file_exists))]
        input: PathBuf,
    },
    /// Displays information about a .ecm file and its .edi index
    Inspect {
        /// path to the .ecm file
        #[clap(parse(try_from_os_str = validate_file_exists))]
        input: PathBuf,

        /// output additional information
        #[clap(short, long)]
        verbose: bool,
    },
}

fn run_index(input: &PathBuf) -> anyhow::Result<()> {
    let ecm_file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let edi_bytes = build_index(&ecm_file)
        .map_err(|e| anyhow!("failed to build index for {}: {e}", input.display()))?;

    let edi_path = {
        let mut p = input.as_os_str().to_owned();
        p.push(".edi");
        PathBuf::from(p)
    };

    // Write to a temporary path first so a failure partway through never
    // leaves a corrupt .edi sitting next to the .ecm it's supposed to index.
    let tmp_path = {
        let mut p = edi_path.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };
    let write_result = (|| -> anyhow::Result<()> {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&edi_bytes)?;
        tmp.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("writing {}", tmp_path.display()));
    }
    fs::rename(&tmp_path, &edi_path)
        .with_context(|| format!("renaming {} to {}", tmp_path.display(), edi_path.display()))?;

    log::info!(
        "wrote {} ({} entries) for {}",
        edi_path.display(),
        SeekIndex::load(&File::open(&edi_path)?)?.entry_count(),
        input.display()
    );
    Ok(())
}

fn run_inspect(input: &PathBuf, verbose: bool) -> anyhow::Result<()> {
    let reader = EcmReader::open_path(input)
        .map_err(|e| anyhow!("failed to open {}: {e}", input.display()))?;

    println!("Input file:\t{}", input.display());
    println!(
        "Logical size:\t{} bytes",
        reader.size().separate_with_commas()
    );

    if verbose {
        let ecm_file = File::open(input)?;
        let edi_path = {
            let mut p = input.as_os_str().to_owned();
            p.push(".edi");
            PathBuf::from(p)
        };
        let edi_file =
            File::open(&edi_path).with_context(|| format!("opening {}", edi_path.display()))?;
        let index = SeekIndex::load(&edi_file)
            .map_err(|e| anyhow!("failed to load {}: {e}", edi_path.display()))?;
        println!("Index entries:\t{}", index.entry_count());
        println!(
            "ECM stream size:\t{} bytes",
            ecm_file.metadata()?.len().separate_with_commas()
        );
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match &cli.command {
        Commands::Index { input } => run_index(input),
        Commands::Inspect { input, verbose } => run_inspect(input, *verbose),
    }
}
