//! lzscope CLI - explore how LZMA2 parameters trade size for speed
//!
//! Compresses a text or file with a chosen parameter set and reports sizes,
//! ratio and timing, sweeps one parameter across a range, verifies round
//! trips and decodes raw LZMA2 or XZ streams.

mod commands;
mod utils;

use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::{
    CompressOptions, DecompressOptions, SweepOptions, VerifyOptions, cmd_compress,
    cmd_decompress, cmd_sweep, cmd_verify,
};
use lzscope_lzma2::{CheckType, Container, MatchFinderKind, Mode, ParameterSet, SweepAxis};
use std::path::PathBuf;
use utils::{LC_LP_MESSAGE, read_input};

#[derive(Parser)]
#[command(name = "lzscope")]
#[command(
    author,
    version,
    about = "LZMA2 parameter explorer - compress, sweep and verify"
)]
#[command(long_about = "
lzscope compresses data with a parameterized LZMA2 encoder and reports
original size, compressed size, ratio and time.

Examples:
  lzscope compress --text \"Hello, LZMA! This is a compression test.\"
  lzscope compress notes.txt --level 9 --lc 0 --lp 2 --pb 0
  lzscope compress notes.txt --container raw -o notes.lzma2 --json
  lzscope sweep notes.txt --axis dict-kib --values 64,1024,8192
  lzscope sweep notes.txt --axis level --from 0 --to 9
  lzscope verify notes.txt --all-finders
  lzscope decompress notes.xz -o notes.txt
")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress input and print a summary
    #[command(alias = "c")]
    Compress {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: ParamArgs,

        /// Feed the input in slices of this many bytes
        #[arg(long)]
        increment: Option<usize>,

        /// Write the compressed stream to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,

        /// Hide dictionary size and lc/lp/pb
        #[arg(long)]
        no_details: bool,

        /// Hide compression time
        #[arg(long)]
        no_time: bool,
    },

    /// Measure ratio and speed along one parameter
    #[command(alias = "s")]
    Sweep {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: ParamArgs,

        /// Parameter to vary
        #[arg(short, long, value_enum)]
        axis: AxisArg,

        /// Explicit values (comma separated)
        #[arg(long, value_delimiter = ',', conflicts_with_all = ["from", "to"])]
        values: Vec<u32>,

        /// First value of a range
        #[arg(long, requires = "to")]
        from: Option<u32>,

        /// Last value of a range (inclusive)
        #[arg(long, requires = "from")]
        to: Option<u32>,

        /// Range step
        #[arg(long, default_value = "1")]
        step: u32,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },

    /// Compress, decompress and compare
    #[command(alias = "t")]
    Verify {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: ParamArgs,

        /// Also round-trip every match finder in both modes
        #[arg(long)]
        all_finders: bool,
    },

    /// Decode a raw LZMA2 or XZ stream
    #[command(alias = "d")]
    Decompress {
        /// Compressed file
        file: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Window size for raw streams, in KiB
        #[arg(long)]
        dict_kib: Option<u32>,
    },
}

/// Where the data to compress comes from.
#[derive(Args)]
struct InputArgs {
    /// Input file ("-" for stdin)
    file: Option<PathBuf>,

    /// Compress this text instead of a file
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,
}

/// Compression parameters; unset fields follow the preset level.
#[derive(Args)]
struct ParamArgs {
    /// Preset level (0-9)
    #[arg(short, long, default_value = "6")]
    level: u8,

    /// Dictionary size in KiB
    #[arg(long)]
    dict_kib: Option<u32>,

    /// Literal context bits (0-4)
    #[arg(long)]
    lc: Option<u32>,

    /// Literal position bits (0-4)
    #[arg(long)]
    lp: Option<u32>,

    /// Position bits (0-4)
    #[arg(long)]
    pb: Option<u32>,

    /// Parsing mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Match finder
    #[arg(long, value_enum)]
    mf: Option<FinderArg>,

    /// Nice match length (1-273)
    #[arg(long)]
    nice_len: Option<u32>,

    /// Match finder depth (0 = automatic)
    #[arg(long)]
    depth: Option<u32>,

    /// Output container
    #[arg(long, value_enum, default_value = "xz")]
    container: ContainerArg,

    /// Integrity check for XZ output
    #[arg(long, value_enum, default_value = "crc64")]
    check: CheckArg,
}

impl ParamArgs {
    fn parameter_set(&self) -> Result<ParameterSet, Box<dyn std::error::Error>> {
        let mut params = ParameterSet::preset(self.level)?;
        if let Some(kib) = self.dict_kib {
            let bytes = kib
                .checked_mul(1024)
                .ok_or_else(|| format!("dictionary size of {} KiB is too large", kib))?;
            params = params.dict_size(bytes);
        }
        if let Some(lc) = self.lc {
            params = params.lc(lc);
        }
        if let Some(lp) = self.lp {
            params = params.lp(lp);
        }
        if let Some(pb) = self.pb {
            params = params.pb(pb);
        }
        if let Some(mode) = self.mode {
            params = params.mode(mode.into());
        }
        if let Some(mf) = self.mf {
            params = params.match_finder(mf.into());
        }
        if let Some(nice_len) = self.nice_len {
            params = params.nice_len(nice_len);
        }
        if let Some(depth) = self.depth {
            params = params.depth(depth);
        }

        if params.lc + params.lp > 4 {
            return Err(LC_LP_MESSAGE.into());
        }
        params.validate()?;
        Ok(params)
    }

    fn container(&self) -> Container {
        match self.container {
            ContainerArg::Raw => Container::Raw,
            ContainerArg::Xz => Container::Xz(self.check.into()),
        }
    }
}

/// Parsing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Greedy parsing
    Fast,
    /// Lazy parsing with one byte of lookahead
    Normal,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fast => Mode::Fast,
            ModeArg::Normal => Mode::Normal,
        }
    }
}

/// Match finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FinderArg {
    /// Hash chain, 3-byte hash
    Hc3,
    /// Hash chain, 4-byte hash
    Hc4,
    /// Binary tree, 2-byte hash
    Bt2,
    /// Binary tree, 3-byte hash
    Bt3,
    /// Binary tree, 4-byte hash
    Bt4,
}

impl From<FinderArg> for MatchFinderKind {
    fn from(mf: FinderArg) -> Self {
        match mf {
            FinderArg::Hc3 => MatchFinderKind::Hc3,
            FinderArg::Hc4 => MatchFinderKind::Hc4,
            FinderArg::Bt2 => MatchFinderKind::Bt2,
            FinderArg::Bt3 => MatchFinderKind::Bt3,
            FinderArg::Bt4 => MatchFinderKind::Bt4,
        }
    }
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ContainerArg {
    /// Bare LZMA2 chunks
    Raw,
    /// XZ stream
    Xz,
}

/// XZ integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CheckArg {
    /// No check
    None,
    /// CRC32
    Crc32,
    /// CRC64
    Crc64,
}

impl From<CheckArg> for CheckType {
    fn from(check: CheckArg) -> Self {
        match check {
            CheckArg::None => CheckType::None,
            CheckArg::Crc32 => CheckType::Crc32,
            CheckArg::Crc64 => CheckType::Crc64,
        }
    }
}

/// Sweep axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AxisArg {
    Level,
    /// Dictionary size in KiB, like --dict-kib
    DictKib,
    Lc,
    Lp,
    Pb,
    NiceLen,
    Depth,
}

impl AxisArg {
    /// Command-line name of the axis.
    fn label(self) -> &'static str {
        match self {
            AxisArg::DictKib => "dict-kib",
            other => SweepAxis::from(other).name(),
        }
    }

    /// Library units per command-line unit.
    fn scale(self) -> u32 {
        match self {
            AxisArg::DictKib => 1024,
            _ => 1,
        }
    }
}

impl From<AxisArg> for SweepAxis {
    fn from(axis: AxisArg) -> Self {
        match axis {
            AxisArg::Level => SweepAxis::Level,
            AxisArg::DictKib => SweepAxis::DictSize,
            AxisArg::Lc => SweepAxis::Lc,
            AxisArg::Lp => SweepAxis::Lp,
            AxisArg::Pb => SweepAxis::Pb,
            AxisArg::NiceLen => SweepAxis::NiceLen,
            AxisArg::Depth => SweepAxis::Depth,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let result = run(cli.command);

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Compress {
            input,
            params,
            increment,
            output,
            json,
            no_details,
            no_time,
        } => {
            let parameter_set = params.parameter_set()?;
            let data = read_input(input.file.as_deref(), input.text.as_deref())?;
            cmd_compress(
                &data,
                &CompressOptions {
                    params: parameter_set,
                    container: params.container(),
                    increment,
                    output: output.as_deref(),
                    json,
                    details: !no_details,
                    time: !no_time,
                },
            )
        }
        Commands::Sweep {
            input,
            params,
            axis,
            values,
            from,
            to,
            step,
            json,
        } => {
            let base = params.parameter_set()?;
            let values = match (from, to) {
                (Some(from), Some(to)) => commands::sweep::range_values(from, to, step)?,
                _ if values.is_empty() => return Err("give --values or --from/--to".into()),
                _ => values,
            };
            let data = read_input(input.file.as_deref(), input.text.as_deref())?;
            cmd_sweep(
                &data,
                &SweepOptions {
                    base,
                    container: params.container(),
                    axis: axis.into(),
                    label: axis.label(),
                    scale: axis.scale(),
                    values: &values,
                    json,
                },
            )
        }
        Commands::Verify {
            input,
            params,
            all_finders,
        } => {
            let parameter_set = params.parameter_set()?;
            let data = read_input(input.file.as_deref(), input.text.as_deref())?;
            cmd_verify(
                &data,
                &VerifyOptions {
                    params: parameter_set,
                    container: params.container(),
                    all_finders,
                },
            )
        }
        Commands::Decompress {
            file,
            output,
            dict_kib,
        } => cmd_decompress(&DecompressOptions {
            input: &file,
            output: output.as_deref(),
            dict_kib,
        }),
    }
}
