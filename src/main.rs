use radial_fd::config::Config;
use radial_fd::utilities::read_json_file;
use radial_fd::{BoundaryPolicy, DiaMatrix, FiniteDifference};
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::str::FromStr;
use structopt::StructOpt;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(StructOpt, Debug)]
#[structopt(name = "radial_fd")]
struct Opt {
    /// JSON config file with `Grid` and `FiniteDifference` sections
    #[structopt(short, long)]
    config: String,

    /// Operator to build
    #[structopt(
        short,
        long,
        default_value = "del2_radial",
        possible_values = &["ddx", "ddr", "del2", "radial_curl", "del2_radial"]
    )]
    operator: String,

    /// Boundary policy composed onto the left (axis) edge
    #[structopt(long, possible_values = &POLICIES)]
    left: Option<BoundaryPolicy>,

    /// Boundary policy composed onto the right (outer) edge
    #[structopt(long, possible_values = &POLICIES)]
    right: Option<BoundaryPolicy>,

    /// Print the stored diagonals instead of the dense matrix
    #[structopt(long)]
    storage: bool,

    /// Output file. Defaults to stdout.
    #[structopt(long)]
    output: Option<String>,
}

const POLICIES: [&str; 5] = ["extrapolate", "average", "quadratic", "flat", "zero"];

#[derive(Debug, Clone, Copy)]
enum Operator {
    Ddx,
    Ddr,
    Del2,
    RadialCurl,
    Del2Radial,
}

struct ParseOperatorError(String);

impl fmt::Debug for ParseOperatorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Specified operator `{}` invalid", self.0)
    }
}

impl fmt::Display for ParseOperatorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for ParseOperatorError {}

impl FromStr for Operator {
    type Err = ParseOperatorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ddx" => Ok(Operator::Ddx),
            "ddr" => Ok(Operator::Ddr),
            "del2" => Ok(Operator::Del2),
            "radial_curl" => Ok(Operator::RadialCurl),
            "del2_radial" => Ok(Operator::Del2Radial),
            s => Err(ParseOperatorError(s.into())),
        }
    }
}

fn build(fd: &FiniteDifference, operator: Operator) -> radial_fd::Result<DiaMatrix> {
    match operator {
        Operator::Ddx => fd.ddx(),
        Operator::Ddr => fd.ddr(),
        Operator::Del2 => fd.del2(),
        Operator::RadialCurl => fd.radial_curl(),
        Operator::Del2Radial => fd.del2_radial(),
    }
}

fn write_storage(matrix: &DiaMatrix, out: &mut impl Write) -> io::Result<()> {
    for (offset, diagonal) in matrix.offsets().iter().zip(matrix.data().outer_iter()) {
        write!(out, "{:>3}:", offset)?;
        for value in diagonal.iter() {
            write!(out, " {:.6e}", value)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let config: Config = read_json_file(&opt.config)?;
    let grid = config.build_grid()?;
    let fd = config.build_finite_difference(&grid)?;
    log::info!(
        "Grid with {} points, dr = {}, interior scheme {}",
        grid.num_points(),
        grid.dr(),
        fd.scheme()
    );

    let operator: Operator = opt.operator.parse()?;
    // An edge without a policy keeps the operator's own row
    let matrix = fd.compose_boundaries(&build(&fd, operator)?, opt.left, opt.right)?;

    let mut out: Box<dyn Write> = match &opt.output {
        Some(path) => Box::new(BufWriter::new(fs::File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    if opt.storage {
        write_storage(&matrix, &mut out)?;
    } else {
        write!(out, "{}", matrix)?;
    }
    out.flush()?;

    Ok(())
}
