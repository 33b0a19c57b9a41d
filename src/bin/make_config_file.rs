use radial_fd::config::Config;
use radial_fd::utilities::dump_default_to_json_file;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "make_config_file")]
struct Opt {
    /// Where to write the default config
    #[structopt(default_value = "radial_fd.json")]
    path: String,
}

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    dump_default_to_json_file::<Config>(&opt.path)?;
    log::info!("Wrote default config to {}", opt.path);

    Ok(())
}
