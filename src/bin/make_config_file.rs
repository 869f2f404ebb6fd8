use p1_fem::config::Config;
use p1_fem::utilities::dump_default_to_json_file;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "make_config_file", rename_all = "verbatim")]
struct Opt {
    /// Where to write the default configuration
    #[structopt(long = "output", default_value = "config.json")]
    output_path: String,
}

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    dump_default_to_json_file::<Config>(&opt.output_path)?;
    log::info!("Wrote default configuration to {}", opt.output_path);

    Ok(())
}
