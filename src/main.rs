use p1_fem::config::{Config, MeshParams};
use p1_fem::functions::{UTilde, UTildeForcing};
use p1_fem::helmholtz::solve_static;
use p1_fem::wave::simulate;

use log::info;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use structopt::StructOpt;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(StructOpt, Debug)]
#[structopt(name = "p1_fem", rename_all = "verbatim")]
enum Opt {
    /// Solve u - Δu = f for the manufactured solution cos(πx) sin(πy)
    #[structopt(name = "helmholtz")]
    Helmholtz {
        #[structopt(long = "config")]
        config_path: Option<String>,
        /// Vertices along each side of the unit square, overriding the config file
        #[structopt(long)]
        supports: Option<usize>,
        #[structopt(long, default_value = "res")]
        dir: String,
    },
    /// Solve the wave equation from a bump at rest
    #[structopt(name = "wave")]
    Wave {
        #[structopt(long = "config")]
        config_path: Option<String>,
        #[structopt(long)]
        supports: Option<usize>,
        /// Number of evenly spaced frames sampled from the interpolant
        #[structopt(long, default_value = "51")]
        frames: usize,
        #[structopt(long, default_value = "res")]
        dir: String,
    },
}

fn read_config(config_path: &Option<String>, supports: Option<usize>) -> Result<Config> {
    let mut config: Config = match config_path {
        Some(path) => {
            let file = fs::File::open(path)?;
            serde_json::from_reader(BufReader::new(file))?
        }
        None => Config::default(),
    };

    if let Some(supports) = supports {
        config.mesh = MeshParams::square(supports);
    }

    Ok(config)
}

fn helmholtz(config: &Config, dir_path: &Path) -> Result<()> {
    let mesh = config.mesh.build()?;
    let solution = solve_static(&mesh, &UTildeForcing, config.integration)?;

    info!("Max nodal error: {:.6e}", solution.max_nodal_error(&UTilde));

    let file = fs::File::create(dir_path.join("helmholtz.csv"))?;
    let mut buf_writer = BufWriter::new(file);
    solution.output(&mut buf_writer, &UTilde)?;

    Ok(())
}

fn wave(config: &Config, frames: usize, dir_path: &Path) -> Result<()> {
    let mesh = config.mesh.build()?;
    let solution = simulate(&mesh, &config.wave, config.integration)?;
    let interpolant = &solution.interpolant;

    let t_first = interpolant.t_first();
    let t_last = interpolant.t_last();
    let n_frame = frames.max(1);

    for i in 0..n_frame {
        let t = if n_frame == 1 {
            t_first
        } else {
            t_first + (t_last - t_first) * i as f64 / (n_frame - 1) as f64
        };
        let values = interpolant.values_at(t);

        let file = fs::File::create(dir_path.join(format!("output_{:05}.csv", i)))?;
        let mut buffer = BufWriter::new(file);
        buffer.write_all(b"t x y u\n")?;
        for (idx, p) in mesh.vertex_iter().enumerate() {
            buffer.write_all(format!("{:.6e} {:.6e} {:.6e} {:.6e}\n", t, p.x, p.y, values[idx]).as_bytes())?;
        }
    }

    let mut trace_writer = BufWriter::new(fs::File::create(dir_path.join("trace.csv"))?);
    writeln!(&mut trace_writer, "t energy")?;
    for (t, energy) in solution.trajectory.times().iter().zip(solution.energies()) {
        writeln!(&mut trace_writer, "{:.6e} {:.8e}", t, energy)?;
    }

    let mut trajectory_writer = BufWriter::new(fs::File::create(dir_path.join("trajectory.csv"))?);
    solution.trajectory.output(&mesh, &mut trajectory_writer)?;

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    match Opt::from_args() {
        Opt::Helmholtz {
            config_path,
            supports,
            dir,
        } => {
            let config = read_config(&config_path, supports)?;
            let dir_path = Path::new(&dir);
            fs::create_dir_all(dir_path)?;
            helmholtz(&config, dir_path)
        }
        Opt::Wave {
            config_path,
            supports,
            frames,
            dir,
        } => {
            let config = read_config(&config_path, supports)?;
            let dir_path = Path::new(&dir);
            fs::create_dir_all(dir_path)?;
            wave(&config, frames, dir_path)
        }
    }
}
