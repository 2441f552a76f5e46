extern crate clap;
extern crate rand;
extern crate rand_xorshift;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_yaml;
extern crate tbme;

use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tbme::{io, model_space};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RunConf {
    model_space: model_space::Conf,
    operator: tbme::tbme::Conf,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let matches = clap::App::new(env!("CARGO_PKG_NAME"))
        .args_from_usage("[--conf=<conf>] 'YAML file with model_space and operator settings'")
        .args_from_usage("[--emax=<emax>] 'Maximum shell index (overrides --conf)'")
        .args_from_usage("[--input=<input>] 'Operator file to summarize (.gz and .xz are decompressed)'")
        .args_from_usage("[--output=<output>] 'Write a random operator to this file'")
        .args_from_usage("[--seed=<seed>] 'Seed for the random operator'")
        .get_matches();

    let mut conf: RunConf = match matches.value_of("conf") {
        Some(path) => serde_yaml::from_reader(File::open(path)?)?,
        None => Default::default(),
    };
    if let Some(e_max) = matches.value_of("emax") {
        conf.model_space.e_max = e_max.parse()?;
    }
    print!("{}", serde_yaml::to_string(&conf)?);
    println!();

    let ms = conf.model_space.make_model_space()?;
    println!("num_orbits: {}", ms.num_orbits());
    println!("num_channels: {}", ms.num_channels());
    println!("num_kets: {}", ms.channels().iter()
             .map(|c| c.num_kets()).sum::<usize>());

    let mut op = conf.operator.make_tbme(&ms);
    println!("num_blocks: {}", op.blocks().count());
    println!("dimension: {}", op.dimension());
    println!("size: {}", op.size());

    if let Some(output) = matches.value_of("output") {
        let seed = matches.value_of("seed").unwrap_or("0").parse()?;
        op.fill_random(&mut XorShiftRng::seed_from_u64(seed));
        let mut w = io::create_compressed(Path::new(output))?;
        op.write_binary(&mut w)?;
        w.flush()?;
        println!("output: {:?}", output);
        println!("norm: {}", op.norm());
    }

    if let Some(input) = matches.value_of("input") {
        println!("# reading operator...");
        let mut r = io::open_compressed(Path::new(input))?;
        op.read_binary(&mut r)?;
        println!("input: {:?}", input);
        println!("norm: {}", op.norm());
        println!("blocks:");
        let chans = ms.channels();
        for (&(ch_bra, ch_ket), m) in op.blocks() {
            println!("  - {{bra: '{}', ket: '{}', dims: [{}, {}], norm: {}}}",
                     chans[ch_bra].jpt, chans[ch_ket].jpt,
                     m.nrows(), m.ncols(), m.norm());
        }
    }
    Ok(())
}
