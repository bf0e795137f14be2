//! `tally info`: Display collector options and environment.

use tally_gc::defaults::{ENV_COLLECT_ON_RELEASE, ENV_EXIT_HOOK, ENV_INITIAL_CAPACITY};
use tally_gc::GcOptions;

pub fn execute() -> anyhow::Result<()> {
    println!("Tally v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let options = GcOptions::from_env()?;
    println!("Options:");
    println!("  collect_on_release: {}", options.collect_on_release);
    println!("  exit_hook:          {}", options.exit_hook);
    println!("  initial_capacity:   {}", options.initial_capacity);

    println!();
    println!("Environment:");
    print_env(ENV_COLLECT_ON_RELEASE);
    print_env(ENV_EXIT_HOOK);
    print_env(ENV_INITIAL_CAPACITY);
    print_env("RUST_LOG");

    Ok(())
}

fn print_env(name: &str) {
    match std::env::var(name) {
        Ok(val) => println!("  {:<28} = {}", name, val),
        Err(_) => println!("  {:<28}   (not set)", name),
    }
}
