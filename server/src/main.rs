/*
 * Created on Mon Jan 16 2023
 *
 * This file is a part of Ferrite
 * Ferrite is a free and open-source Redis-compatible in-memory database
 * implemented in Rust, aiming to stay faithful to the Redis 1.0 wire
 * protocol while keeping the engine small and predictable.
 *
 * Copyright (c) 2023, the Ferrite developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Ferrite
//!
//! The `ferrited` crate (or the `server` folder) is Ferrite's database
//! server: a network-accessible in-memory key-value store speaking the
//! Redis 1.0 wire protocol. There are several modules within this crate;
//! see the modules for their respective documentation.

use env_logger::Builder;
use libferrite::util::terminal;
use libferrite::{URL, VERSION};
use std::env;
use std::fs;
use std::io::Write;
use std::path;
use std::process;

mod actions;
mod arbiter;
mod auth;
mod config;
mod corestore;
mod dbnet;
mod diskstore;
mod expiry;
mod protocol;
mod queryengine;
mod resp;
mod services;
mod util;
#[cfg(test)]
mod tests;

use crate::config::ConfigurationSet;
use crate::util::FerResult;

/// A generic I/O result
pub type IoResult<T> = std::io::Result<T>;

const PATH: &str = ".ferrite_pid";

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// Jemallocator - this is the default memory allocator for platforms other
/// than msvc
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    Builder::new()
        .parse_filters(&env::var("FERRITE_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();
    let cfg = match check_args_and_get_cfg() {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("{}", e);
            process::exit(util::EXITCODE_ERROR);
        }
    };
    println!("Ferrite v{} | {}", VERSION, URL);
    // check if any other process is using the data directory and lock it if
    // not (else error)
    let pid_file = run_pre_startup_tasks();
    // Start the server which asynchronously waits for a CTRL+C signal
    // which will safely shut down the server
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("server")
        .enable_all()
        .build()
        .unwrap();
    let result = runtime.block_on(arbiter::run(cfg));
    // Make sure all background workers terminate
    drop(runtime);
    // close the PID file and remove it
    drop(pid_file);
    if let Err(e) = fs::remove_file(PATH) {
        log::error!("Shutdown failure: Failed to remove pid file: {}", e);
        process::exit(util::EXITCODE_ERROR);
    }
    if let Err(e) = result {
        log::error!("{}", e);
        process::exit(util::EXITCODE_ERROR);
    }
    log::info!("Stopped accepting incoming connections");
    let _ = terminal::write_info("Goodbye :)\n");
}

/// This function checks the command line arguments and either returns a
/// config object or a startup error. The first argument, when present, is
/// the path to a configuration file
fn check_args_and_get_cfg() -> FerResult<ConfigurationSet> {
    match env::args().nth(1) {
        Some(file) => {
            let cfg = config::load(path::Path::new(&file))?;
            log::info!("Using settings from the supplied configuration");
            Ok(cfg)
        }
        None => {
            log::warn!("No configuration file supplied. Using default settings");
            Ok(ConfigurationSet::default())
        }
    }
}

/// On startup, we attempt to check if a `.ferrite_pid` file exists. If it
/// does, then this file will contain the kernel/operating system assigned
/// process ID of the ferrited process. We will attempt to read that and log
/// an error complaining that the directory is in active use by another
/// process. If the file doesn't exist, then we're free to create our own
/// file and write our own PID to it. Any subsequent processes will detect
/// this and this helps us prevent two processes from writing to the same
/// directory which can cause potentially undefined behavior.
fn run_pre_startup_tasks() -> fs::File {
    let path = path::Path::new(PATH);
    if path.exists() {
        let pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
        log::error!(
            "Startup failure: Another process with parent PID {} is using the data directory",
            pid
        );
        process::exit(util::EXITCODE_ERROR);
    }
    let mut file = match fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(PATH)
    {
        Ok(file) => file,
        Err(e) => {
            log::error!("Startup failure: Failed to open pid file: {}", e);
            process::exit(util::EXITCODE_ERROR);
        }
    };
    if let Err(e) = file.write_all(process::id().to_string().as_bytes()) {
        log::error!("Startup failure: Failed to write to pid file: {}", e);
        process::exit(util::EXITCODE_ERROR);
    }
    file
}
