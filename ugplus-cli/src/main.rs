//! # UGPlus command line tool
//!
//! A small front end over the [`ugplus-gpib`](https://docs.rs/ugplus-gpib/)
//! driver for poking at GPIB instruments from a shell: identify the adapter,
//! scan the bus, and exchange messages with an instrument by bus address.

use std::error::Error;
use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_num::maybe_hex;
use env_logger::Env;
use ugplus_gpib::UgPlusGpib;

#[derive(Parser)]
#[command(about = "Command line tool for the UGPlus USB-to-GPIB controller", long_about = None)]
struct Args {
    /// Only adopt the adapter with this series number
    #[arg(short, long, value_parser = maybe_hex::<u32>)]
    series: Option<u32>,

    /// USB timeout in milliseconds
    #[arg(short, long, default_value = "1000")]
    timeout_ms: u64,

    #[clap(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print manufacturer, model, series and firmware version of the adapter
    Info,
    /// List the bus addresses of attached instruments
    Scan,
    /// Return the adapter to a known state
    Reset,
    /// Send data to the instrument at the given bus address
    Write {
        #[arg(value_parser = maybe_hex::<u8>)]
        address: u8,
        data: String,
    },
    /// Read the pending answer of the instrument at the given bus address
    Read {
        #[arg(value_parser = maybe_hex::<u8>)]
        address: u8,
        /// Time the instrument gets to respond before the reply is collected,
        /// in milliseconds
        #[arg(short, long, default_value = "300")]
        delay_ms: u64,
    },
    /// Send a command and print the instrument's answer
    Query {
        #[arg(value_parser = maybe_hex::<u8>)]
        address: u8,
        data: String,
        #[arg(short, long, default_value = "300")]
        delay_ms: u64,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::debug!(
        "Parsed arguments: series={:?}, timeout={}ms",
        args.series,
        args.timeout_ms
    );

    let mut gpib = UgPlusGpib::connect(args.series, Duration::from_millis(args.timeout_ms))?;

    match args.command {
        CliCommand::Info => {
            let manufacturer = gpib.get_manufacturer_id()?;
            let (model, series) = gpib.get_series_number()?;
            let firmware = gpib.get_firmware_version()?;
            println!("Manufacturer:     {manufacturer}");
            println!("Model:            0x{model:02X}");
            println!("Series number:    {series}");
            println!("Firmware version: {firmware}");
        }
        CliCommand::Scan => {
            let addresses = gpib.discover_devices()?;
            if addresses.is_empty() {
                println!("No instruments found on the bus");
            }
            for address in addresses {
                println!("Instrument at address {address}");
            }
        }
        CliCommand::Reset => {
            gpib.reset()?;
            println!("Adapter reset");
        }
        CliCommand::Write { address, data } => {
            gpib.write(address, data.as_bytes())?;
        }
        CliCommand::Read { address, delay_ms } => {
            print_answer(gpib.read(address, Duration::from_millis(delay_ms))?);
        }
        CliCommand::Query {
            address,
            data,
            delay_ms,
        } => {
            gpib.write(address, data.as_bytes())?;
            print_answer(gpib.read(address, Duration::from_millis(delay_ms))?);
        }
    }
    Ok(())
}

fn print_answer(answer: Option<Vec<u8>>) {
    match answer {
        Some(data) => println!("{}", String::from_utf8_lossy(&data)),
        None => println!("No answer from the instrument"),
    }
}
