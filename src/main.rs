use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use log::LevelFilter;

use devwatch::{Action, AncestorPolicy, DeviceRecord, EventLoop, Filter, Report, UdevProvider};

#[derive(Debug, Parser)]
#[command(name = "devwatch", version, about = "Watch a kernel subsystem for attached devices and hotplug events")]
struct Args {
    /// Kernel subsystem to watch (e.g. hidraw, block). Without it the
    /// program exits silently.
    subsystem: Option<String>,

    /// Restrict matches to one devtype within the subsystem.
    #[arg(long)]
    devtype: Option<String>,

    /// Print the udev properties of a single device node and exit.
    #[arg(long, value_name = "DEVNODE")]
    lookup: Option<PathBuf>,

    /// Abort the startup scan when a matched device has no USB ancestor,
    /// instead of skipping it.
    #[arg(long)]
    strict_ancestors: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn request_stop(_signal: libc::c_int) {
    STOP.store(true, Ordering::Relaxed);
}

fn setup_logging(verbose: u8) -> Result<(), fern::InitError> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    fern::Dispatch::new()
        // Exclude logs for crates that we use
        .level(LevelFilter::Off)
        .level_for("devwatch", level)
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn print_snapshot(record: &DeviceRecord) {
    match &record.devnode {
        Some(node) => println!("device node: {}", node.display()),
        None => println!("device: {}", record.syspath.display()),
    }

    let attr = |name: &str| record.attributes.get(name).map_or("", String::as_str);
    println!("  vid/pid: {} {}", attr("idVendor"), attr("idProduct"));
    println!("  manufacturer: {}", attr("manufacturer"));
    println!("  product: {}", attr("product"));
    println!("  serial: {}", attr("serial"));
}

fn print_event(record: &DeviceRecord) {
    let action = record.action.unwrap_or(Action::Unknown);
    let node = record
        .devnode
        .as_deref()
        .unwrap_or(record.syspath.as_path());

    println!(
        "{action}: {} (subsystem={}, devtype={})",
        node.display(),
        record.subsystem.as_deref().unwrap_or("-"),
        record.devtype.as_deref().unwrap_or("-"),
    );
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose)?;

    if let Some(devnode) = &args.lookup {
        let provider = UdevProvider::new()?;
        let Some(properties) = provider.lookup_by_devnode(devnode)? else {
            anyhow::bail!("{} is not a device node known to udev", devnode.display());
        };
        for (name, value) in properties {
            println!("{name}={value}");
        }
        return Ok(());
    }

    // Reference behavior: no filter argument is a silent, successful no-op.
    let Some(subsystem) = args.subsystem else {
        return Ok(());
    };

    let mut filter = Filter::subsystem(subsystem);
    if let Some(devtype) = args.devtype {
        filter = filter.with_devtype(devtype);
    }
    let policy = if args.strict_ancestors {
        AncestorPolicy::Fatal
    } else {
        AncestorPolicy::Skip
    };

    unsafe {
        let handler = request_stop as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }

    let provider = UdevProvider::new()?;
    EventLoop::new(&provider, filter)
        .ancestor_policy(policy)
        .run(&STOP, |report| match report {
            Report::Present(record) => print_snapshot(&record),
            Report::Skipped(syspath) => {
                println!("skipped: {} (no usb ancestor)", syspath.display());
            }
            Report::Event(record) => print_event(&record),
            Report::ReceiveFailed => {
                println!("an event was pending but none could be received");
            }
        })?;

    Ok(())
}
