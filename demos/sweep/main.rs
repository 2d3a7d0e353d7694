use ping_sweep::{SweepConfig, SweepResult};
use std::time::Duration;

type GenericError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(argh::FromArgs)]
/// sweep - ping every host of the subnet attached to a network interface
struct Args {
    #[argh(option, short = 'i')]
    /// interface to sweep (default: first interface that is up, not loopback and has IPv4)
    interface: Option<String>,

    #[argh(option, short = 't', default = "3000")]
    /// timeout in milliseconds
    timeout: u64,

    #[argh(option, short = 'f', default = "Format::List", from_str_fn(parse_format))]
    /// output format [list|json|jsonall]
    format: Format,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    List,
    Json,
    JsonAll,
}

fn parse_format(value: &str) -> Result<Format, String> {
    match value {
        "list" => Ok(Format::List),
        "json" => Ok(Format::Json),
        "jsonall" => Ok(Format::JsonAll),
        other => Err(format!("unknown output format {other:?}, expected list, json or jsonall")),
    }
}

fn main() -> Result<(), GenericError> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let args: Args = argh::from_env();

    let interface = match args.interface.or_else(ping_sweep::default_interface) {
        Some(interface) => interface,
        None => {
            eprintln!("Unable to automatically determine network interface, specify using -i (e.g. -i eth0)");
            std::process::exit(1);
        }
    };

    let config = SweepConfig::new(Duration::from_millis(args.timeout));
    let result = ping_sweep::start_sweep_with_config(&interface, &config)?;

    print(&result, args.format)
}

fn print(result: &SweepResult, format: Format) -> Result<(), GenericError> {
    match format {
        Format::List => {
            for record in result.alive() {
                println!("{}", record.address);
            }
        }
        Format::Json => println!("{}", serde_json::to_string(&result.only_alive())?),
        Format::JsonAll => println!("{}", serde_json::to_string(result)?),
    }
    Ok(())
}
