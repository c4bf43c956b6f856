use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use dsml::parser::{ParserConfig, RequestIdPolicy};
use dsml::serializer::SerializerConfig;
use dsml::{codec, tokiou};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Xml,
    Ber,
}

struct Args {
    path: String,
    output: Output,
    config: ParserConfig,
    compact: bool,
}

const USAGE: &str = "usage: dsml <batch.xml> [--xml|--ber] [--compact] [--require-ids|--require-ids-parallel]";

fn parse_args() -> Option<Args> {
    let mut path = None;
    let mut output = Output::Xml;
    let mut config = ParserConfig::default();
    let mut compact = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--xml" => output = Output::Xml,
            "--ber" => output = Output::Ber,
            "--compact" => compact = true,
            "--require-ids" => config = config.with_request_id(RequestIdPolicy::Required),
            "--require-ids-parallel" => config = config.with_request_id(RequestIdPolicy::RequiredWhenParallel),
            _ if arg.starts_with("--") => return None,
            _ if path.is_none() => path = Some(arg),
            _ => return None,
        }
    }
    Some(Args { path: path?, output, config, compact })
}

async fn run(args: Args) -> dsml::Result<()> {
    let mut file = tokio::fs::File::open(&args.path).await?;
    let batch = tokiou::read_batch(&mut file, args.config).await?;
    tracing::info!(path = %args.path, requests = batch.requests.len(), "batch loaded");
    match args.output {
        Output::Xml => {
            let config = if args.compact { SerializerConfig::compact() } else { SerializerConfig::default() };
            let mut out = tokio::io::stdout();
            tokiou::write_batch(&mut out, &batch, &config).await?;
        }
        Output::Ber => {
            for (message, id) in batch.requests.iter().zip(batch.message_ids()) {
                let pdu = codec::encode_message(message, id)?;
                println!("{}", hex::encode(pdu));
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Some(args) = parse_args() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(async {
        match run(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "batch rejected");
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        }
    })
}
