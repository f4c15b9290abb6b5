use clap::Parser;
use sqlflow_server::{Cli, Command};

fn main() {
    let Cli { cmd, log_args } = Cli::parse();
    sqlflow_server::init_logging(&log_args);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build();

    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "couldn't build Tokio runtime");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async move {
        match cmd {
            Command::Serve(args) => sqlflow_server::serve(args).await,
            Command::Run(args) => {
                sqlflow_server::run_client(args, &mut std::io::stdout().lock()).await
            }
        }
    });

    // Don't wait on executor tasks which were detached after cancellation.
    runtime.shutdown_background();

    if let Err(error) = result {
        tracing::error!(error = format!("{error:#}"), "sqlflow failed");
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
