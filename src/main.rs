use anyhow::Result;

use mbsim::{
    cli::{self, master::run_master, slave},
    core::{BufferLogger, LogBuffer},
};

const DASHBOARD_LOG_CAPACITY: usize = 500;

fn init_env_logger(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::parse_args();

    match matches.subcommand() {
        Some(("slave", sub)) => {
            if sub.get_flag("tui") {
                let logs = LogBuffer::shared(DASHBOARD_LOG_CAPACITY);
                BufferLogger::install(logs.clone(), false)?;
                let config = slave::config_from_matches(sub)?;
                slave::run_slave(config, Some(logs)).await
            } else {
                init_env_logger("info");
                let config = slave::config_from_matches(sub)?;
                slave::run_slave(config, None).await
            }
        }
        Some(("master", sub)) => {
            init_env_logger("warn");
            run_master(sub).await
        }
        _ => Ok(()),
    }
}
