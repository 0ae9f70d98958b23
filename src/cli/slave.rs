use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use parking_lot::Mutex;

use super::config::SlaveConfig;
use crate::{
    core::{watch_store, Bus, CoreToUi, SharedLogBuffer, UiToCore},
    protocol::{
        build_pipeline,
        seed::{load_seed, parse_seed, BUNDLED_SEED},
        service::SlaveServer,
        simulator::{Simulator, UptimeCounter},
        RequestHandler, Store,
    },
    tui::{self, Dashboard, SlaveStatus},
};

pub fn slave_command() -> Command {
    Command::new("slave")
        .about("Serve an in-memory register map over Modbus TCP")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("TOML configuration file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("listen")
                .long("listen")
                .short('l')
                .value_name("ADDR")
                .help("Listen address, e.g. 127.0.0.1:5502")
                .value_parser(value_parser!(std::net::SocketAddr)),
        )
        .arg(
            Arg::new("unit-id")
                .long("unit-id")
                .short('u')
                .value_name("N")
                .help("Unit id this slave answers for")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("FILE")
                .help("JSON seed with the initial register map")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("max-clients")
                .long("max-clients")
                .value_name("N")
                .help("Maximum number of simultaneous connections")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .help("Randomize discrete inputs and input registers periodically")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tui")
                .long("tui")
                .short('t')
                .help("Show the terminal dashboard")
                .action(ArgAction::SetTrue),
        )
}

/// Load the config file (if given) and layer command line flags over it.
pub fn config_from_matches(matches: &ArgMatches) -> Result<SlaveConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SlaveConfig::from_file(path)?,
        None => SlaveConfig::default(),
    };

    if let Some(listen) = matches.get_one::<std::net::SocketAddr>("listen") {
        config.listen = *listen;
    }
    if let Some(unit_id) = matches.get_one::<u8>("unit-id") {
        config.unit_id = *unit_id;
    }
    if let Some(seed) = matches.get_one::<PathBuf>("seed") {
        config.seed = Some(seed.clone());
    }
    if let Some(max_clients) = matches.get_one::<usize>("max-clients") {
        config.max_clients = *max_clients;
    }
    if matches.get_flag("simulate") {
        config.simulate = true;
    }
    Ok(config)
}

/// Stopping joins the worker thread, so the toggle runs on the blocking pool.
async fn toggle_simulation(simulator: &Arc<Mutex<Simulator>>) -> Result<bool> {
    let simulator = simulator.clone();
    tokio::task::spawn_blocking(move || simulator.lock().toggle())
        .await
        .context("simulator toggle panicked")
}

/// Run the slave until Ctrl-C, or until the dashboard quits when `logs` is
/// given.
pub async fn run_slave(config: SlaveConfig, logs: Option<SharedLogBuffer>) -> Result<()> {
    let dump = match &config.seed {
        Some(path) => load_seed(path)?,
        None => {
            log::info!("no seed file configured, using the bundled register map");
            parse_seed(BUNDLED_SEED).context("bundled seed is invalid")?
        }
    };
    let store = Arc::new(Store::from_dump(&dump));
    let pipeline: Arc<dyn RequestHandler> =
        Arc::new(build_pipeline(store.clone(), config.unit_id));

    let server = SlaveServer::bind(config.listen, pipeline, config.max_clients).await?;
    let listen = server.local_addr()?;
    let clients = server.tracker();

    let uptime = Arc::new(UptimeCounter::default());
    let ticker = uptime.clone().spawn_ticker();

    let simulator = Arc::new(Mutex::new(Simulator::new(
        store.clone(),
        config.simulation_interval(),
    )));
    if config.simulate {
        simulator.lock().start();
    }

    let (stop_tx, stop_rx) = flume::bounded::<()>(1);
    let mut server_task = tokio::spawn(server.run_until(async move {
        let _ = stop_rx.recv_async().await;
    }));
    log::info!(
        "slave ready on {listen}, unit {}, up to {} clients",
        config.unit_id,
        config.max_clients
    );

    let mut dashboard_task = None;
    let mut core_tx = None;
    let finished_early = match logs {
        Some(logs) => {
            let (ui_tx, ui_rx) = flume::unbounded::<UiToCore>();
            let (to_ui, core_rx) = flume::unbounded::<CoreToUi>();
            let dashboard = Dashboard {
                events: watch_store(&store),
                store: store.clone(),
                logs,
                bus: Bus::new(core_rx, ui_tx),
                status: SlaveStatus {
                    listen,
                    unit_id: config.unit_id,
                    clients,
                    uptime: uptime.clone(),
                    simulating: simulator.lock().is_running(),
                },
            };
            dashboard_task = Some(tokio::task::spawn_blocking(move || tui::run(dashboard)));

            let mut finished_early = None;
            loop {
                tokio::select! {
                    command = ui_rx.recv_async() => match command {
                        Ok(UiToCore::ToggleSimulation) => {
                            let running = toggle_simulation(&simulator).await?;
                            let _ = to_ui.send(CoreToUi::SimulationChanged(running));
                        }
                        Ok(UiToCore::Quit) | Err(_) => break,
                    },
                    result = &mut server_task => {
                        finished_early = Some(result);
                        break;
                    }
                }
            }
            core_tx = Some(to_ui);
            finished_early
        }
        None => {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for Ctrl-C")?;
                    log::info!("Ctrl-C received");
                    None
                }
                result = &mut server_task => Some(result),
            }
        }
    };

    let stopping = simulator.clone();
    tokio::task::spawn_blocking(move || stopping.lock().stop())
        .await
        .context("simulator shutdown panicked")?;
    ticker.abort();

    let served = match finished_early {
        Some(result) => result,
        None => {
            let _ = stop_tx.send(());
            tokio::time::timeout(config.timeout(), server_task)
                .await
                .map_err(|_| anyhow!("listener did not stop within {:?}", config.timeout()))?
        }
    };

    if let Some(to_ui) = core_tx {
        let _ = to_ui.send(CoreToUi::Stopped);
    }
    if let Some(task) = dashboard_task {
        task.await.context("dashboard thread panicked")??;
    }

    served.context("listener task panicked")??;
    log::info!("slave on {listen} stopped after {}s", uptime.seconds());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        slave_command().get_matches_from(std::iter::once("slave").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = config_from_matches(&parse(&[
            "--listen",
            "0.0.0.0:1502",
            "--unit-id",
            "4",
            "--max-clients",
            "1",
            "--simulate",
        ]))
        .unwrap();

        assert_eq!(config.listen.port(), 1502);
        assert_eq!(config.unit_id, 4);
        assert_eq!(config.max_clients, 1);
        assert!(config.simulate);
        assert_eq!(config.timeout_ms, 30_000);
    }

    #[tokio::test]
    async fn test_toggle_simulation_flips_state() -> Result<()> {
        let store = Arc::new(Store::default());
        let simulator = Arc::new(Mutex::new(Simulator::new(
            store,
            std::time::Duration::from_millis(5),
        )));

        assert!(toggle_simulation(&simulator).await?);
        assert!(simulator.lock().is_running());
        assert!(!toggle_simulation(&simulator).await?);
        assert!(!simulator.lock().is_running());
        Ok(())
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(config_from_matches(&parse(&["--config", "/nonexistent/mbsim.toml"])).is_err());
    }
}
