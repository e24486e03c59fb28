use tracing::info;
use tracing_subscriber;

use clap::{value_t, App, Arg};

use zfx_peering::server::{node, Role, Settings};
use zfx_peering::Result;

fn main() -> Result<()> {
    let matches = App::new("zfx-peering")
        .version("0.1")
        .author("zero.fx labs ltd.")
        .about("Runs the master or a worker of a peering node")
        .arg(
            Arg::with_name("role")
                .short("r")
                .long("role")
                .value_name("ROLE")
                .possible_values(&["master", "worker"])
                .takes_value(true),
        )
        .arg(
            Arg::with_name("listener-ip")
                .short("a")
                .long("listener-ip")
                .value_name("LISTENER_IP")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("master-ip")
                .short("m")
                .long("master-ip")
                .value_name("MASTER_IP")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("worker-id")
                .short("w")
                .long("worker-id")
                .value_name("WORKER_ID")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("seed")
                .short("s")
                .long("seed")
                .value_name("NONCE@IP:PORT")
                .multiple(true)
                .takes_value(true),
        )
        .get_matches();

    let mut settings = Settings::new()?;
    match matches.value_of("role") {
        Some("master") => settings.role = Role::Master,
        Some(_) => settings.role = Role::Worker,
        None => (),
    }
    if let Some(listener_ip) = matches.value_of("listener-ip") {
        settings.listener_ip = listener_ip.to_owned();
    }
    if let Some(master_ip) = matches.value_of("master-ip") {
        settings.master_ip = master_ip.to_owned();
    }
    if matches.is_present("worker-id") {
        settings.worker_id = value_t!(matches.value_of("worker-id"), u32).unwrap_or_else(|e| e.exit());
    }
    if let Some(seeds) = matches.values_of("seed") {
        settings.seed_peers = seeds.map(String::from).collect();
    }

    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(settings.log_level())
        .init();

    let sys = actix::System::new();
    sys.block_on(async move {
        let started = match settings.role {
            Role::Master => node::run_master(&settings).map(|_| ()),
            Role::Worker => node::run_worker(&settings).map(|_| ()),
        };
        if let Err(err) = started {
            tracing::error!("{} failed to start: {:?}", settings.role, err);
            actix::System::current().stop();
            return;
        }

        let sig = if cfg!(unix) {
            use futures::future::FutureExt;
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigint = signal(SignalKind::interrupt()).unwrap();
            let mut sigterm = signal(SignalKind::terminate()).unwrap();

            futures::select! {
                _ = sigint.recv().fuse() => "SIGINT",
                _ = sigterm.recv().fuse() => "SIGTERM"
            }
        } else {
            tokio::signal::ctrl_c().await.unwrap();
            "Ctrl+C"
        };
        info!(target: "zfx-peering", "Got {}, stopping...", sig);

        actix::System::current().stop();
    });
    sys.run()?;

    Ok(())
}
