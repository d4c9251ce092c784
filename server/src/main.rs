// Remote-rendering tile server entry point.
//
// Installs the logging backend and loads configuration the way the
// teacher's compositor binary spins up its subsystem before entering
// the event loop, then starts the tile-encode worker pool. Accepting
// connections and driving the per-connection state machine is left to
// whatever transport a deployment wires in (spec.md explicitly assumes
// an external framed transport).

fn main() {
    env_logger::init();

    let config = server::Config::from_env();
    log::info!("starting remote-render server on {} ({} workers, {}x{} tiles)", config.bind_address, config.worker_count, config.tile_width, config.tile_height);

    let pool = server::WorkerPool::new(config.worker_count);
    log::debug!("tile encode pool running with {} workers", pool.worker_count());
    pool.shutdown();
}
