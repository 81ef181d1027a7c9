use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

mod args;
mod auth;
mod board;
mod contact;
mod gate;
mod resolver;
mod role;
mod routes;
mod scholarship;
mod session;
mod store;
mod subscribe;
mod time;
mod user;

use args::Args;
use board::Board;
use session::SessionHub;
use store::Store;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let args = Args::parse();

    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("couldn't parse listen address: {e}");
            exit(1);
        }
    };

    let store = Store::new(args.data_dir()).await;

    let hub = Arc::new(SessionHub::new());
    let board = Arc::new(Board::new(store.clone(), Arc::clone(&hub)));

    if let Some((email, password)) = args.bootstrap_superadmin() {
        if board.bootstrap_superadmin(email, password).await.is_err() {
            error!("couldn't bootstrap superadmin {email}");
            exit(1);
        }
    }

    tokio::spawn(gate::watch_sessions(store, Arc::clone(&hub)));

    info!("listening on {addr}");

    warp::serve(routes::all(board, args.secure()))
        .run(addr)
        .await;
}
