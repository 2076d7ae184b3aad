use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "mediafetch")]
#[command(about = "Video download service backed by an external downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),
    /// Print metadata for a video URL as JSON
    Info(InfoArgs),
    /// Check that the downloader executable is available
    Check,
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (defaults to `server.bind_addr`)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    /// Video URL (youtube.com or youtu.be)
    pub url: String,
}
