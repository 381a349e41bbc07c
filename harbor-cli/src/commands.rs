use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install and start the gateway launch agent
    Enable {
        /// Port the gateway should listen on
        #[arg(short, long, default_value_t = 8787)]
        port: u16,
    },
    /// Stop the gateway launch agent and remove its descriptor
    Disable,
    /// Show whether the launch agent is loaded and what is installed
    Status,
    /// Force-restart the running gateway
    Restart,
}
