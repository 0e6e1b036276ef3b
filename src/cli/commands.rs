use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Initialize the database and create the first admin account
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Admin display name (20 to 60 characters)
        #[arg(long)]
        name: Option<String>,

        /// Admin login email
        #[arg(long)]
        email: Option<String>,

        /// Admin password (8 to 16 characters, one uppercase, one special)
        #[arg(long)]
        password: Option<String>,

        /// Admin postal address
        #[arg(long)]
        address: Option<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}
