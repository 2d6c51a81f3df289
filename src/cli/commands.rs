use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Initialize the server (create the database and optionally the first owner)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Email of an owner account to create
        #[arg(long)]
        owner_email: Option<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with a magic link and store the session locally
    Login {
        /// Server URL (e.g., "https://join.example.com")
        #[arg(long)]
        server: Option<String>,

        /// Email to send the magic link to
        #[arg(long)]
        email: Option<String>,

        /// Login link, magic-link token or session token
        #[arg(long)]
        token: Option<String>,

        /// Skip interactive prompts (requires --server and --token)
        #[arg(long)]
        non_interactive: bool,
    },

    /// Sign out and remove stored credentials
    Logout,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List your projects with signup counts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a project
    New {
        /// Project name
        #[arg(long)]
        name: Option<String>,

        /// Public slug (derived from the name when omitted)
        #[arg(long)]
        slug: Option<String>,

        /// Skip interactive prompts (requires --name)
        #[arg(long)]
        non_interactive: bool,
    },

    /// Show signup totals and the per-source breakdown
    Stats {
        /// Project ID (prompts when omitted)
        #[arg(long)]
        project_id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a tracking link for a source
    Link {
        /// Project ID (prompts when omitted)
        #[arg(long)]
        project_id: Option<String>,

        /// Source tag appended as ?src=
        #[arg(long)]
        src: Option<String>,
    },
}
