use clap::{Parser, Subcommand};
use emote_core::FilterMode;

#[derive(Parser)]
#[command(
    author = "Gokul <@bahdotsh>",
    version = env!("CARGO_PKG_VERSION"),
    about = "emote - system-wide :shortcode: expansion",
    long_about = "emote watches what you type and replaces :shortcodes: such as :shipit: with emoji or any text you choose."
)]
pub struct Emote {
    #[clap(subcommand)]
    pub commands: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Add or override a custom alias
    Add {
        #[clap(help = "Trigger without colons, e.g. shipit")]
        trigger: String,

        #[clap(help = "Text inserted in place of :trigger:")]
        replacement: String,
    },
    /// Remove a custom alias
    Remove {
        #[clap(help = "Trigger to remove")]
        trigger: String,
    },
    /// List aliases
    List {
        #[clap(long, short, help = "Only show custom aliases")]
        custom: bool,
    },
    /// Print the path of the custom alias file
    Edit,
    /// Show what a typed buffer would expand to
    Expand {
        #[clap(help = "Typed text ending in a colon, e.g. ':shipit:'")]
        text: String,
    },
    /// Show or change which applications emote is active in
    Filter {
        #[clap(long, short, help = "Filter mode: off, allow or deny")]
        mode: Option<FilterMode>,

        #[clap(long, short, help = "Bundle identifiers to add (comma-separated)")]
        add: Vec<String>,

        #[clap(long, short, help = "Bundle identifier to remove from the list")]
        remove: Vec<String>,

        #[clap(long, help = "Empty the identifier list")]
        clear: bool,
    },
    /// Print the effective settings
    Settings,
    /// Start the emote daemon
    Start,
    /// Stop the emote daemon
    Stop,
    /// Check the status of the emote daemon
    Status,
    /// Check (and request) the input monitoring permission
    Permissions,
    // Hidden command used internally to run the daemon worker
    #[clap(hide = true)]
    DaemonWorker,
}
