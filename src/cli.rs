use std::path::PathBuf;

use clap::builder::{styling::AnsiColor, Styles};
use clap::Parser;

use metar_stall::decoder::DEFAULT_API_URL;

const ABOUT: &str = "METAR operations console";

const LONG_ABOUT: &str = "
TUI for reading decoded METAR reports.

Raw reports are sent to the METAR decoding service (see --api-url) and the decoded fields are
shown with an at-a-glance sky/visibility indicator, a wind compass rose and the narrative
summary. A report can be given on the command line or typed in with `n` once the console is up.
";

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Green.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug)]
#[command(version, styles=STYLES, about=ABOUT, long_about = LONG_ABOUT)]
pub struct Args {
    #[arg(help = "Raw METAR to decode at startup (e.g. \"METAR LEMD 121330Z 21015KT 9999 FEW030 14/05 Q1012=\")")]
    pub metar: Option<String>,

    #[arg(
        long,
        env = "METAR_STALL_API_URL",
        default_value = DEFAULT_API_URL,
        help = "Base URL of the METAR decoding service"
    )]
    pub api_url: String,

    #[arg(long, default_value_t = 10, help = "HTTP timeout in seconds")]
    pub timeout: u64,

    #[arg(long, help = "Write logs to this file (filtered by RUST_LOG)")]
    pub log_file: Option<PathBuf>,
}
