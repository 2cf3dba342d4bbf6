use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "Credential issuance and refresh-token rotation service")]
pub struct Cli {
    /// Path to a TOML settings file.
    #[arg(long)]
    pub settings: Option<String>,
}
