// Command-line surface: the quiet flag is stripped from anywhere in the
// argument list first, everything else is parsed by clap.

use std::io::Write;
use std::path::PathBuf;

use clap::builder::NonEmptyStringValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::api::VERIFY_PATH;
use crate::commands::{Console, RunAll};
use crate::config::Config;
use crate::error::Result;

const DEFAULT_IMAGE: &str = "image/created_1.jpg";
const DEFAULT_NAME: &str = "QA Runner";
const DEFAULT_RUN_ALL_DETAIL: &str = "{'guia':'654321'}";

const AFTER_HELP: &str = "\
Environment (also read from .env):
  BASE_URL     API root (default: https://api.develop.biodoc.com.br)
  AUTH_TOKEN   bearer token for protected endpoints
  CARD_ID      card id used when --id is not given

Global flag:
  -q, --quiet  do not print raw response bodies (accepted in any position)

Examples:
  biodoc-runner create-card --image images/create.jpg --id 123 --name 'Jane Doe' --consent=true
  biodoc-runner verify-card --image images/selfie.jpg --id 123
  biodoc-runner delete-card --id 123
  biodoc-runner run-all -q";

/// Remove every `--quiet`/`-q` from `args`, keeping the order of the rest.
/// Returns the remaining arguments and whether quiet mode was requested.
pub fn strip_quiet<I, S>(args: I) -> (Vec<String>, bool)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut quiet = false;
    let rest = args
        .into_iter()
        .map(Into::into)
        .filter(|a| {
            let is_quiet = a == "--quiet" || a == "-q";
            quiet |= is_quiet;
            !is_quiet
        })
        .collect();
    (rest, quiet)
}

#[derive(Debug, Parser)]
#[command(
    name = "biodoc-runner",
    version,
    about = "Exercise the card API: create, verify, fetch and delete cards",
    arg_required_else_help = true,
    disable_help_subcommand = true,
    after_help = AFTER_HELP
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a card from an image (POST /api/card/integration/register)
    CreateCard(CreateCardArgs),

    /// Download the main image of a card (GET /api/card/integration/mainimage)
    MainImage(MainImageArgs),

    /// Verify an image against a card (POST /api/card/integration/verify)
    VerifyCard(VerifyCardArgs),

    /// Delete a card (DELETE /api/card/{id})
    DeleteCard(DeleteCardArgs),

    /// Preclean, create, verify and delete in one go
    RunAll(RunAllArgs),
}

#[derive(Debug, Args)]
pub struct CreateCardArgs {
    /// Image file to register
    #[arg(long, default_value = DEFAULT_IMAGE)]
    pub image: PathBuf,

    /// Card id [default: CARD_ID or built-in id]
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long, default_value = DEFAULT_NAME)]
    pub name: String,

    /// Whether the consent term was signed
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub consent: bool,
}

#[derive(Debug, Args)]
pub struct MainImageArgs {
    /// Value of the idCard header
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    pub idcard: String,

    /// Output file [default: mainimage.bin]
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct VerifyCardArgs {
    /// Path of the verify route
    #[arg(long, default_value = VERIFY_PATH)]
    pub endpoint: String,

    /// Image to verify
    #[arg(long, default_value = DEFAULT_IMAGE)]
    pub image: PathBuf,

    /// Card id [default: CARD_ID or built-in id]
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long, default_value = DEFAULT_NAME)]
    pub name: String,

    /// Free-form details, e.g. "{'guia': '654321'}"
    #[arg(long, default_value = "")]
    pub detail: String,
}

#[derive(Debug, Args)]
pub struct DeleteCardArgs {
    /// Card id [default: CARD_ID or built-in id]
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunAllArgs {
    /// Image used to create and then verify the card
    #[arg(long, default_value = DEFAULT_IMAGE)]
    pub image: PathBuf,

    /// Card id [default: CARD_ID or built-in id]
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long, default_value = DEFAULT_NAME)]
    pub name: String,

    #[arg(long, default_value = DEFAULT_RUN_ALL_DETAIL)]
    pub detail: String,

    /// Delete the card first if it exists (404/422 are ignored)
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub preclean: bool,
}

impl Command {
    /// Run the command, filling in the configured default card id.
    pub fn execute<W: Write>(self, console: &mut Console<W>, config: &Config) -> Result<()> {
        let id = |id: Option<String>| id.unwrap_or_else(|| config.default_id.clone());
        match self {
            Command::CreateCard(a) => console.create_card(&a.image, &id(a.id), &a.name, a.consent),
            Command::MainImage(a) => console.main_image(&a.idcard, a.out.as_deref()),
            Command::VerifyCard(a) => {
                console.verify_card(&a.endpoint, &a.image, &id(a.id), &a.name, &a.detail)
            }
            Command::DeleteCard(a) => console.delete_card(&id(a.id)),
            Command::RunAll(a) => console.run_all(&RunAll {
                image: a.image,
                id: id(a.id),
                name: a.name,
                detail: a.detail,
                preclean: a.preclean,
            }),
        }
    }
}
