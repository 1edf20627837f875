mod config;
mod query;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mailsearch_core::collab::Collaborators;
use mailsearch_core::session::{Session, SortProgram};
use mailsearch_maildir::{
    AsciiCiMatcherFactory, ChronoDateParser, Maildir, MailparseAddressParser, MaildirAccessor,
    MaildirMailbox, RawBodyMatcher,
};
use mailsearch_types::Charset;

use config::read_config;
use query::QueryArgs;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Search a maildir mailbox", long_about = None)]
struct CliArgs {
    /// Maildir root directory (must contain cur/, new/, tmp/).
    #[clap(long, env = "MAILSEARCH_MAILDIR")]
    maildir: PathBuf,

    /// Optional TOML config file (see `config::Config`).
    #[clap(long, env = "MAILSEARCH_CONFIG")]
    config_file: Option<PathBuf>,

    /// Charset the compiled substring matchers should assume.
    #[clap(long, default_value = "utf-8")]
    charset: String,

    #[clap(flatten)]
    query: QueryArgs,
}

fn tracer() {
    tracing_subscriber::fmt::init();
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "mailsearch_cli=info,mailsearch_core=info,mailsearch_maildir=info");
    }
    tracer();

    let args = CliArgs::parse();

    let config = match args.config_file {
        Some(path) => read_config(path)?,
        None => config::Config::default(),
    };

    let root = query::build(&args.query)?;

    tracing::debug!(maildir = %args.maildir.display(), "opening maildir");
    let maildir = Maildir::open(args.maildir.clone())
        .await
        .with_context(|| format!("opening maildir at {}", args.maildir.display()))?;
    let mailbox = MaildirMailbox::open(maildir, config.keyword_names).await?;
    let accessor = MaildirAccessor::new(&mailbox);
    let matcher_factory = AsciiCiMatcherFactory;
    let body_matcher = RawBodyMatcher;
    let address_parser = MailparseAddressParser;
    let date_parser = ChronoDateParser;

    let collab = Collaborators {
        mailbox: &mailbox,
        mail: &accessor,
        matcher_factory: &matcher_factory,
        body_matcher: &body_matcher,
        address_parser: &address_parser,
        date_parser: &date_parser,
    };

    let mut session = Session::init(collab, Charset::from(args.charset.as_str()), root, SortProgram::NoSort)
        .await
        .context("initializing search session")?;

    let mut matched = 0u32;
    while let Some(mail) = session.next().await.context("advancing search session")? {
        println!("{}", mail.uid.get());
        matched += 1;
    }
    tracing::info!(matched, "search complete");

    session.deinit().context("search session ended with an error")?;
    Ok(())
}
