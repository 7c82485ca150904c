mod writer;

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use anyhow::anyhow;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use scurry_crawler::scraper::{Html, Selector};
use scurry_crawler::{Crawler, CrawlerConfig};
use tokio::runtime;

use writer::Record;

/// Same-origin web crawler
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    #[clap(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[clap(name = "crawl")]
    Crawl(CrawlArgs),
    #[clap(hide = true)]
    Completion,
}

/// Crawl a site from its base URL and report every visited page
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// Base URL, only pages on the same host are requested
    pub url: String,
    /// Path to the csv report, written to stdout when missing
    #[clap(parse(from_os_str), long, short)]
    pub output_file: Option<PathBuf>,
    /// Optional default crawler yaml configuration file
    #[clap(env = "SCURRY_CRAWLER_CONFIG", parse(from_os_str), long)]
    pub crawler_config: Option<PathBuf>,
    /// Override crawler's maximum number of requests
    #[clap(long)]
    pub max_request_count: Option<u32>,
    /// Override crawler's concurrency, one slot is kept in reserve
    #[clap(long)]
    pub concurrency: Option<u32>,
    /// Override crawler's overall timeout, in seconds
    #[clap(long)]
    pub timeout: Option<f64>,
    /// Override crawler's user agent
    #[clap(long)]
    pub user_agent: Option<String>,
    /// Report ignored links and failed requests
    #[clap(long)]
    pub debug: bool,
    /// No SIGINT handling, the crawl only ends on timeout or exhaustion
    #[clap(long)]
    pub no_sigint: bool,
    /// When quiet no logs are outputted
    #[clap(long, short)]
    pub quiet: bool,
}

impl TryFrom<&CrawlArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(file) = args.crawler_config.as_ref().map(File::open) {
            serde_yaml::from_reader(file?)?
        } else {
            CrawlerConfig::default()
        };
        if let Some(max_request_count) = args.max_request_count {
            conf.max_request_count = max_request_count;
        }
        if let Some(concurrency) = args.concurrency {
            conf.concurrency = concurrency;
        }
        if let Some(timeout) = args.timeout {
            conf.timeout = Duration::try_from_secs_f64(timeout)?;
        }
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if args.debug {
            conf.debug = true;
        }
        Ok(conf)
    }
}

fn title(document: &Html) -> String {
    let selector = Selector::parse("title").expect("Invalid title selector");
    document
        .select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn hrefs(document: &Html) -> Vec<String> {
    let selector = Selector::parse("a[href]").expect("Invalid link selector");
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(String::from)
        .collect()
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let crawler_conf = (&args).try_into()?;
    let crawler = Crawler::new(&args.url, crawler_conf)?;
    let (tx_record, writer) = writer::spawn(args.output_file.as_deref())?;

    let tx_request = tx_record.clone();
    crawler.on_request(move |req| {
        log::info!("Requesting {}", req.url());
        tx_request.send(Record::Request(req.url().to_string())).ok();
    });

    let enqueuer = crawler.enqueuer();
    crawler.on_document(move |doc| {
        let links = hrefs(doc);
        for href in &links {
            enqueuer.enqueue_url(href);
        }
        let record = Record::Document {
            title: title(doc),
            links: links.len(),
        };
        tx_record.send(record).ok();
    });

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async {
        if args.no_sigint {
            crawler.run().await
        } else {
            crawler
                .run_with_shutdown(async {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => log::warn!("Interrupted"),
                        Err(e) => {
                            log::error!("Couldn't listen for SIGINT: {e}");
                            std::future::pending::<()>().await
                        }
                    }
                })
                .await
        }
    });

    // Listeners own the record senders
    drop(crawler);
    writer
        .join()
        .map_err(|_| anyhow!("Record writer panicked"))??;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            if !args.quiet {
                if env::var_os("RUST_LOG").is_none() {
                    let level = if args.debug { "debug" } else { "warn" };
                    env::set_var("RUST_LOG", format!("scurry={level},scurry_crawler={level}"));
                }
                env_logger::init();
            }
            crawl(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "scurry", &mut io::stdout());
            Ok(())
        }
    }
}
